//! The Git-based VCS backends.

use crate::cmd::{self, readcmd, runcmd};
use crate::config::{list_str_param, opt_str_param, require_str_param, warn_extra_params, Params};
use crate::error::{Error, Result};
use crate::template::{FieldValue, TemplateFields};
use crate::util::{from_timestamp, get_build_date, is_sdist};
use crate::vcs::{describe_state, VcsDescription};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Repeating `--match`/`--exclude` only works from this Git version on.
const MULTI_PATTERN_GIT_VERSION: (u64, u64) = (2, 13);

static DESCRIBE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<tag>.+)-(?P<distance>[0-9]+)-g(?P<rev>[0-9a-f]+)$").unwrap()
});

static DESCRIBE_SUBST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$Format:%\(describe(?::(?P<options>.*))?\)\$$").unwrap());

static GIT_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<major>[0-9]+)\.(?P<minor>[0-9]+)").unwrap());

// Values git-config accepts as true & false.
const TRUTH_VALUES: &[(&str, bool)] = &[
    ("yes", true),
    ("on", true),
    ("true", true),
    ("1", true),
    ("no", false),
    ("off", false),
    ("false", false),
    ("0", false),
    ("", false),
];

/// Parsed `git describe` output when it includes all three fields.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Describe {
    tag: String,
    distance: i64,
    rev: String,
}

impl Describe {
    fn parse(s: &str) -> Option<Describe> {
        let caps = DESCRIBE_RE.captures(s)?;
        Some(Describe {
            tag: caps.name("tag")?.as_str().to_string(),
            distance: caps.name("distance")?.as_str().parse().ok()?,
            rev: caps.name("rev")?.as_str().to_string(),
        })
    }
}

/// Options to `git describe`, either from configuration or recovered from a
/// `%(describe)` archive substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DescribeOpts {
    tags: bool,
    match_patterns: Vec<String>,
    exclude: Vec<String>,
}

impl DescribeOpts {
    /// Parse an expanded `$Format:%(describe[:options])$` string back into
    /// the options it was generated with.
    ///
    /// `%(describe)` options are comma-terminated rather than
    /// comma-separated, with consecutive commas creating an empty option,
    /// and there is no escaping support.
    fn parse_describe_subst(s: &str) -> std::result::Result<DescribeOpts, String> {
        let caps = DESCRIBE_SUBST_RE.captures(s).ok_or_else(|| {
            format!("expected string in format '$Format:%(describe[:options])$', got {s:?}")
        })?;
        let mut opts = DescribeOpts::default();
        let options = caps.name("options").map(|m| m.as_str()).unwrap_or("");
        if !options.is_empty() {
            let options = options.strip_suffix(',').unwrap_or(options);
            for opt in options.split(',') {
                let (name, value) = match opt.split_once('=') {
                    Some((name, value)) => (name, Some(value)),
                    None => (opt, None),
                };
                match name {
                    "tags" => match value {
                        None => opts.tags = true,
                        Some(value) => {
                            match TRUTH_VALUES
                                .iter()
                                .find(|(v, _)| *v == value.to_lowercase())
                            {
                                Some((_, b)) => opts.tags = *b,
                                None => {
                                    // Git treats invalid booleans as false,
                                    // so we do too, but the user probably
                                    // made a mistake.
                                    tracing::warn!(
                                        "invalid boolean value for 'tags' option to %(describe) format: {value:?}; treating as false"
                                    );
                                    opts.tags = false;
                                }
                            }
                        }
                    },
                    "match" => match value {
                        Some(v) if !v.is_empty() => opts.match_patterns.push(v.to_string()),
                        _ => return Err(format!("option missing value: {opt:?}")),
                    },
                    "exclude" => match value {
                        Some(v) if !v.is_empty() => opts.exclude.push(v.to_string()),
                        _ => return Err(format!("option missing value: {opt:?}")),
                    },
                    _ => return Err(format!("unknown option: {opt:?}")),
                }
            }
        }
        Ok(opts)
    }

    fn as_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.tags {
            args.push("--tags".to_string());
        }
        for pat in &self.match_patterns {
            args.push(format!("--match={pat}"));
        }
        for pat in &self.exclude {
            args.push(format!("--exclude={pat}"));
        }
        args
    }

    fn as_cmdline_str(&self) -> String {
        let mut s = String::from("git describe --long --dirty --always");
        for arg in self.as_args() {
            s.push(' ');
            s.push_str(&cmd::quote(&arg));
        }
        s
    }

    fn pattern_count(&self) -> usize {
        self.match_patterns.len() + self.exclude.len()
    }
}

/// Queries against a Git working tree.
#[derive(Debug, Clone)]
struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    fn new(path: &Path) -> GitRepo {
        GitRepo {
            path: path.to_path_buf(),
        }
    }

    fn read(&self, args: &[&str]) -> Result<String> {
        readcmd("git", args, &self.path, &[])
    }

    /// Test whether the path is under Git revision control.
    fn ensure_is_repo(&self) -> Result<()> {
        match self.read(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(out) if out == "false" => {
                // We are inside a .git directory.
                return Err(Error::NotVcs(format!(
                    "{} is not in a Git working tree",
                    self.path.display()
                )));
            }
            Ok(_) => {}
            Err(Error::CommandNotFound { .. }) => {
                return Err(Error::NotVcs(
                    "Git not installed; assuming this isn't a Git repository".into(),
                ));
            }
            Err(Error::CommandFailed { .. }) => {
                return Err(Error::NotVcs(format!(
                    "{} is not in a Git repository",
                    self.path.display()
                )));
            }
            Err(e) => return Err(e),
        }
        // rev-parse succeeds inside .git/ and for untracked subdirectories,
        // so also check that the path itself is tracked.
        match runcmd("git", &["ls-files", "--error-unmatch", "."], &self.path, &[]) {
            Ok(_) => Ok(()),
            Err(Error::CommandFailed { .. }) => Err(Error::NotVcs(format!(
                "{} is not tracked by Git",
                self.path.display()
            ))),
            Err(e) => Err(e),
        }
    }

    /// Run `git describe --long --dirty --always` with the given options.
    /// The command only fails in a repository without commits or a corrupted
    /// one, which maps to [`Error::NoTag`].
    fn describe(&self, opts: &DescribeOpts) -> Result<String> {
        let mut args = vec![
            "describe".to_string(),
            "--long".to_string(),
            "--dirty".to_string(),
            "--always".to_string(),
        ];
        args.extend(opts.as_args());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        match self.read(&arg_refs) {
            Ok(out) => Ok(out),
            Err(Error::CommandFailed { stderr, .. }) => Err(Error::NoTag(format!(
                "`{}` command failed: {stderr}",
                opts.as_cmdline_str()
            ))),
            Err(e) => Err(e),
        }
    }

    /// The current branch, or `None` in a detached HEAD state.
    fn get_branch(&self) -> Option<String> {
        self.read(&["symbolic-ref", "--short", "-q", "HEAD"])
            .ok()
            .filter(|s| !s.is_empty())
    }

    /// The installed Git's `(major, minor)` version.
    fn version(&self) -> Result<(u64, u64)> {
        let out = self.read(&["--version"])?;
        let caps = GIT_VERSION_RE
            .captures(&out)
            .ok_or_else(|| bad_output("git --version", &out))?;
        let number = |name| -> Result<u64> {
            caps.name(name)
                .and_then(|m: regex::Match<'_>| m.as_str().parse().ok())
                .ok_or_else(|| bad_output("git --version", &out))
        };
        Ok((number("major")?, number("minor")?))
    }
}

fn bad_output(cmdline: &str, output: &str) -> Error {
    Error::CommandFailed {
        cmdline: cmdline.to_string(),
        code: None,
        stderr: format!("unexpected output: {output:?}"),
    }
}

fn base_fields(
    distance: i64,
    rev: &str,
    build_date: DateTime<Utc>,
) -> TemplateFields {
    let mut fields = TemplateFields::new();
    fields.insert("distance".into(), FieldValue::Int(distance));
    fields.insert("rev".into(), FieldValue::Str(rev.to_string()));
    fields.insert("build_date".into(), FieldValue::Timestamp(build_date));
    fields.insert("vcs".into(), "g".into());
    fields.insert("vcs_name".into(), "git".into());
    fields
}

/// Describe a live Git repository.
pub fn describe_git(project_dir: &Path, params: &Params) -> Result<VcsDescription> {
    let match_patterns = list_str_param(params, "match", "vcs.match")?;
    let exclude = list_str_param(params, "exclude", "vcs.exclude")?;
    let default_tag = opt_str_param(params, "default-tag", "vcs.default-tag")?;
    warn_extra_params(params, "vcs", &["match", "exclude", "default-tag"]);
    let build_date = get_build_date();
    let repo = GitRepo::new(project_dir);
    repo.ensure_is_repo()?;
    let opts = DescribeOpts {
        tags: true,
        match_patterns,
        exclude,
    };
    require_multi_pattern_support(&repo, &opts)?;
    let mut vdesc = describe_git_core(&repo, build_date, default_tag.as_deref(), &opts)?;
    if !vdesc.fields.contains_key("revision") {
        let show = repo.read(&["--no-pager", "show", "-s", "--format=%H%n%at%n%ct"])?;
        // Take the last three lines to skip a possible GPG signature.
        let lines: Vec<&str> = show.lines().collect();
        let [revision, author_ts, committer_ts] = &lines[lines.len().saturating_sub(3)..] else {
            return Err(bad_output("git --no-pager show -s --format=%H%n%at%n%ct", &show));
        };
        let ts = |s: &str| -> Result<DateTime<Utc>> {
            s.parse::<i64>().map(from_timestamp).map_err(|_| {
                bad_output("git --no-pager show -s --format=%H%n%at%n%ct", &show)
            })
        };
        vdesc
            .fields
            .insert("revision".into(), FieldValue::Str(revision.to_string()));
        vdesc
            .fields
            .insert("author_date".into(), FieldValue::Timestamp(ts(author_ts)?));
        vdesc.fields.insert(
            "committer_date".into(),
            FieldValue::Timestamp(ts(committer_ts)?),
        );
    }
    Ok(vdesc)
}

/// Describe a project exported with `git archive`, or the repository it
/// would be exported from.
///
/// The `describe-subst` parameter must be set to
/// `$Format:%(describe[:options])$` so that exported archives carry the
/// expanded describe output. Inside a live repository the embedded options
/// are re-derived and run directly, keeping archive and checkout builds
/// consistent.
pub fn describe_git_archive(project_dir: &Path, params: &Params) -> Result<VcsDescription> {
    let default_tag = opt_str_param(params, "default-tag", "vcs.default-tag")?;
    let describe_subst = require_str_param(params, "describe-subst", "vcs.describe-subst")?;
    warn_extra_params(params, "vcs", &["default-tag", "describe-subst"]);
    let build_date = get_build_date();
    let repo = GitRepo::new(project_dir);
    let not_vcs = match repo.ensure_is_repo() {
        Ok(()) => None,
        Err(e @ Error::NotVcs(_)) => Some(e),
        Err(e) => return Err(e),
    };
    if let Some(not_vcs) = not_vcs {
        if is_sdist(project_dir) {
            return Err(not_vcs);
        } else if describe_subst.is_empty() {
            return Err(Error::NoTag(
                "vcs.describe-subst is empty in Git archive".into(),
            ));
        } else if describe_subst.starts_with("$Format") {
            return Err(Error::NoTag(
                "vcs.describe-subst not expanded in Git archive".into(),
            ));
        } else if describe_subst.starts_with("%(describe") {
            return Err(Error::NoTag(format!(
                "vcs.describe-subst format was invalid, expanded to {describe_subst:?}"
            )));
        }
        tracing::info!("parsing version information from describe-subst = {describe_subst:?}");
        let (tag, distance, rev) = match Describe::parse(&describe_subst) {
            Some(d) => (d.tag, d.distance, d.rev),
            None => (describe_subst, 0, "0".repeat(7)),
        };
        return Ok(VcsDescription {
            tag,
            state: describe_state(distance, false).to_string(),
            branch: None,
            fields: base_fields(distance, &rev, build_date),
        });
    }
    let opts = DescribeOpts::parse_describe_subst(&describe_subst)
        .map_err(|e| Error::Config(format!("invalid vcs.describe-subst value: {e}")))?;
    require_multi_pattern_support(&repo, &opts)?;
    let mut vdesc = describe_git_core(&repo, build_date, default_tag.as_deref(), &opts)?;
    // Archives don't carry these fields, so live-repo builds must not
    // either, or the two would format differently.
    vdesc.fields.remove("revision");
    vdesc.fields.remove("author_date");
    vdesc.fields.remove("committer_date");
    Ok(vdesc)
}

fn require_multi_pattern_support(repo: &GitRepo, opts: &DescribeOpts) -> Result<()> {
    if opts.pattern_count() <= 1 {
        return Ok(());
    }
    let version = repo.version()?;
    if version < MULTI_PATTERN_GIT_VERSION {
        return Err(Error::Config(format!(
            "multiple vcs.match/vcs.exclude patterns require Git {}.{} or later; found {}.{}",
            MULTI_PATTERN_GIT_VERSION.0, MULTI_PATTERN_GIT_VERSION.1, version.0, version.1
        )));
    }
    Ok(())
}

fn describe_git_core(
    repo: &GitRepo,
    build_date: DateTime<Utc>,
    default_tag: Option<&str>,
    opts: &DescribeOpts,
) -> Result<VcsDescription> {
    let description = match repo.describe(opts) {
        Ok(d) => d,
        Err(Error::NoTag(msg)) => {
            // There are no commits in the repo.
            let Some(default_tag) = default_tag else {
                return Err(Error::NoTag(msg));
            };
            tracing::error!("{msg}");
            tracing::info!("falling back to default tag {default_tag:?}");
            let zero = from_timestamp(0);
            let mut fields = base_fields(0, &"0".repeat(7), build_date);
            fields.insert("revision".into(), FieldValue::Str("0".repeat(40)));
            fields.insert(
                "author_date".into(),
                FieldValue::Timestamp(build_date.min(zero)),
            );
            fields.insert(
                "committer_date".into(),
                FieldValue::Timestamp(build_date.min(zero)),
            );
            return Ok(VcsDescription {
                tag: default_tag.to_string(),
                state: "dirty".to_string(),
                branch: repo.get_branch(),
                fields,
            });
        }
        Err(e) => return Err(e),
    };
    let (description, dirty) = match description.strip_suffix("-dirty") {
        Some(d) => (d.to_string(), true),
        None => (description, false),
    };
    let (tag, distance, rev) = match Describe::parse(&description) {
        Some(d) => (d.tag, d.distance, d.rev),
        None => {
            // `--always` produced a bare hash; there are no matching tags.
            let Some(default_tag) = default_tag else {
                return Err(Error::NoTag(format!(
                    "`{}` could not find a tag",
                    opts.as_cmdline_str()
                )));
            };
            tracing::info!(
                "`{}` returned a hash instead of a tag; falling back to default tag {default_tag:?}",
                opts.as_cmdline_str()
            );
            let count = repo.read(&["rev-list", "--count", "HEAD"])?;
            let distance = count
                .parse::<i64>()
                .map_err(|_| bad_output("git rev-list --count HEAD", &count))?
                - 1;
            (default_tag.to_string(), distance, description)
        }
    };
    Ok(VcsDescription {
        tag,
        state: describe_state(distance, dirty).to_string(),
        branch: repo.get_branch(),
        fields: base_fields(distance, &rev, build_date),
    })
}
