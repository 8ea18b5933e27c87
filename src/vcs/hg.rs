//! The Mercurial VCS backend.

use crate::cmd::{readcmd, runcmd};
use crate::config::{opt_str_param, warn_extra_params, Params};
use crate::error::{Error, Result};
use crate::template::{FieldValue, TemplateFields};
use crate::util::{get_build_date, is_sdist};
use crate::vcs::{describe_state, VcsDescription};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// Disables user configuration and localization for parseable output.
const HG_ENV: &[(&str, &str)] = &[("HGPLAIN", "1")];

/// Queries against a Mercurial working tree.
#[derive(Debug, Clone)]
struct HgRepo {
    path: PathBuf,
}

impl HgRepo {
    fn new(path: &Path) -> HgRepo {
        HgRepo {
            path: path.to_path_buf(),
        }
    }

    fn read(&self, args: &[&str]) -> Result<String> {
        readcmd("hg", args, &self.path, HG_ENV)
    }

    /// Test whether the path is under Mercurial revision control.
    fn ensure_is_repo(&self) -> Result<()> {
        match runcmd("hg", &["files", "."], &self.path, HG_ENV) {
            Ok(_) => Ok(()),
            Err(Error::CommandNotFound { .. }) => Err(Error::NotVcs(
                "hg not installed; assuming this isn't a Mercurial repository".into(),
            )),
            Err(Error::CommandFailed { .. }) => Err(Error::NotVcs(format!(
                "{} is not tracked by Mercurial",
                self.path.display()
            ))),
            Err(e) => Err(e),
        }
    }
}

/// Describe a Mercurial repository, or an archive's `.hg_archival.txt`.
///
/// The optional `pattern` parameter restricts which tags count as the
/// latest tag.
pub fn describe_hg(project_dir: &Path, params: &Params) -> Result<VcsDescription> {
    let pattern = opt_str_param(params, "pattern", "vcs.pattern")?;
    let default_tag = opt_str_param(params, "default-tag", "vcs.default-tag")?;
    warn_extra_params(params, "vcs", &["pattern", "default-tag"]);
    let build_date = get_build_date();
    let repo = HgRepo::new(project_dir);

    let (mut tag, mut distance, revision, rev, branch) = match repo.ensure_is_repo() {
        Ok(()) => {
            // "{changes}" rather than "{distance}": the former counts all
            // distinct commits across all parent paths, matching what `git
            // describe` does, while the latter is just the length of the
            // longest path.
            let template = match &pattern {
                None => "{latesttag() % '{tag}:{changes}:{node}\n'}".to_string(),
                Some(p) => {
                    format!("{{latesttag('{p}') % '{{tag}}:{{changes}}:{{node}}\n'}}")
                }
            };
            let out = repo.read(&["log", "-r", ".", "--template", &template])?;
            let line = out.lines().next().unwrap_or("");
            // rsplit because the tag itself may contain colons.
            let mut parts = line.rsplitn(3, ':');
            let (node, changes, tag) = match (parts.next(), parts.next(), parts.next()) {
                (Some(node), Some(changes), Some(tag)) => (node, changes, tag),
                _ => return Err(bad_output("hg log -r . --template ...", &out)),
            };
            let distance: i64 = changes
                .parse()
                .map_err(|_| bad_output("hg log -r . --template ...", &out))?;
            let id = repo.read(&["id", "-i", "-b"])?;
            let (rev, branch) = match id.split_once(' ') {
                Some((rev, branch)) => (rev.to_string(), branch.to_string()),
                None => (id, String::new()),
            };
            (
                tag.to_string(),
                distance,
                node.to_string(),
                rev,
                Some(branch).filter(|b| !b.is_empty()),
            )
        }
        Err(not_vcs @ Error::NotVcs(_)) => {
            let archival = project_dir.join(".hg_archival.txt");
            if is_sdist(project_dir) || !archival.exists() {
                return Err(not_vcs);
            }
            tracing::info!(
                "{} is a Mercurial archive; parsing .hg_archival.txt",
                project_dir.display()
            );
            let data = parse_hg_archival(&archival)?;
            let field = |key: &str| -> Result<String> {
                data.get(key).cloned().ok_or_else(|| {
                    Error::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!(".hg_archival.txt is missing the {key:?} field"),
                    ))
                })
            };
            let (tag, distance) = match data.get("tag") {
                Some(tag) => (tag.clone(), 0),
                None => {
                    let distance: i64 =
                        field("changessincelatesttag")?.parse().map_err(|_| {
                            Error::Io(std::io::Error::new(
                                std::io::ErrorKind::InvalidData,
                                ".hg_archival.txt has a non-integer changessincelatesttag",
                            ))
                        })?;
                    (field("latesttag")?, distance)
                }
            };
            let revision = field("node")?;
            let rev = revision.chars().take(12).collect::<String>();
            (tag, distance, revision, rev, Some(field("branch")?))
        }
        Err(e) => return Err(e),
    };

    let dirty = rev.ends_with('+');
    let rev = rev.trim_end_matches('+').to_string();
    if tag == "null" {
        match &default_tag {
            Some(default_tag) => {
                tracing::info!("no latest tag; falling back to default tag {default_tag:?}");
                tag = default_tag.clone();
                // Act as though the first commit is the one carrying the
                // default tag, i.e. don't count it (unless there is no
                // first commit at all).
                if distance > 0 {
                    distance -= 1;
                }
            }
            None => {
                return Err(Error::NoTag(
                    "no latest tag in Mercurial repository".into(),
                ));
            }
        }
    }
    let mut fields = TemplateFields::new();
    fields.insert("distance".into(), FieldValue::Int(distance));
    fields.insert("rev".into(), FieldValue::Str(rev));
    fields.insert("revision".into(), FieldValue::Str(revision));
    fields.insert("build_date".into(), FieldValue::Timestamp(build_date));
    fields.insert("vcs".into(), "h".into());
    fields.insert("vcs_name".into(), "hg".into());
    Ok(VcsDescription {
        tag,
        state: describe_state(distance, dirty).to_string(),
        branch,
        fields,
    })
}

fn bad_output(cmdline: &str, output: &str) -> Error {
    Error::CommandFailed {
        cmdline: cmdline.to_string(),
        code: None,
        stderr: format!("unexpected output: {output:?}"),
    }
}

/// Parse the key-value metadata file at the root of `hg archive` output.
/// The first occurrence of a key wins.
fn parse_hg_archival(path: &Path) -> Result<BTreeMap<String, String>> {
    let mut data = BTreeMap::new();
    let text = std::fs::read_to_string(path)?;
    for line in text.lines() {
        if let Some((key, value)) = line.trim().split_once(": ") {
            data.entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn archival_parse_first_key_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".hg_archival.txt");
        std::fs::write(
            &path,
            "repo: abc123\nnode: deadbeefcafe0123456789\nbranch: default\ntag: v1.2.3\ntag: v9.9.9\n",
        )
        .unwrap();
        let data = parse_hg_archival(&path).unwrap();
        assert_eq!(data.get("tag").map(String::as_str), Some("v1.2.3"));
        assert_eq!(data.get("branch").map(String::as_str), Some("default"));
    }

    #[test]
    fn archival_tagged_archive_is_exact() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(".hg_archival.txt"),
            "repo: abc123\nnode: 0123456789abcdef0123456789abcdef01234567\nbranch: default\ntag: v1.2.3\n",
        )
        .unwrap();
        let desc = describe_hg(dir.path(), &Params::new()).unwrap();
        assert_eq!(desc.tag, "v1.2.3");
        assert_eq!(desc.state, "exact");
        assert_eq!(desc.branch.as_deref(), Some("default"));
        assert_eq!(
            desc.fields.get("rev"),
            Some(&FieldValue::Str("0123456789ab".into()))
        );
    }

    #[test]
    fn archival_untagged_archive_has_distance() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(".hg_archival.txt"),
            "repo: abc123\nnode: 0123456789abcdef0123456789abcdef01234567\nbranch: default\nlatesttag: v1.2.3\nchangessincelatesttag: 4\n",
        )
        .unwrap();
        let desc = describe_hg(dir.path(), &Params::new()).unwrap();
        assert_eq!(desc.tag, "v1.2.3");
        assert_eq!(desc.state, "distance");
        assert_eq!(desc.fields.get("distance"), Some(&FieldValue::Int(4)));
    }

    #[test]
    fn archival_missing_node_is_invalid_data() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(".hg_archival.txt"),
            "repo: abc123\nbranch: default\ntag: v1.2.3\n",
        )
        .unwrap();
        let err = describe_hg(dir.path(), &Params::new()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn plain_directory_is_not_vcs() {
        let dir = tempdir().unwrap();
        let err = describe_hg(dir.path(), &Params::new()).unwrap_err();
        assert!(matches!(err, Error::NotVcs(_)));
    }
}
