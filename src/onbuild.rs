//! Rewriting a version placeholder in source files during builds.
//!
//! Build frontends see two trees: the original source directory and the
//! staging directory being assembled into the artifact. The [`FileProvider`]
//! trait abstracts over where a file is actually read from and written to,
//! so the same method works for in-place builds and staged builds.

use crate::config::{
    bool_param, opt_str_param, require_str_param, warn_extra_params, Params,
};
use crate::error::{Error, Result};
use crate::template::{self, TemplateFields};
use crate::util::ensure_terminated;
use regex::Regex;
use std::path::{Path, PathBuf};

const DEFAULT_REGEX: &str = r"^\s*__version__\s*=\s*(?P<version>.*)";
const DEFAULT_REPLACEMENT: &str = "\"{version}\"";

/// Access to the files of a build in progress.
pub trait FileProvider {
    fn read_file(&self, path: &Path) -> Result<String>;
    fn write_file(&self, path: &Path, content: &str) -> Result<()>;
}

/// A provider backed by a staging directory, falling back to the source
/// tree for files the build has not copied yet. Writes always land in the
/// staging directory.
#[derive(Debug, Clone)]
pub struct BuildDirProvider {
    pub src_dir: PathBuf,
    pub build_dir: PathBuf,
}

impl FileProvider for BuildDirProvider {
    fn read_file(&self, path: &Path) -> Result<String> {
        match std::fs::read_to_string(self.build_dir.join(path)) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(std::fs::read_to_string(self.src_dir.join(path))?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let target = self.build_dir.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, content)?;
        Ok(())
    }
}

/// Replace a version assignment in a file with the computed version.
///
/// The first line matching the `regex` parameter has its `version` capture
/// group (or, absent one, the whole match) replaced by the rendered
/// `replacement` template, which may also use `$name` references to the
/// regex's groups. When no line matches, behavior depends on
/// `require-match` and `append-line`.
pub fn replace_version_onbuild(
    provider: &dyn FileProvider,
    is_source: bool,
    template_fields: &TemplateFields,
    params: &Params,
) -> Result<()> {
    warn_extra_params(
        params,
        "onbuild",
        &[
            "source-file",
            "build-file",
            "encoding",
            "regex",
            "require-match",
            "replacement",
            "append-line",
        ],
    );
    // Both paths must be configured even though only one is used per run,
    // so a bad config fails at the source stage rather than mid-build.
    let source_file = require_str_param(params, "source-file", "onbuild.source-file")?;
    let build_file = require_str_param(params, "build-file", "onbuild.build-file")?;
    let path = PathBuf::from(if is_source { source_file } else { build_file });
    if let Some(encoding) = opt_str_param(params, "encoding", "onbuild.encoding")? {
        let normalized = encoding.to_lowercase().replace(['-', '_'], "");
        if normalized != "utf8" {
            return Err(Error::Config(format!(
                "onbuild.encoding: unsupported encoding {encoding:?}; only UTF-8 is supported"
            )));
        }
    }
    let pattern = opt_str_param(params, "regex", "onbuild.regex")?
        .unwrap_or_else(|| DEFAULT_REGEX.to_string());
    let re = Regex::new(&pattern)
        .map_err(|e| Error::Config(format!("onbuild.regex is not a valid regex: {e}")))?;
    let has_version_group = re.capture_names().flatten().any(|name| name == "version");
    let require_match = bool_param(params, "require-match", false, "onbuild.require-match")?;
    let replacement = opt_str_param(params, "replacement", "onbuild.replacement")?
        .unwrap_or_else(|| DEFAULT_REPLACEMENT.to_string());
    let append_line = opt_str_param(params, "append-line", "onbuild.append-line")?;

    let text = provider.read_file(&path)?;
    let mut lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
    for i in 0..lines.len() {
        let (content, eol) = split_terminator(&lines[i]);
        let Some(caps) = re.captures(content) else {
            continue;
        };
        let target = if has_version_group {
            caps.name("version").ok_or_else(|| {
                Error::Config(format!(
                    "version group in onbuild.regex did not participate in match in {}",
                    path.display()
                ))
            })?
        } else {
            match caps.get(0) {
                Some(m) => m,
                None => continue,
            }
        };
        let rendered = template::render(&replacement, template_fields)?;
        let mut expanded = String::new();
        caps.expand(&rendered, &mut expanded);
        let new_line = ensure_terminated(format!(
            "{}{}{}{}",
            &content[..target.start()],
            expanded,
            &content[target.end()..],
            eol
        ));
        tracing::info!("updating version assignment in {}", path.display());
        lines[i] = new_line;
        provider.write_file(&path, &lines.concat())?;
        return Ok(());
    }

    if require_match {
        return Err(Error::Config(format!(
            "onbuild.regex did not match any lines in {}",
            path.display()
        )));
    }
    if let Some(append_line) = append_line {
        let rendered = template::render(&append_line, template_fields)?;
        let mut text = ensure_terminated(text);
        text.push_str(&ensure_terminated(rendered));
        tracing::info!("appending version line to {}", path.display());
        provider.write_file(&path, &text)?;
        return Ok(());
    }
    tracing::info!(
        "onbuild.regex did not match any lines in {}; leaving file unmodified",
        path.display()
    );
    Ok(())
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, "\n")
    } else {
        (line, "")
    }
}
