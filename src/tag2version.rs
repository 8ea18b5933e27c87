//! Extracting a version from a VCS tag.

use crate::config::{bool_param, opt_str_param, warn_extra_params, Params};
use crate::error::{Error, Result};
use crate::util::{strip_prefix, strip_suffix};
use regex::Regex;

/// Turn a tag into a version by stripping a literal prefix and suffix,
/// optionally applying a regex, and finally dropping a leading `v`.
///
/// When the `regex` parameter is set, the pattern is searched against the
/// tag; the `version` capture group, if the pattern defines one, becomes the
/// version, otherwise the whole match does. A non-matching pattern is only
/// an error if `require-match` is true.
pub fn basic_tag2version(tag: &str, params: &Params) -> Result<String> {
    warn_extra_params(
        params,
        "tag2version",
        &["rmprefix", "rmsuffix", "regex", "require-match"],
    );
    let mut tag = tag.to_string();
    if let Some(prefix) = opt_str_param(params, "rmprefix", "tag2version.rmprefix")? {
        tag = strip_prefix(&tag, &prefix).to_string();
    }
    if let Some(suffix) = opt_str_param(params, "rmsuffix", "tag2version.rmsuffix")? {
        tag = strip_suffix(&tag, &suffix).to_string();
    }
    let require_match = bool_param(params, "require-match", false, "tag2version.require-match")?;
    if let Some(pattern) = opt_str_param(params, "regex", "tag2version.regex")? {
        let re = Regex::new(&pattern)
            .map_err(|e| Error::Config(format!("tag2version.regex is not a valid regex: {e}")))?;
        let has_version_group = re.capture_names().flatten().any(|name| name == "version");
        match re.captures(&tag) {
            None => {
                if require_match {
                    return Err(Error::InvalidTag(format!(
                        "tag2version.regex did not match tag {tag:?}"
                    )));
                }
                tracing::info!("tag2version.regex did not match tag {tag:?}; leaving unmodified");
            }
            Some(caps) => {
                if has_version_group {
                    match caps.name("version") {
                        Some(m) => tag = m.as_str().to_string(),
                        None => {
                            return Err(Error::InvalidTag(format!(
                                "version group in tag2version.regex did not participate in match against tag {tag:?}"
                            )));
                        }
                    }
                } else if let Some(m) = caps.get(0) {
                    tag = m.as_str().to_string();
                }
            }
        }
    }
    Ok(tag.trim_start_matches('v').to_string())
}
