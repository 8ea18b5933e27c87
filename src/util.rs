//! Small helpers shared by the pipeline steps.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Environment variable holding an integer epoch timestamp that overrides
/// the wall clock for every "build date" field, enabling reproducible
/// builds of the same commit.
pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

/// Convert an integer number of seconds since the epoch to an aware UTC
/// timestamp. Out-of-range values clamp to the epoch.
pub fn from_timestamp(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Return the current date & time as an aware UTC timestamp, honoring
/// `SOURCE_DATE_EPOCH` when it is set to a valid integer.
pub fn get_build_date() -> DateTime<Utc> {
    match std::env::var(SOURCE_DATE_EPOCH)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
    {
        Some(ts) => from_timestamp(ts),
        None => Utc::now(),
    }
}

/// If `s` starts with `prefix`, return the rest of `s` after it; otherwise
/// return `s` unchanged.
pub fn strip_prefix<'a>(s: &'a str, prefix: &str) -> &'a str {
    s.strip_prefix(prefix).unwrap_or(s)
}

/// If `s` ends with `suffix`, return the rest of `s` before it; otherwise
/// return `s` unchanged.
pub fn strip_suffix<'a>(s: &'a str, suffix: &str) -> &'a str {
    s.strip_suffix(suffix).unwrap_or(s)
}

/// Given packaging metadata text, return the value of its `Version` header.
///
/// Only the leading header block is searched; the first blank line ends it.
pub fn parse_version_from_metadata(metadata: &str) -> Result<String> {
    for line in metadata.lines() {
        if let Some(rest) = line.strip_prefix("Version") {
            let rest = rest.trim_start();
            if let Some(value) = rest.strip_prefix(':') {
                return Ok(value.trim().to_string());
            }
        }
        if line.is_empty() {
            break;
        }
    }
    Err(Error::InvalidVersion(
        "metadata does not contain a Version field".into(),
    ))
}

/// Simplistic check whether `project_dir` (presumably not under version
/// control) is an unpacked sdist, by testing whether PKG-INFO exists.
pub fn is_sdist(project_dir: &Path) -> bool {
    if project_dir.join("PKG-INFO").exists() {
        tracing::info!(
            "directory is not under version control and PKG-INFO is present; assuming this is an sdist"
        );
        true
    } else {
        false
    }
}

/// Append a newline to `s` unless it already ends with a line terminator.
pub fn ensure_terminated(mut s: String) -> String {
    if !s.ends_with('\n') && !s.ends_with('\r') {
        s.push('\n');
    }
    s
}
