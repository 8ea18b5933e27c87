//! Built-in strategies for computing the version after the most recent
//! release.

use crate::config::{warn_extra_params, Params};
use crate::error::{Error, Result};
use crate::pep440;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static BASIC_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?(?:(?P<epoch>[0-9]+)!)?(?P<release>[0-9]+(?:\.[0-9]+)*)").unwrap()
});

/// The leading epoch and release segments of a version, the only parts the
/// bump strategies operate on. Anything after the release (prerelease, post,
/// dev, local) is ignored when bumping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicVersion {
    pub epoch: u64,
    pub release: Vec<u64>,
}

impl BasicVersion {
    /// Parse the epoch and release at the start of `version`, tolerating a
    /// leading `v` and any trailing segments.
    pub fn parse(version: &str) -> Result<BasicVersion> {
        let invalid = || Error::InvalidVersion(format!("cannot parse version {version:?}"));
        let caps = BASIC_VERSION_RE.captures(version).ok_or_else(invalid)?;
        let whole = caps.get(0).ok_or_else(invalid)?;
        // A release followed by `!` means an epoch appeared after a `v`
        // prefix or a second epoch; both are malformed.
        if version[whole.end()..].starts_with('!') {
            return Err(invalid());
        }
        let epoch = match caps.name("epoch") {
            Some(m) => m.as_str().parse::<u64>().map_err(|_| invalid())?,
            None => 0,
        };
        let mut release = Vec::new();
        if let Some(m) = caps.name("release") {
            for part in m.as_str().split('.') {
                release.push(part.parse::<u64>().map_err(|_| invalid())?);
            }
        }
        Ok(BasicVersion { epoch, release })
    }
}

impl fmt::Display for BasicVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(|n| n.to_string()).collect();
        write!(f, "{}", release.join("."))
    }
}

/// Drop everything after the minor component, increment the minor component,
/// and append `.0`: `1.2.3.4` becomes `1.3.0`.
pub fn next_minor(version: &str, _branch: Option<&str>, params: &Params) -> Result<String> {
    warn_extra_params(params, "next-version", &[]);
    let mut v = BasicVersion::parse(version)?;
    v.release.truncate(2);
    while v.release.len() < 2 {
        v.release.push(0);
    }
    v.release[1] += 1;
    v.release.push(0);
    Ok(v.to_string())
}

/// Increment the last release component: `1.2.3.4` becomes `1.2.3.5`.
pub fn next_smallest(version: &str, _branch: Option<&str>, params: &Params) -> Result<String> {
    warn_extra_params(params, "next-version", &[]);
    let mut v = BasicVersion::parse(version)?;
    if let Some(last) = v.release.last_mut() {
        *last += 1;
    }
    Ok(v.to_string())
}

/// Like [`next_minor`], except that a prerelease or development version is
/// not bumped; its release segment is returned as the next release. The
/// input must be strict PEP 440.
pub fn next_minor_release(version: &str, branch: Option<&str>, params: &Params) -> Result<String> {
    match release_of_prerelease(version)? {
        Some(release) => {
            warn_extra_params(params, "next-version", &[]);
            Ok(release)
        }
        None => next_minor(version, branch, params),
    }
}

/// Like [`next_smallest`], except that a prerelease or development version
/// is not bumped; its release segment is returned as the next release. The
/// input must be strict PEP 440.
pub fn next_smallest_release(
    version: &str,
    branch: Option<&str>,
    params: &Params,
) -> Result<String> {
    match release_of_prerelease(version)? {
        Some(release) => {
            warn_extra_params(params, "next-version", &[]);
            Ok(release)
        }
        None => next_smallest(version, branch, params),
    }
}

/// Return the version unchanged, for pipelines whose format templates do not
/// use `{next_version}`.
pub fn null_next_version(version: &str, _branch: Option<&str>, params: &Params) -> Result<String> {
    warn_extra_params(params, "next-version", &[]);
    Ok(version.to_string())
}

/// If `version` is a PEP 440 prerelease or dev release, the bare
/// `epoch!release` string it leads up to; otherwise `None`. A version that
/// does not parse under PEP 440 is an `InvalidVersion` error.
fn release_of_prerelease(version: &str) -> Result<Option<String>> {
    let parsed = pep440::Version::parse(version)?;
    if parsed.is_prerelease() {
        let base = BasicVersion {
            epoch: parsed.epoch,
            release: parsed.release,
        };
        Ok(Some(base.to_string()))
    } else {
        Ok(None)
    }
}
