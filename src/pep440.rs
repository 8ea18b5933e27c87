//! Strict PEP 440 version parsing.
//!
//! Implements the canonical grammar from the PEP 440 appendix, including the
//! spelling normalizations (`alpha` → `a`, `c`/`pre`/`preview` → `rc`,
//! `rev`/`r` → `post`, implicit `-N` post releases, numberless phases, and
//! local segments with `-`/`_` separators). Used by the `-release` bump
//! strategies, the PEP 440 version-tuple mode, and compliance warnings.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*v?
        (?:(?P<epoch>[0-9]+)!)?
        (?P<release>[0-9]+(?:\.[0-9]+)*)
        (?:[-_.]?(?P<pre_l>alpha|beta|preview|pre|rc|a|b|c)[-_.]?(?P<pre_n>[0-9]+)?)?
        (?:
            (?:-(?P<post_n1>[0-9]+))
            |
            (?:[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>[0-9]+)?)
        )?
        (?:[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>[0-9]+)?)?
        (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
        \s*$
        ",
    )
    .unwrap()
});

/// A parsed PEP 440 version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub epoch: u64,
    pub release: Vec<u64>,
    /// Prerelease phase (`"a"`, `"b"`, or `"rc"`) and number.
    pub pre: Option<(String, u64)>,
    pub post: Option<u64>,
    pub dev: Option<u64>,
    pub local: Option<String>,
}

impl Version {
    /// Parse a version string, or fail with [`Error::InvalidVersion`].
    pub fn parse(s: &str) -> Result<Version> {
        let caps = VERSION_RE
            .captures(s)
            .ok_or_else(|| Error::InvalidVersion(format!("cannot parse version {s:?}")))?;
        let number = |name: &str| -> Result<u64> {
            match caps.name(name) {
                Some(m) => m
                    .as_str()
                    .parse::<u64>()
                    .map_err(|_| Error::InvalidVersion(format!("cannot parse version {s:?}"))),
                None => Ok(0),
            }
        };
        let epoch = number("epoch")?;
        let mut release = Vec::new();
        if let Some(m) = caps.name("release") {
            for part in m.as_str().split('.') {
                release.push(part.parse::<u64>().map_err(|_| {
                    Error::InvalidVersion(format!("cannot parse version {s:?}"))
                })?);
            }
        }
        let pre = match caps.name("pre_l") {
            Some(label) => Some((normalize_pre_label(label.as_str()), number("pre_n")?)),
            None => None,
        };
        let post = if caps.name("post_n1").is_some() {
            Some(number("post_n1")?)
        } else if caps.name("post_l").is_some() {
            Some(number("post_n2")?)
        } else {
            None
        };
        let dev = match caps.name("dev_l") {
            Some(_) => Some(number("dev_n")?),
            None => None,
        };
        let local = caps
            .name("local")
            .map(|m| m.as_str().to_lowercase().replace(['-', '_'], "."));
        Ok(Version {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    /// Whether this version carries a prerelease or development segment.
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }
}

fn normalize_pre_label(label: &str) -> String {
    match label.to_lowercase().as_str() {
        "a" | "alpha" => "a".to_string(),
        "b" | "beta" => "b".to_string(),
        _ => "rc".to_string(),
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(|n| n.to_string()).collect();
        write!(f, "{}", release.join("."))?;
        if let Some((label, n)) = &self.pre {
            write!(f, "{label}{n}")?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{n}")?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{n}")?;
        }
        if let Some(local) = &self.local {
            write!(f, "+{local}")?;
        }
        Ok(())
    }
}

/// Whether `s` parses as a PEP 440 version.
pub fn is_valid(s: &str) -> bool {
    Version::parse(s).is_ok()
}

/// If `version` is not PEP 440-compliant, log a warning. `desc` describes
/// the version's provenance.
pub fn warn_bad_version(version: &str, desc: &str) {
    if !is_valid(version) {
        tracing::warn!("{desc} {version:?} is not PEP 440-compliant");
    }
}
