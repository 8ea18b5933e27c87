//! Formatting unreleased-state versions from templates.

use crate::config::Params;
use crate::error::{Error, Result};
use crate::template::{self, FieldValue};
use crate::vcs::VcsDescription;
use regex::Regex;
use std::sync::LazyLock;
use toml::Value;

/// Templates used for each non-exact repository state when the
/// configuration does not override them.
pub const DEFAULT_FORMATS: &[(&str, &str)] = &[
    ("distance", "{version}.post{distance}+{vcs}{rev}"),
    ("dirty", "{version}+d{build_date:%Y%m%d}"),
    (
        "distance-dirty",
        "{version}.post{distance}+{vcs}{rev}.d{build_date:%Y%m%d}",
    ),
];

static BRANCH_SANITIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9.]").unwrap());

/// Render the final version for a non-exact repository state, using the
/// template configured for that state (or its default).
///
/// The template sees every field the description carries, plus `version` and
/// `base_version` (both the tag-derived version), `next_version`, and a
/// `branch` sanitized for use in PEP 440 local labels.
pub fn basic_format(
    description: &VcsDescription,
    base_version: &str,
    next_version: &str,
    params: &Params,
) -> Result<String> {
    let state = description.state.as_str();
    let template = match params.get(state) {
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(Error::Config(format!(
                "format.{state} must be set to a string"
            )));
        }
        None => DEFAULT_FORMATS
            .iter()
            .find(|(name, _)| *name == state)
            .map(|(_, t)| t.to_string())
            .ok_or_else(|| {
                Error::Config(format!(
                    "no format string for {state:?} state found in tagver's format table"
                ))
            })?,
    };

    let branch = match &description.branch {
        Some(branch) => FieldValue::Str(
            BRANCH_SANITIZE_RE.replace_all(branch, ".").into_owned(),
        ),
        None => FieldValue::None,
    };

    let mut fields = description.fields.clone();
    fields.insert("branch".into(), branch);
    fields.insert("version".into(), base_version.into());
    fields.insert("base_version".into(), base_version.into());
    fields.insert("next_version".into(), next_version.into());
    template::render(&template, &fields)
}
