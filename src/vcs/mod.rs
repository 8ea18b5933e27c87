//! Version-control backends.
//!
//! Each backend inspects a project directory and produces a
//! [`VcsDescription`]: the most recent tag, the repository's state relative
//! to it, and the fields later steps may interpolate into templates.

pub mod git;
pub mod hg;

use crate::template::TemplateFields;
use serde::Serialize;

pub use git::{describe_git, describe_git_archive};
pub use hg::describe_hg;

/// What a VCS backend reports about a project directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VcsDescription {
    /// The most recent tag reachable from the current commit.
    pub tag: String,
    /// `"exact"`, `"distance"`, `"dirty"`, or `"distance-dirty"`.
    pub state: String,
    /// The current branch, if the repository is on one.
    pub branch: Option<String>,
    /// Backend-specific template fields (`distance`, `rev`, `build_date`, ...).
    pub fields: TemplateFields,
}

/// Derive the state name from a distance and a dirtiness flag.
pub(crate) fn describe_state(distance: i64, dirty: bool) -> &'static str {
    match (distance > 0, dirty) {
        (true, true) => "distance-dirty",
        (true, false) => "distance",
        (false, true) => "dirty",
        (false, false) => "exact",
    }
}
