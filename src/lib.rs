//! Tagver - VCS-tag-driven version computation.
//!
//! Tagver derives a project's version from the most recent tag in its
//! version-control repository and the repository's state relative to that
//! tag, through a pipeline of pluggable steps configured in `tagver.toml`
//! or `pyproject.toml`.
//!
//! # Modules
//!
//! - [`cmd`] - Subprocess execution for VCS tools
//! - [`config`] - Configuration loading, parsing, and parameter guards
//! - [`error`] - Error types and result alias
//! - [`format`] - Version formatting for non-exact repository states
//! - [`methods`] - Method registry and step resolution
//! - [`next_version`] - Next-version bump strategies
//! - [`onbuild`] - Rewriting version placeholders during builds
//! - [`pep440`] - Strict PEP 440 version parsing
//! - [`pipeline`] - The step orchestration and run reports
//! - [`tag2version`] - Extracting a version from a tag
//! - [`template`] - Template fields and placeholder substitution
//! - [`template_fields`] - Assembling the field mapping for templates
//! - [`util`] - Shared helpers
//! - [`vcs`] - Git, git-archive, and Mercurial backends
//! - [`write`] - Writing the version to a source file
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! let version = tagver::get_version(Path::new("."), false, true).unwrap();
//! println!("{version}");
//! ```

pub mod cmd;
pub mod config;
pub mod error;
pub mod format;
pub mod methods;
pub mod next_version;
pub mod onbuild;
pub mod pep440;
pub mod pipeline;
pub mod tag2version;
pub mod template;
pub mod template_fields;
pub mod util;
pub mod vcs;
pub mod write;

pub use config::{Config, Params, StepConfig};
pub use error::{Error, Result};
pub use methods::{MethodRegistry, MethodSpec, Step, StepMethod};
pub use pipeline::{
    get_next_version, get_version, FallbackReport, Pipeline, Report, RunOutcome,
};
pub use template::TemplateFields;
pub use vcs::VcsDescription;
