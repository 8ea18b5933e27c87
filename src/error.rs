//! Error types for tagver operations.
//!
//! This module defines [`Error`], the primary error type used throughout the
//! crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Configuration shape problems are `Config` errors and abort the run
//!   unless they occur inside a step while a `default-version` is set
//! - `NotVcs` routes callers to the packaged-metadata fallback, never to
//!   `default-version`
//! - Subprocess failures keep the command line and captured stderr so VCS
//!   backends can classify them

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tagver operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or invalid configuration or method parameters.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No tag could be found in version control.
    #[error("{0}")]
    NoTag(String),

    /// The project directory is not under the expected version control.
    #[error("{0}")]
    NotVcs(String),

    /// Expected an unpacked source distribution but found no PKG-INFO file.
    #[error("{0} does not contain a PKG-INFO file")]
    NotSdist(PathBuf),

    /// No tagver configuration table was found for the project.
    #[error("no tagver configuration found in {0}")]
    NotConfigured(PathBuf),

    /// A tag2version method was given a tag it cannot work with.
    #[error("invalid tag: {0}")]
    InvalidTag(String),

    /// A next-version or template-fields method was given a version it
    /// cannot work with.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// A configured method could not be resolved or has the wrong shape.
    #[error("method error: {0}")]
    Method(String),

    /// The external VCS executable is not installed or not on PATH.
    #[error("{program} not installed or not on PATH")]
    CommandNotFound { program: String },

    /// An external command exited nonzero or produced unusable output.
    #[error("command `{cmdline}` failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        cmdline: String,
        code: Option<i32>,
        stderr: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for tagver operations.
pub type Result<T> = std::result::Result<T, Error>;
