// src/error.rs

//! Error taxonomy for manifest processing and install runs
//!
//! Every variant is terminal for the current run. The binary maps each one
//! to a distinct process exit code via [`Error::exit_code`].

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while parsing, resolving, preparing or executing a manifest
#[derive(Debug, Error, strum_macros::IntoStaticStr)]
pub enum Error {
    /// The manifest text is invalid; `field` names the offending field
    #[error("malformed manifest: {field}: {reason}")]
    MalformedManifest { field: String, reason: String },

    /// A dependency could not be resolved against the option set
    #[error("unsatisfiable dependency '{dependency}': {reason}")]
    UnsatisfiableDependency { dependency: String, reason: String },

    /// An install step exited non-zero or could not be started
    #[error("step '{step}' failed ({})", describe_status(*status))]
    StepFailed { step: String, status: Option<i32> },

    /// Install steps succeeded but the test step did not
    #[error("post-install verification '{step}' failed ({})", describe_status(*status))]
    PostInstallVerificationFailed { step: String, status: Option<i32> },

    /// The run was interrupted
    #[error("cancelled{}", step.as_ref().map(|s| format!(" during step '{s}'")).unwrap_or_default())]
    Cancelled { step: Option<String> },

    /// Source archive content does not match the declared checksum
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Source archive could not be downloaded or unpacked
    #[error("failed to fetch source: {0}")]
    FetchFailed(String),

    /// A declared artifact was not produced by the install steps
    #[error("artifact not found in build tree: {path}")]
    ArtifactMissing { path: String },

    /// The dependency provider failed to install resolved dependencies
    #[error("failed to install dependencies: {0}")]
    DependencyInstallFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_status(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "no exit status".to_string(),
    }
}

impl Error {
    /// Shorthand for a [`Error::MalformedManifest`]
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedManifest {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Variant name, e.g. `"StepFailed"`
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// Process exit code reported by the CLI for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            Self::MalformedManifest { .. } => 3,
            Self::UnsatisfiableDependency { .. } => 4,
            Self::StepFailed { .. } => 5,
            Self::PostInstallVerificationFailed { .. } => 6,
            Self::ChecksumMismatch { .. } => 7,
            Self::FetchFailed(_) => 8,
            Self::ArtifactMissing { .. } => 9,
            Self::DependencyInstallFailed(_) => 10,
            Self::Cancelled { .. } => 130,
        }
    }
}
