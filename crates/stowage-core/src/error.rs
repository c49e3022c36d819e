//! Error taxonomy for the Stowage pipeline.

use std::path::PathBuf;

/// Stowage errors.
///
/// Per-repository failures are normally converted into a
/// [`BuildOutcome`](crate::outcome::BuildOutcome) at the task boundary; the
/// variants here surface only when an error has to stop the run.
#[derive(Debug, thiserror::Error)]
pub enum StowageError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid repository names: {}", .names.join(", "))]
    InvalidRepoNames { names: Vec<String> },

    #[error("repository list is empty")]
    EmptyRepoList,

    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("{tool} timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    #[error("no primary artifact found in {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("image version {0} has no successor")]
    VersionExhausted(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("repository {repo} failed: {reason}")]
    RepoFailed { repo: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StowageError {
    /// Shorthand for a failed external tool invocation.
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        StowageError::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result type for Stowage operations.
pub type Result<T> = std::result::Result<T, StowageError>;
