//! Per-repository build outcomes and the run's terminal status.

use serde::{Deserialize, Serialize};

use crate::artifact::StagedArtifact;

/// What happened to one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    /// Checked out, built, and staged.
    Built { artifact: StagedArtifact },
    /// Checkout failed (missing branch, network or auth error).
    SkippedMissingBranch { reason: String },
    /// Build failed or produced no primary artifact.
    Failed { reason: String },
}

impl BuildOutcome {
    pub fn is_built(&self) -> bool {
        matches!(self, BuildOutcome::Built { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            BuildOutcome::Built { .. } => "built",
            BuildOutcome::SkippedMissingBranch { .. } => "skipped_missing_branch",
            BuildOutcome::Failed { .. } => "failed",
        }
    }

    /// Failure or skip reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            BuildOutcome::Built { .. } => None,
            BuildOutcome::SkippedMissingBranch { reason } | BuildOutcome::Failed { reason } => {
                Some(reason.as_str())
            }
        }
    }
}

/// Outcome of one repository task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoOutcome {
    pub repo: String,
    pub outcome: BuildOutcome,
    pub duration_ms: u64,
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The image was pushed.
    Success,
    /// The branch was not allowed; nothing was built. Neither success nor
    /// failure.
    NotBuilt,
    Failed,
}

impl RunStatus {
    /// Process exit code for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failed => 1,
            RunStatus::NotBuilt => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::NotBuilt => "not_built",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = BuildOutcome::Built {
            artifact: StagedArtifact {
                path: PathBuf::from("artifacts/svcA.jar"),
                sha256: "ab".repeat(32),
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "built");
        assert_eq!(json["artifact"]["path"], "artifacts/svcA.jar");

        let skipped = BuildOutcome::SkippedMissingBranch {
            reason: "branch not found".to_string(),
        };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["status"], "skipped_missing_branch");
    }

    #[test]
    fn reason_only_for_unsuccessful_outcomes() {
        let failed = BuildOutcome::Failed {
            reason: "no artifact".to_string(),
        };
        assert_eq!(failed.reason(), Some("no artifact"));
        assert!(!failed.is_built());
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_eq!(RunStatus::Success.exit_code(), 0);
        assert_eq!(RunStatus::Failed.exit_code(), 1);
        assert_eq!(RunStatus::NotBuilt.exit_code(), 3);
    }
}
