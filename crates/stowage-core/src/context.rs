//! Immutable per-run context threaded through every stage.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::branch::EffectiveBranch;
use crate::repos::RepoSpec;

const REPOS_DIR: &str = "repos";
const ARTIFACTS_DIR: &str = "artifacts";
const REPORT_FILE: &str = "report.json";
const GENERATED_DOCKERFILE: &str = "Dockerfile.stowage";

/// Facts established by the early stages and read by the later ones.
///
/// Built once after branch resolution and repository parsing; never mutated.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub branch: EffectiveBranch,
    pub repos: Vec<RepoSpec>,
    pub workspace: PathBuf,
}

impl RunContext {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        branch: EffectiveBranch,
        repos: Vec<RepoSpec>,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            run_id,
            started_at,
            branch,
            repos,
            workspace: workspace.into(),
        }
    }

    /// Isolated checkout directory of one repository.
    pub fn repo_dir(&self, repo: &str) -> PathBuf {
        repos_dir(&self.workspace).join(repo)
    }

    /// Shared directory collecting one artifact per built repository.
    pub fn artifact_dir(&self) -> PathBuf {
        artifact_dir(&self.workspace)
    }
}

pub fn repos_dir(workspace: &Path) -> PathBuf {
    workspace.join(REPOS_DIR)
}

pub fn artifact_dir(workspace: &Path) -> PathBuf {
    workspace.join(ARTIFACTS_DIR)
}

pub fn report_path(workspace: &Path) -> PathBuf {
    workspace.join(REPORT_FILE)
}

/// Dockerfile written when none is configured.
pub fn generated_dockerfile_path(workspace: &Path) -> PathBuf {
    workspace.join(GENERATED_DOCKERFILE)
}

/// Everything a run writes into the workspace. Nothing else in the workspace
/// is touched by cleanup.
pub fn owned_paths(workspace: &Path) -> [PathBuf; 4] {
    [
        repos_dir(workspace),
        artifact_dir(workspace),
        generated_dockerfile_path(workspace),
        report_path(workspace),
    ]
}
