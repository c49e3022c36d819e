//! The per-repository unit of work: checkout, build, stage one artifact.

use std::sync::Arc;
use std::time::Instant;

use stowage_core::artifact::{find_primary_artifact, stage_artifact};
use stowage_core::{BuildOutcome, RepoOutcome, RepoSpec, RunContext};
use tracing::{debug, info};

use crate::tools::{BuildTool, SourceControl};

/// Builds one repository at the run's effective branch.
///
/// Never returns an error: every failure becomes a [`BuildOutcome`]. Whether
/// that outcome stops the run is the coordinator's decision.
pub struct RepoBuildTask {
    repo: RepoSpec,
    ctx: Arc<RunContext>,
    scm: Arc<dyn SourceControl>,
    build: Arc<dyn BuildTool>,
}

impl RepoBuildTask {
    pub fn new(
        repo: RepoSpec,
        ctx: Arc<RunContext>,
        scm: Arc<dyn SourceControl>,
        build: Arc<dyn BuildTool>,
    ) -> Self {
        Self {
            repo,
            ctx,
            scm,
            build,
        }
    }

    pub async fn run(self) -> RepoOutcome {
        let start = Instant::now();
        let outcome = self.execute().await;
        RepoOutcome {
            repo: self.repo.name.clone(),
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn execute(&self) -> BuildOutcome {
        let name = self.repo.name.as_str();
        let repo_dir = self.ctx.repo_dir(name);

        if let Some(parent) = repo_dir.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return BuildOutcome::Failed {
                    reason: format!("cannot create working directory: {e}"),
                };
            }
        }

        info!(repo = %name, branch = %self.ctx.branch, url = %self.repo.clone_url, "checking out");
        if let Err(e) = self
            .scm
            .shallow_checkout(&self.repo, &self.ctx.branch, &repo_dir)
            .await
        {
            return BuildOutcome::SkippedMissingBranch {
                reason: format!("checkout of branch {} failed: {e}", self.ctx.branch),
            };
        }

        info!(repo = %name, "building");
        let output_dir = match self.build.package(&repo_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                return BuildOutcome::Failed {
                    reason: format!("build failed: {e}"),
                }
            }
        };

        let primary = match find_primary_artifact(&output_dir) {
            Ok(path) => path,
            Err(e) => return BuildOutcome::Failed { reason: e.to_string() },
        };
        debug!(repo = %name, artifact = %primary.display(), "selected primary artifact");

        match stage_artifact(&primary, &self.ctx.artifact_dir(), name) {
            Ok(artifact) => BuildOutcome::Built { artifact },
            Err(e) => BuildOutcome::Failed {
                reason: format!("cannot stage artifact {}: {e}", primary.display()),
            },
        }
    }
}
