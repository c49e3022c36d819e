//! Concurrent fan-out of repository build tasks.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use stowage_core::obs::emit_repo_outcome;
use stowage_core::{BuildOutcome, RepoOutcome, Result, RunContext, StowageError};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::task::RepoBuildTask;
use crate::tools::{BuildTool, SourceControl};

/// Runs one [`RepoBuildTask`] per repository, all at once.
///
/// Without fail-fast every task runs to completion and the coordinator
/// returns exactly one outcome per repository, in input order. With
/// fail-fast the first unsuccessful outcome aborts the tasks still running
/// and fails the stage. Aborted checkouts and partially written artifacts
/// are left for the next run's workspace cleanup.
pub struct BuildCoordinator {
    scm: Arc<dyn SourceControl>,
    build: Arc<dyn BuildTool>,
    fail_fast: bool,
}

impl BuildCoordinator {
    pub fn new(scm: Arc<dyn SourceControl>, build: Arc<dyn BuildTool>, fail_fast: bool) -> Self {
        Self {
            scm,
            build,
            fail_fast,
        }
    }

    pub async fn run(&self, ctx: Arc<RunContext>) -> Result<Vec<RepoOutcome>> {
        let mut outcomes = Vec::with_capacity(ctx.repos.len());
        self.run_into(ctx, &mut outcomes).await?;
        Ok(outcomes)
    }

    /// Like [`BuildCoordinator::run`], but appends outcomes to `settled`.
    ///
    /// On a fail-fast abort `settled` still receives every outcome that
    /// finished before the abort, the failing one included, in input order.
    pub async fn run_into(
        &self,
        ctx: Arc<RunContext>,
        settled: &mut Vec<RepoOutcome>,
    ) -> Result<()> {
        if ctx.repos.is_empty() {
            return Err(StowageError::EmptyRepoList);
        }

        info!(
            repos = ctx.repos.len(),
            branch = %ctx.branch,
            fail_fast = self.fail_fast,
            "starting parallel builds"
        );

        let mut join_set = JoinSet::new();
        for (idx, repo) in ctx.repos.iter().cloned().enumerate() {
            let name = repo.name.clone();
            let task = RepoBuildTask::new(
                repo,
                Arc::clone(&ctx),
                Arc::clone(&self.scm),
                Arc::clone(&self.build),
            );
            join_set.spawn(async move {
                let outcome = AssertUnwindSafe(task.run())
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| RepoOutcome {
                        repo: name,
                        outcome: BuildOutcome::Failed {
                            reason: "build task panicked".to_string(),
                        },
                        duration_ms: 0,
                    });
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<RepoOutcome>> = vec![None; ctx.repos.len()];
        while let Some(joined) = join_set.join_next().await {
            let (idx, result) = joined.map_err(|e| {
                StowageError::tool("build-coordinator", format!("build task join error: {e}"))
            })?;
            emit_repo_outcome(&result.repo, &result.outcome, result.duration_ms);

            let abort = self.fail_fast && !result.outcome.is_built();
            let failure = abort.then(|| StowageError::RepoFailed {
                repo: result.repo.clone(),
                reason: result.outcome.reason().unwrap_or_default().to_string(),
            });
            slots[idx] = Some(result);

            if let Some(err) = failure {
                join_set.abort_all();
                warn!(error = %err, "fail-fast: aborting remaining builds");
                settled.extend(slots.into_iter().flatten());
                return Err(err);
            }
        }

        let mut outcomes = Vec::with_capacity(slots.len());
        for (repo, slot) in ctx.repos.iter().zip(slots) {
            let outcome = slot.ok_or_else(|| {
                StowageError::tool(
                    "build-coordinator",
                    format!("missing build outcome for repo '{}'", repo.name),
                )
            })?;
            outcomes.push(outcome);
        }

        let built = outcomes.iter().filter(|o| o.outcome.is_built()).count();
        info!(
            built = built,
            unsuccessful = outcomes.len() - built,
            "parallel builds settled"
        );
        if built == 0 {
            warn!("no repository produced an artifact");
        }

        settled.extend(outcomes);
        Ok(())
    }
}
