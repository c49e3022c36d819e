//! Fire-and-forget static analysis of built repositories.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use stowage_core::obs::emit_analysis_failed;
use stowage_core::{AnalysisConfig, RepoOutcome, RunContext};
use tracing::info;

use crate::tools::BuildTool;

/// What happened to the analysis submissions of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub submitted: Vec<String>,
    pub failed: Vec<String>,
}

/// Submit every built repository for analysis, concurrently.
///
/// Failures are logged and listed in the summary; they never fail the run.
pub async fn run_static_analysis(
    build: Arc<dyn BuildTool>,
    ctx: &RunContext,
    outcomes: &[RepoOutcome],
    config: &AnalysisConfig,
) -> AnalysisSummary {
    let built: Vec<_> = ctx
        .repos
        .iter()
        .filter(|repo| {
            outcomes
                .iter()
                .any(|o| o.repo == repo.name && o.outcome.is_built())
        })
        .collect();

    info!(repos = built.len(), "submitting static analysis");

    let submissions = built.iter().map(|repo| {
        let build = Arc::clone(&build);
        let repo_dir = ctx.repo_dir(&repo.name);
        async move {
            let result = build.analyze(repo, &repo_dir, config).await;
            (repo.name.clone(), result)
        }
    });

    let mut summary = AnalysisSummary::default();
    for (repo, result) in join_all(submissions).await {
        match result {
            Ok(()) => summary.submitted.push(repo),
            Err(e) => {
                emit_analysis_failed(&repo, &e);
                summary.failed.push(repo);
            }
        }
    }
    summary
}
