//! Pipeline orchestration.
//!
//! Stages run strictly in order: workspace cleanup, branch gate, repository
//! parsing, parallel builds, static analysis, version resolution,
//! publishing. The finalizer runs whatever happened and writes the run
//! report.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stowage_core::context::{artifact_dir, owned_paths, report_path};
use stowage_core::obs::{
    emit_branch_not_allowed, emit_branch_resolved, emit_repos_invalid, emit_repos_parsed,
    emit_run_failed, emit_run_finished, emit_run_started,
};
use stowage_core::{
    parse_repo_list, resolve_branch, BranchDecision, BranchSource, PipelineConfig, RepoOutcome,
    Result, RunContext, RunStatus, StowageError,
};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analysis::{run_static_analysis, AnalysisSummary};
use crate::coordinator::BuildCoordinator;
use crate::publisher::{ImagePublisher, PublishedImage};
use crate::tools::Toolchain;

/// Summary of a run, written to `report.json` in the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Effective branch, or the rejected candidate when not built.
    pub branch: Option<String>,
    pub branch_source: Option<BranchSource>,
    pub repos: Vec<String>,
    pub outcomes: Vec<RepoOutcome>,
    pub analysis: Option<AnalysisSummary>,
    pub image: Option<PublishedImage>,
    /// Error that ended the run, when failed.
    pub error: Option<String>,
}

impl RunReport {
    fn new(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.to_string(),
            status: RunStatus::Failed,
            started_at,
            duration_ms: 0,
            branch: None,
            branch_source: None,
            repos: Vec::new(),
            outcomes: Vec::new(),
            analysis: None,
            image: None,
            error: None,
        }
    }

    pub fn built_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_built()).count()
    }
}

/// A configured pipeline, ready to run.
pub struct Pipeline {
    config: PipelineConfig,
    tools: Toolchain,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, tools: Toolchain) -> Self {
        Self { config, tools }
    }

    /// Run every stage and return the report. Never fails: errors end up in
    /// [`RunReport::status`] and [`RunReport::error`].
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("stowage.run", run_id = %run_id);
        self.run_with_id(run_id).instrument(span).await
    }

    async fn run_with_id(&self, run_id: Uuid) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::new(run_id, Utc::now());
        emit_run_started(
            &report.run_id,
            &self.config.workspace.display().to_string(),
        );

        match self.execute(run_id, &mut report).await {
            Ok(status) => report.status = status,
            Err(e) => {
                emit_run_failed(&report.run_id, &e);
                report.status = RunStatus::Failed;
                report.error = Some(e.to_string());
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        self.finalize(&report);
        report
    }

    async fn execute(&self, run_id: Uuid, report: &mut RunReport) -> Result<RunStatus> {
        let config = &self.config;
        config.validate()?;

        clean_workspace(&config.workspace)?;

        let branch = match resolve_branch(&config.signals) {
            BranchDecision::Build { branch, source } => {
                emit_branch_resolved(branch.as_str(), source);
                report.branch = Some(branch.to_string());
                report.branch_source = Some(source);
                branch
            }
            BranchDecision::NotAllowed { candidate, source } => {
                emit_branch_not_allowed(&candidate, source);
                report.branch = Some(candidate);
                report.branch_source = Some(source);
                return Ok(RunStatus::NotBuilt);
            }
        };

        let repos = match parse_repo_list(&config.repos, &config.resolved_base_url()) {
            Ok(repos) => repos,
            Err(StowageError::InvalidRepoNames { names }) => {
                emit_repos_invalid(&names);
                return Err(StowageError::InvalidRepoNames { names });
            }
            Err(e) => return Err(e),
        };
        report.repos = repos.iter().map(|r| r.name.clone()).collect();
        emit_repos_parsed(&report.repos);

        let image_name = config.image_name(&repos)?;
        let ctx = Arc::new(RunContext::new(
            run_id,
            report.started_at,
            branch,
            repos,
            config.workspace.clone(),
        ));

        let coordinator = BuildCoordinator::new(
            Arc::clone(&self.tools.scm),
            Arc::clone(&self.tools.build),
            config.fail_on_missing_branch,
        );
        coordinator
            .run_into(Arc::clone(&ctx), &mut report.outcomes)
            .await?;

        if config.analysis.enabled {
            report.analysis = Some(
                run_static_analysis(
                    Arc::clone(&self.tools.build),
                    &ctx,
                    &report.outcomes,
                    &config.analysis,
                )
                .await,
            );
        } else {
            info!("static analysis disabled");
        }

        let publisher = ImagePublisher::new(Arc::clone(&self.tools.engine));
        let repository = config.image_repository(&image_name);
        let version = publisher.resolve_version(&repository).await?;
        let image = publisher
            .publish(
                &ctx,
                &config.image,
                &repository,
                version,
                config.credentials.as_ref(),
            )
            .await?;
        report.image = Some(image);

        Ok(RunStatus::Success)
    }

    /// Always runs: terminal log line and the run report.
    fn finalize(&self, report: &RunReport) {
        emit_run_finished(&report.run_id, report.status, report.duration_ms);
        if let Err(e) = write_report(&self.config.workspace, report) {
            warn!(error = %e, "failed to write run report");
        }
    }
}

/// Remove what the previous run left behind and recreate the artifact
/// directory.
///
/// Only the paths a run writes are removed; anything else in the workspace
/// (a configured Dockerfile, the job's own files) is left alone. Removal is
/// best-effort; only failing to create the fresh directories is an error.
pub fn clean_workspace(workspace: &Path) -> Result<()> {
    for path in owned_paths(workspace) {
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else if path.exists() {
            std::fs::remove_file(&path)
        } else {
            continue;
        };
        if let Err(e) = removed {
            warn!(path = %path.display(), error = %e, "could not remove previous run output");
        }
    }
    std::fs::create_dir_all(artifact_dir(workspace))?;
    Ok(())
}

pub fn write_report(workspace: &Path, report: &RunReport) -> Result<()> {
    std::fs::create_dir_all(workspace)?;
    let json = serde_json::to_vec_pretty(report)?;
    std::fs::write(report_path(workspace), json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_workspace_removes_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("ws");
        std::fs::create_dir_all(ws.join("repos/old")).unwrap();
        std::fs::write(ws.join("repos/old/partial.jar"), b"x").unwrap();

        clean_workspace(&ws).unwrap();

        assert!(!ws.join("repos/old").exists());
        assert!(artifact_dir(&ws).is_dir());
    }

    #[test]
    fn clean_workspace_keeps_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path();
        std::fs::write(ws.join("Dockerfile.app"), "FROM scratch\n").unwrap();
        std::fs::create_dir_all(ws.join("src")).unwrap();
        std::fs::write(ws.join("src/Main.java"), "class Main {}").unwrap();
        std::fs::create_dir_all(artifact_dir(ws)).unwrap();
        std::fs::write(artifact_dir(ws).join("old.jar"), b"x").unwrap();
        std::fs::write(report_path(ws), "{}").unwrap();

        clean_workspace(ws).unwrap();

        assert!(ws.join("Dockerfile.app").is_file());
        assert!(ws.join("src/Main.java").is_file());
        assert!(!artifact_dir(ws).join("old.jar").exists());
        assert!(!report_path(ws).exists());
        assert!(artifact_dir(ws).is_dir());
    }

    #[test]
    fn report_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = RunReport::new(Uuid::new_v4(), Utc::now());
        report.status = RunStatus::NotBuilt;
        report.branch = Some("feature/xyz".to_string());

        write_report(dir.path(), &report).unwrap();

        let raw = std::fs::read_to_string(report_path(dir.path())).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["status"], "not_built");
        assert_eq!(parsed["branch"], "feature/xyz");
    }
}
