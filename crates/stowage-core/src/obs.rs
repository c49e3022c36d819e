//! Structured lifecycle events for a pipeline run.
//!
//! Every decision the pipeline takes (branch chosen, repo skipped, invalid
//! names, missing artifact, tag picked) is emitted here with an `event` field
//! so a run can be diagnosed from its logs alone.

use tracing::{error, info, warn};

use crate::branch::BranchSource;
use crate::outcome::{BuildOutcome, RunStatus};

pub fn emit_run_started(run_id: &str, workspace: &str) {
    info!(event = "run.started", run_id = %run_id, workspace = %workspace);
}

pub fn emit_branch_resolved(branch: &str, source: BranchSource) {
    info!(event = "branch.resolved", branch = %branch, source = source.as_str());
}

/// The resolved branch is not on the allow-list; the run ends as not built.
pub fn emit_branch_not_allowed(candidate: &str, source: BranchSource) {
    info!(
        event = "branch.not_allowed",
        candidate = %candidate,
        source = source.as_str(),
        "branch is not allowed to build, skipping remaining stages"
    );
}

pub fn emit_repos_parsed(repos: &[String]) {
    info!(event = "repos.parsed", count = repos.len(), repos = ?repos);
}

pub fn emit_repos_invalid(names: &[String]) {
    error!(event = "repos.invalid", invalid = ?names, "invalid repository names");
}

/// Per-repository outcome; level follows severity.
pub fn emit_repo_outcome(repo: &str, outcome: &BuildOutcome, duration_ms: u64) {
    match outcome {
        BuildOutcome::Built { artifact } => info!(
            event = "repo.built",
            repo = %repo,
            artifact = %artifact.path.display(),
            sha256 = %artifact.sha256,
            duration_ms = duration_ms,
        ),
        BuildOutcome::SkippedMissingBranch { reason } => warn!(
            event = "repo.skipped",
            repo = %repo,
            reason = %reason,
            duration_ms = duration_ms,
        ),
        BuildOutcome::Failed { reason } => error!(
            event = "repo.failed",
            repo = %repo,
            reason = %reason,
            duration_ms = duration_ms,
        ),
    }
}

pub fn emit_analysis_failed(repo: &str, error: &dyn std::fmt::Display) {
    warn!(event = "analysis.failed", repo = %repo, error = %error);
}

pub fn emit_version_resolved(repository: &str, version: &str, existing: usize) {
    info!(
        event = "image.version_resolved",
        repository = %repository,
        version = %version,
        existing_tags = existing,
    );
}

pub fn emit_image_pushed(reference: &str) {
    info!(event = "image.pushed", reference = %reference);
}

/// Logout after push failed; the session may still hold credentials.
pub fn emit_logout_failed(registry: &str, error: &dyn std::fmt::Display) {
    warn!(event = "registry.logout_failed", registry = %registry, error = %error);
}

pub fn emit_run_finished(run_id: &str, status: RunStatus, duration_ms: u64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        status = status.as_str(),
        duration_ms = duration_ms,
    );
}

pub fn emit_run_failed(run_id: &str, error: &dyn std::fmt::Display) {
    error!(event = "run.failed", run_id = %run_id, error = %error);
}
