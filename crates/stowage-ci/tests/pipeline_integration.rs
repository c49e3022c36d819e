//! Integration tests for the full pipeline with in-memory tools.

use std::path::Path;
use std::sync::Arc;

use stowage_ci::fakes::{FakeBuildTool, FakeContainerEngine, FakeSourceControl};
use stowage_ci::{Pipeline, RunReport, Toolchain};
use stowage_core::{
    AnalysisConfig, BranchSignals, BuildMode, ImageConfig, PipelineConfig, RegistryCredentials,
    RunStatus,
};

const REPOSITORY: &str = "registry.example.com/team/bundle";

struct Harness {
    scm: Arc<FakeSourceControl>,
    build: Arc<FakeBuildTool>,
    engine: Arc<FakeContainerEngine>,
}

impl Harness {
    fn new(scm: FakeSourceControl, build: FakeBuildTool, engine: FakeContainerEngine) -> Self {
        Self {
            scm: Arc::new(scm),
            build: Arc::new(build),
            engine: Arc::new(engine),
        }
    }

    fn toolchain(&self) -> Toolchain {
        Toolchain::new(self.scm.clone(), self.build.clone(), self.engine.clone())
    }

    async fn run(&self, config: PipelineConfig) -> RunReport {
        Pipeline::new(config, self.toolchain()).run().await
    }
}

fn config(workspace: &Path, repos: &str, signals: BranchSignals) -> PipelineConfig {
    PipelineConfig {
        owner: "acme".to_string(),
        base_url: "https://git.example.com/{owner}".to_string(),
        repos: repos.to_string(),
        signals,
        workspace: workspace.to_path_buf(),
        image: ImageConfig {
            registry: "registry.example.com".to_string(),
            namespace: "team".to_string(),
            name: "bundle".to_string(),
            ..Default::default()
        },
        credentials: Some(RegistryCredentials {
            username: "ci".to_string(),
            password: "secret".to_string(),
        }),
        ..Default::default()
    }
}

fn push_event(branch: &str) -> BranchSignals {
    BranchSignals {
        webhook_ref: Some(format!("refs/heads/{branch}")),
        scm_branch: Some("origin/main".to_string()),
        fallback: Some("master".to_string()),
    }
}

fn two_services() -> FakeBuildTool {
    FakeBuildTool::new()
        .with_artifacts("svcA", &["svcA-1.0-sources.jar", "svcA-1.0.jar"])
        .with_artifacts("svcB", &["svcB-2.3.jar", "svcB-2.3-javadoc.jar"])
}

/// Test: push on feature/dev with two healthy repos stages two artifacts and
/// pushes one image at the next version.
#[tokio::test]
async fn test_end_to_end_push_builds_and_publishes() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services(),
        FakeContainerEngine::new().with_tags(REPOSITORY, &["v1", "v2", "latest"]),
    );

    let report = harness
        .run(config(ws.path(), "svcA, svcB", push_event("feature/dev")))
        .await;

    assert_eq!(report.status, RunStatus::Success, "error: {:?}", report.error);
    assert_eq!(report.branch.as_deref(), Some("feature/dev"));
    assert_eq!(report.repos, vec!["svcA", "svcB"]);
    assert_eq!(report.built_count(), 2);

    let artifacts = ws.path().join("artifacts");
    assert_eq!(
        std::fs::read_to_string(artifacts.join("svcA.jar")).unwrap(),
        "svcA-1.0.jar"
    );
    assert_eq!(
        std::fs::read_to_string(artifacts.join("svcB.jar")).unwrap(),
        "svcB-2.3.jar"
    );

    let image = report.image.expect("image should be published");
    assert_eq!(image.version, "v3");
    assert_eq!(image.reference, "registry.example.com/team/bundle:v3");
    assert_eq!(
        harness.engine.calls(),
        vec![
            "build registry.example.com/team/bundle:v3",
            "login registry.example.com",
            "push registry.example.com/team/bundle:v3",
            "logout registry.example.com",
        ]
    );

    let mut checkouts = harness.scm.checkouts();
    checkouts.sort();
    assert_eq!(
        checkouts,
        vec![
            ("svcA".to_string(), "feature/dev".to_string()),
            ("svcB".to_string(), "feature/dev".to_string()),
        ]
    );
}

/// Test: a disallowed branch is a neutral stop; nothing is checked out.
#[tokio::test]
async fn test_disallowed_branch_is_not_built() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services(),
        FakeContainerEngine::new(),
    );

    let report = harness
        .run(config(ws.path(), "svcA, svcB", push_event("feature/experiment")))
        .await;

    assert_eq!(report.status, RunStatus::NotBuilt);
    assert!(report.error.is_none());
    assert_eq!(report.branch.as_deref(), Some("feature/experiment"));
    assert!(harness.scm.checkouts().is_empty());
    assert!(harness.engine.calls().is_empty());
    assert!(ws.path().join("report.json").exists());
}

/// Test: an unused fallback off the allow-list does not override the webhook
/// branch.
#[tokio::test]
async fn test_unused_disallowed_fallback_does_not_matter() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services(),
        FakeContainerEngine::new(),
    );
    let signals = BranchSignals {
        webhook_ref: Some("refs/heads/main".to_string()),
        scm_branch: None,
        fallback: Some("develop".to_string()),
    };

    let report = harness.run(config(ws.path(), "svcA, svcB", signals)).await;

    assert_eq!(report.status, RunStatus::Success, "error: {:?}", report.error);
    assert_eq!(report.branch.as_deref(), Some("main"));
    assert_eq!(report.built_count(), 2);
}

/// Test: a disallowed fallback that is the only signal ends the run as not
/// built, not failed.
#[tokio::test]
async fn test_disallowed_fallback_alone_is_not_built() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services(),
        FakeContainerEngine::new(),
    );
    let signals = BranchSignals {
        fallback: Some("develop".to_string()),
        ..Default::default()
    };

    let report = harness.run(config(ws.path(), "svcA", signals)).await;

    assert_eq!(report.status, RunStatus::NotBuilt);
    assert!(report.error.is_none());
    assert_eq!(report.branch.as_deref(), Some("develop"));
    assert!(harness.scm.checkouts().is_empty());
}

/// Test: invalid names abort before any checkout and every bad name is listed.
#[tokio::test]
async fn test_invalid_repo_names_abort_before_checkout() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services(),
        FakeContainerEngine::new(),
    );

    let report = harness
        .run(config(ws.path(), "svcA, bad name, svc/B", push_event("main")))
        .await;

    assert_eq!(report.status, RunStatus::Failed);
    let error = report.error.expect("error should be recorded");
    assert!(error.contains("bad name"));
    assert!(error.contains("svc/B"));
    assert!(harness.scm.checkouts().is_empty());
}

/// Test: an empty repository list fails the run.
#[tokio::test]
async fn test_empty_repo_list_fails() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services(),
        FakeContainerEngine::new(),
    );

    let report = harness.run(config(ws.path(), " , ", push_event("main"))).await;

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.error.unwrap().contains("empty"));
}

/// Test: a missing branch in one repo is isolated when fail-fast is off.
#[tokio::test]
async fn test_missing_branch_is_isolated_without_fail_fast() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new().with_missing_branch("svcB"),
        two_services().with_artifacts("svcC", &["svcC.jar"]),
        FakeContainerEngine::new(),
    );

    let report = harness
        .run(config(ws.path(), "svcA, svcB, svcC", push_event("uat")))
        .await;

    assert_eq!(report.status, RunStatus::Success, "error: {:?}", report.error);
    assert_eq!(report.outcomes.len(), 3);
    let labels: Vec<&str> = report.outcomes.iter().map(|o| o.outcome.label()).collect();
    assert_eq!(labels, vec!["built", "skipped_missing_branch", "built"]);
    assert_eq!(report.image.unwrap().version, "v1");
}

/// Test: with fail-fast a missing branch fails the whole run and no image is
/// published.
#[tokio::test]
async fn test_fail_fast_fails_run_on_missing_branch() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new().with_missing_branch("svcB"),
        two_services(),
        FakeContainerEngine::new(),
    );
    let mut cfg = config(ws.path(), "svcA, svcB", push_event("main"));
    cfg.fail_on_missing_branch = true;

    let report = harness.run(cfg).await;

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.error.unwrap().contains("svcB"));
    assert!(report.image.is_none());
    assert!(harness.engine.calls().is_empty());
    assert!(report
        .outcomes
        .iter()
        .any(|o| o.repo == "svcB" && o.outcome.label() == "skipped_missing_branch"));
}

/// Test: an image build failure fails the run before any registry call.
#[tokio::test]
async fn test_image_build_failure_fails_run() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services(),
        FakeContainerEngine::new().failing_build(),
    );

    let report = harness
        .run(config(ws.path(), "svcA, svcB", push_event("main")))
        .await;

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.image.is_none());
    assert_eq!(report.built_count(), 2);
    assert!(harness
        .engine
        .calls()
        .iter()
        .all(|c| !c.starts_with("login") && !c.starts_with("push")));
}

/// Test: a push failure fails the run.
#[tokio::test]
async fn test_push_failure_fails_run() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services(),
        FakeContainerEngine::new().failing_push(),
    );

    let report = harness
        .run(config(ws.path(), "svcA, svcB", push_event("master")))
        .await;

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.image.is_none());
    assert_eq!(
        harness.engine.calls().last().map(String::as_str),
        Some("logout registry.example.com")
    );
}

/// Test: missing registry credentials fail the run.
#[tokio::test]
async fn test_missing_credentials_fail_run() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services(),
        FakeContainerEngine::new(),
    );
    let mut cfg = config(ws.path(), "svcA", push_event("main"));
    cfg.credentials = None;

    let report = harness.run(cfg).await;

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.error.unwrap().contains("credentials"));
}

/// Test: analysis runs for built repos only and its failures do not fail the
/// run.
#[tokio::test]
async fn test_static_analysis_is_fire_and_forget() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services().with_failing_analysis("svcB"),
        FakeContainerEngine::new(),
    );
    let mut cfg = config(ws.path(), "svcA, svcB", push_event("main"));
    cfg.analysis = AnalysisConfig {
        enabled: true,
        host_url: Some("https://sonar.example.com".to_string()),
        token: Some("token".to_string()),
    };

    let report = harness.run(cfg).await;

    assert_eq!(report.status, RunStatus::Success, "error: {:?}", report.error);
    let analysis = report.analysis.expect("analysis summary");
    assert_eq!(analysis.submitted, vec!["svcA"]);
    assert_eq!(analysis.failed, vec!["svcB"]);
}

/// Test: single build mode names the image after its only repository.
#[tokio::test]
async fn test_single_mode_uses_repo_name() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services(),
        FakeContainerEngine::new(),
    );
    let mut cfg = config(ws.path(), "svcA", push_event("main"));
    cfg.build_mode = BuildMode::Single;

    let report = harness.run(cfg).await;

    assert_eq!(report.status, RunStatus::Success, "error: {:?}", report.error);
    assert_eq!(
        report.image.unwrap().reference,
        "registry.example.com/team/svca:v1"
    );
}

/// Test: leftovers from a previous run are removed at start.
#[tokio::test]
async fn test_previous_run_leftovers_are_cleaned() {
    let ws = tempfile::tempdir().unwrap();
    let stale = ws.path().join("artifacts").join("stale.jar");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, b"old").unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services(),
        FakeContainerEngine::new(),
    );

    let report = harness.run(config(ws.path(), "svcA", push_event("main"))).await;

    assert_eq!(report.status, RunStatus::Success, "error: {:?}", report.error);
    assert!(!stale.exists());
}

/// Test: a configured Dockerfile and other job files inside the workspace
/// survive cleanup and are used for the image build.
#[tokio::test]
async fn test_configured_dockerfile_in_workspace_survives_cleanup() {
    let ws = tempfile::tempdir().unwrap();
    let dockerfile = ws.path().join("Dockerfile.app");
    std::fs::write(&dockerfile, "FROM eclipse-temurin:21-jre\nCOPY artifacts/ /srv/\n").unwrap();
    std::fs::write(ws.path().join("Jenkinsfile"), "pipeline {}").unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services(),
        FakeContainerEngine::new(),
    );
    let mut cfg = config(ws.path(), "svcA", push_event("main"));
    cfg.image.dockerfile = Some(dockerfile.clone());

    let report = harness.run(cfg).await;

    assert_eq!(report.status, RunStatus::Success, "error: {:?}", report.error);
    assert!(dockerfile.is_file());
    assert!(ws.path().join("Jenkinsfile").is_file());
    assert!(!ws.path().join("Dockerfile.stowage").exists());
}

/// Test: the report written to disk matches the returned one.
#[tokio::test]
async fn test_report_written_to_workspace() {
    let ws = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeSourceControl::new(),
        two_services(),
        FakeContainerEngine::new(),
    );

    let report = harness
        .run(config(ws.path(), "svcA, svcB", push_event("main")))
        .await;

    let raw = std::fs::read_to_string(ws.path().join("report.json")).unwrap();
    let on_disk: RunReport = serde_json::from_str(&raw).unwrap();
    assert_eq!(on_disk.run_id, report.run_id);
    assert_eq!(on_disk.status, RunStatus::Success);
    assert_eq!(on_disk.outcomes.len(), 2);
}
