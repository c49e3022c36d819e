//! In-memory fakes for the tool traits (testing only)
//!
//! Provides `FakeSourceControl`, `FakeBuildTool` and `FakeContainerEngine`
//! that satisfy the trait contracts without `git`, `mvn` or `docker`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use stowage_core::{
    AnalysisConfig, EffectiveBranch, RegistryCredentials, RepoSpec, Result, StowageError,
};

use crate::tools::{BuildTool, ContainerEngine, SourceControl};

fn repo_name(repo_dir: &Path) -> String {
    repo_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// FakeSourceControl
// ---------------------------------------------------------------------------

/// Checkout creates the destination directory; listed repos lack the branch.
#[derive(Debug, Default)]
pub struct FakeSourceControl {
    missing: HashSet<String>,
    checkouts: Mutex<Vec<(String, String)>>,
}

impl FakeSourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make checkouts of `repo` fail as if the branch did not exist.
    pub fn with_missing_branch(mut self, repo: &str) -> Self {
        self.missing.insert(repo.to_string());
        self
    }

    /// `(repo, branch)` pairs of successful checkouts, in call order.
    pub fn checkouts(&self) -> Vec<(String, String)> {
        self.checkouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceControl for FakeSourceControl {
    async fn shallow_checkout(
        &self,
        repo: &RepoSpec,
        branch: &EffectiveBranch,
        dest: &Path,
    ) -> Result<()> {
        if self.missing.contains(&repo.name) {
            return Err(StowageError::tool(
                "git",
                format!("Remote branch {branch} not found in upstream origin"),
            ));
        }
        std::fs::create_dir_all(dest)?;
        self.checkouts
            .lock()
            .unwrap()
            .push((repo.name.clone(), branch.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeBuildTool
// ---------------------------------------------------------------------------

/// Packaging writes the configured artifact files into `<repo>/target`, each
/// containing its own file name.
#[derive(Debug, Default)]
pub struct FakeBuildTool {
    artifacts: HashMap<String, Vec<String>>,
    failing_builds: HashSet<String>,
    failing_analysis: HashSet<String>,
    packaged: Mutex<Vec<String>>,
    analyzed: Mutex<Vec<String>>,
}

impl FakeBuildTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifacts(mut self, repo: &str, files: &[&str]) -> Self {
        self.artifacts.insert(
            repo.to_string(),
            files.iter().map(|f| f.to_string()).collect(),
        );
        self
    }

    pub fn with_failing_build(mut self, repo: &str) -> Self {
        self.failing_builds.insert(repo.to_string());
        self
    }

    pub fn with_failing_analysis(mut self, repo: &str) -> Self {
        self.failing_analysis.insert(repo.to_string());
        self
    }

    pub fn packaged(&self) -> Vec<String> {
        self.packaged.lock().unwrap().clone()
    }

    pub fn analyzed(&self) -> Vec<String> {
        let mut analyzed = self.analyzed.lock().unwrap().clone();
        analyzed.sort();
        analyzed
    }
}

#[async_trait]
impl BuildTool for FakeBuildTool {
    async fn package(&self, repo_dir: &Path) -> Result<PathBuf> {
        let name = repo_name(repo_dir);
        self.packaged.lock().unwrap().push(name.clone());
        if self.failing_builds.contains(&name) {
            return Err(StowageError::tool("mvn", "exit code 1: BUILD FAILURE"));
        }

        let target = repo_dir.join("target");
        std::fs::create_dir_all(&target)?;
        for file in self.artifacts.get(&name).into_iter().flatten() {
            std::fs::write(target.join(file), file.as_bytes())?;
        }
        Ok(target)
    }

    async fn analyze(
        &self,
        repo: &RepoSpec,
        _repo_dir: &Path,
        _config: &AnalysisConfig,
    ) -> Result<()> {
        if self.failing_analysis.contains(&repo.name) {
            return Err(StowageError::tool("mvn", "analysis server unreachable"));
        }
        self.analyzed.lock().unwrap().push(repo.name.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeContainerEngine
// ---------------------------------------------------------------------------

/// Records every call as a short string (`build <ref>`, `login <registry>`,
/// ...). Built references become visible to `list_tags`.
#[derive(Debug, Default)]
pub struct FakeContainerEngine {
    tags: Mutex<HashMap<String, Vec<String>>>,
    calls: Mutex<Vec<String>>,
    fail_build: bool,
    fail_login: bool,
    fail_push: bool,
}

impl FakeContainerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `repository` already has these tags.
    pub fn with_tags(self, repository: &str, tags: &[&str]) -> Self {
        self.tags.lock().unwrap().insert(
            repository.to_string(),
            tags.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn failing_build(mut self) -> Self {
        self.fail_build = true;
        self
    }

    pub fn failing_login(mut self) -> Self {
        self.fail_login = true;
        self
    }

    pub fn failing_push(mut self) -> Self {
        self.fail_push = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerEngine for FakeContainerEngine {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        Ok(self
            .tags
            .lock()
            .unwrap()
            .get(repository)
            .cloned()
            .unwrap_or_default())
    }

    async fn build_image(
        &self,
        reference: &str,
        dockerfile: &Path,
        _context_dir: &Path,
    ) -> Result<()> {
        self.record(format!("build {reference}"));
        if self.fail_build {
            return Err(StowageError::tool("docker", "build failed"));
        }
        if !dockerfile.is_file() {
            return Err(StowageError::tool(
                "docker",
                format!("Dockerfile not found: {}", dockerfile.display()),
            ));
        }
        if let Some((repository, tag)) = reference.rsplit_once(':') {
            self.tags
                .lock()
                .unwrap()
                .entry(repository.to_string())
                .or_default()
                .push(tag.to_string());
        }
        Ok(())
    }

    async fn login(&self, registry: &str, _credentials: &RegistryCredentials) -> Result<()> {
        self.record(format!("login {registry}"));
        if self.fail_login {
            return Err(StowageError::tool("docker", "unauthorized"));
        }
        Ok(())
    }

    async fn push(&self, reference: &str) -> Result<()> {
        self.record(format!("push {reference}"));
        if self.fail_push {
            return Err(StowageError::tool("docker", "denied: requested access is denied"));
        }
        Ok(())
    }

    async fn logout(&self, registry: &str) -> Result<()> {
        self.record(format!("logout {registry}"));
        Ok(())
    }
}
