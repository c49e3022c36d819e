//! Seams to the external tools the pipeline drives.
//!
//! The pipeline talks to source control, the build tool and the container
//! engine only through these traits. CLI-backed implementations live in the
//! submodules; in-memory fakes are in [`crate::fakes`].

mod docker;
mod git;
mod maven;

pub use docker::DockerCli;
pub use git::GitCli;
pub use maven::MavenCli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use stowage_core::{AnalysisConfig, EffectiveBranch, RegistryCredentials, RepoSpec, Result, Timeouts};

/// Version control client.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Fetch only the latest commit of `branch` into `dest`.
    ///
    /// Fails if the branch does not exist, or on network and auth errors.
    async fn shallow_checkout(
        &self,
        repo: &RepoSpec,
        branch: &EffectiveBranch,
        dest: &Path,
    ) -> Result<()>;
}

/// Build tool.
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Build and package with tests disabled. Returns the directory holding
    /// the packaged outputs.
    async fn package(&self, repo_dir: &Path) -> Result<PathBuf>;

    /// Submit the checked-out repository to the static-analysis server.
    async fn analyze(&self, repo: &RepoSpec, repo_dir: &Path, config: &AnalysisConfig)
        -> Result<()>;
}

/// Container engine and registry client.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Tags present locally for `repository`.
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>>;

    /// Build `context_dir` with `dockerfile` and tag the result `reference`.
    async fn build_image(&self, reference: &str, dockerfile: &Path, context_dir: &Path)
        -> Result<()>;

    async fn login(&self, registry: &str, credentials: &RegistryCredentials) -> Result<()>;

    async fn push(&self, reference: &str) -> Result<()>;

    async fn logout(&self, registry: &str) -> Result<()>;
}

/// The set of tools a pipeline run uses.
#[derive(Clone)]
pub struct Toolchain {
    pub scm: Arc<dyn SourceControl>,
    pub build: Arc<dyn BuildTool>,
    pub engine: Arc<dyn ContainerEngine>,
}

impl Toolchain {
    pub fn new(
        scm: Arc<dyn SourceControl>,
        build: Arc<dyn BuildTool>,
        engine: Arc<dyn ContainerEngine>,
    ) -> Self {
        Self { scm, build, engine }
    }

    /// `git`, `mvn` and `docker` from `PATH`.
    pub fn system(timeouts: &Timeouts) -> Self {
        Self::new(
            Arc::new(GitCli::new(timeouts.checkout_secs)),
            Arc::new(MavenCli::new(timeouts.build_secs)),
            Arc::new(DockerCli::new(timeouts.image_secs)),
        )
    }
}
