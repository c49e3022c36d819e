//! `mvn` build tool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use stowage_core::{AnalysisConfig, RepoSpec, Result, StowageError};

use crate::runner::{ToolCommand, ToolRunner};
use crate::tools::BuildTool;

/// Where Maven writes packaged outputs, relative to the project root.
const OUTPUT_DIR: &str = "target";

pub struct MavenCli {
    timeout_secs: u64,
}

impl MavenCli {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    pub fn package_command(&self, repo_dir: &Path) -> ToolCommand {
        ToolCommand::new("mvn")
            .args(["-B", "-DskipTests", "package"])
            .current_dir(repo_dir)
            .timeout(self.timeout_secs)
    }

    /// The token goes through `SONAR_TOKEN`, never the argument list.
    pub fn analyze_command(
        &self,
        repo: &RepoSpec,
        repo_dir: &Path,
        config: &AnalysisConfig,
    ) -> Result<ToolCommand> {
        let host_url = config.host_url.as_deref().ok_or_else(|| {
            StowageError::InvalidConfig("static analysis server URL is not set".to_string())
        })?;
        let mut cmd = ToolCommand::new("mvn")
            .args(["-B", "sonar:sonar"])
            .arg(format!("-Dsonar.projectKey={}", repo.name))
            .arg(format!("-Dsonar.host.url={host_url}"))
            .current_dir(repo_dir)
            .timeout(self.timeout_secs);
        if let Some(token) = &config.token {
            cmd = cmd.env("SONAR_TOKEN", token.as_str());
        }
        Ok(cmd)
    }
}

#[async_trait]
impl BuildTool for MavenCli {
    async fn package(&self, repo_dir: &Path) -> Result<PathBuf> {
        ToolRunner::run_checked(&self.package_command(repo_dir)).await?;
        Ok(repo_dir.join(OUTPUT_DIR))
    }

    async fn analyze(
        &self,
        repo: &RepoSpec,
        repo_dir: &Path,
        config: &AnalysisConfig,
    ) -> Result<()> {
        ToolRunner::run_checked(&self.analyze_command(repo, repo_dir, config)?).await?;
        Ok(())
    }
}
