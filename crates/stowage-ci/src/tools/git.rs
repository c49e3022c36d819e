//! `git` client.

use std::path::Path;

use async_trait::async_trait;
use stowage_core::{EffectiveBranch, RepoSpec, Result};

use crate::runner::{ToolCommand, ToolRunner};
use crate::tools::SourceControl;

pub struct GitCli {
    timeout_secs: u64,
}

impl GitCli {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    /// `git clone --depth 1 --single-branch --branch <branch> <url> <dest>`
    pub fn clone_command(&self, repo: &RepoSpec, branch: &EffectiveBranch, dest: &Path) -> ToolCommand {
        ToolCommand::new("git")
            .args(["clone", "--depth", "1", "--single-branch", "--branch"])
            .arg(branch.as_str())
            .arg(repo.clone_url.as_str())
            .arg(dest.to_string_lossy())
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout(self.timeout_secs)
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn shallow_checkout(
        &self,
        repo: &RepoSpec,
        branch: &EffectiveBranch,
        dest: &Path,
    ) -> Result<()> {
        ToolRunner::run_checked(&self.clone_command(repo, branch, dest)).await?;
        Ok(())
    }
}
