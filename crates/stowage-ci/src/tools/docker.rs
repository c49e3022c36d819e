//! `docker` container engine.

use std::path::Path;

use async_trait::async_trait;
use stowage_core::{RegistryCredentials, Result};

use crate::runner::{ToolCommand, ToolRunner};
use crate::tools::ContainerEngine;

pub struct DockerCli {
    timeout_secs: u64,
}

impl DockerCli {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    fn docker(&self) -> ToolCommand {
        ToolCommand::new("docker").timeout(self.timeout_secs)
    }

    pub fn list_tags_command(&self, repository: &str) -> ToolCommand {
        self.docker()
            .args(["image", "ls", repository, "--format", "{{.Tag}}"])
    }

    pub fn build_command(&self, reference: &str, dockerfile: &Path, context_dir: &Path) -> ToolCommand {
        self.docker()
            .args(["build", "-t", reference, "-f"])
            .arg(dockerfile.to_string_lossy())
            .arg(context_dir.to_string_lossy())
    }

    /// The password is written to stdin (`--password-stdin`).
    pub fn login_command(&self, registry: &str, credentials: &RegistryCredentials) -> ToolCommand {
        self.docker()
            .args(["login", registry, "--username", credentials.username.as_str(), "--password-stdin"])
            .stdin(credentials.password.as_str())
    }
}

/// One tag per line; blank lines and `<none>` are dropped.
pub(crate) fn parse_tag_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|tag| !tag.is_empty() && *tag != "<none>")
        .map(String::from)
        .collect()
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        let output = ToolRunner::run_checked(&self.list_tags_command(repository)).await?;
        Ok(parse_tag_lines(&output.stdout))
    }

    async fn build_image(&self, reference: &str, dockerfile: &Path, context_dir: &Path) -> Result<()> {
        ToolRunner::run_checked(&self.build_command(reference, dockerfile, context_dir)).await?;
        Ok(())
    }

    async fn login(&self, registry: &str, credentials: &RegistryCredentials) -> Result<()> {
        ToolRunner::run_checked(&self.login_command(registry, credentials)).await?;
        Ok(())
    }

    async fn push(&self, reference: &str) -> Result<()> {
        ToolRunner::run_checked(&self.docker().args(["push", reference])).await?;
        Ok(())
    }

    async fn logout(&self, registry: &str) -> Result<()> {
        ToolRunner::run_checked(&self.docker().args(["logout", registry])).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_passes_password_on_stdin() {
        let creds = RegistryCredentials {
            username: "ci-bot".to_string(),
            password: "hunter2".to_string(),
        };
        let cmd = DockerCli::new(60).login_command("registry.example.com", &creds);
        assert!(cmd.args.iter().all(|a| !a.contains("hunter2")));
        assert!(cmd.args.contains(&"--password-stdin".to_string()));
        assert_eq!(cmd.stdin.as_deref(), Some("hunter2"));
    }

    #[test]
    fn build_command_tags_and_uses_dockerfile() {
        let cmd = DockerCli::new(60).build_command(
            "registry.example.com/team/bundle:v3",
            Path::new("/ws/Dockerfile"),
            Path::new("/ws"),
        );
        assert_eq!(
            cmd.args,
            vec![
                "build",
                "-t",
                "registry.example.com/team/bundle:v3",
                "-f",
                "/ws/Dockerfile",
                "/ws",
            ]
        );
    }

    #[test]
    fn tag_lines_skip_blank_and_untagged() {
        let tags = parse_tag_lines("v1\n<none>\n\n v2 \nlatest\n");
        assert_eq!(tags, vec!["v1", "v2", "latest"]);
    }
}
