//! Typed pipeline configuration, validated once at run start.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::branch::BranchSignals;
use crate::error::{Result, StowageError};
use crate::repos::{expand_base_url, RepoSpec, OWNER_PLACEHOLDER};

pub const DEFAULT_BASE_URL: &str = "https://github.com/{owner}";
pub const DEFAULT_WORKSPACE: &str = ".stowage";
pub const DEFAULT_REGISTRY: &str = "docker.io";
pub const DEFAULT_NAMESPACE: &str = "stowage";
pub const DEFAULT_IMAGE_NAME: &str = "bundle";
pub const DEFAULT_BASE_IMAGE: &str = "eclipse-temurin:17-jre";

/// Packaging strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    /// Exactly one repository; the image is named after it.
    Single,
    /// Every built repository goes into one image named by `image.name`.
    #[default]
    Bundle,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Single => "single",
            BuildMode::Bundle => "bundle",
        }
    }
}

impl FromStr for BuildMode {
    type Err = StowageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(BuildMode::Single),
            "bundle" => Ok(BuildMode::Bundle),
            other => Err(StowageError::InvalidConfig(format!(
                "unknown build mode '{other}' (expected single or bundle)"
            ))),
        }
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry login. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Static-analysis server settings.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AnalysisConfig {
    pub enabled: bool,
    pub host_url: Option<String>,
    pub token: Option<String>,
}

impl std::fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("enabled", &self.enabled)
            .field("host_url", &self.host_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Target image settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    pub registry: String,
    pub namespace: String,
    /// Image repository name in bundle mode.
    pub name: String,
    /// Dockerfile to build with; a default one is generated when absent.
    pub dockerfile: Option<PathBuf>,
    /// Base image of the generated Dockerfile.
    pub base_image: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            name: DEFAULT_IMAGE_NAME.to_string(),
            dockerfile: None,
            base_image: DEFAULT_BASE_IMAGE.to_string(),
        }
    }
}

/// Subprocess timeouts in seconds; `0` disables the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub checkout_secs: u64,
    pub build_secs: u64,
    pub image_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            checkout_secs: 600,
            build_secs: 1800,
            image_secs: 1800,
        }
    }
}

/// Everything a run needs to know, recognized at run start.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Repository owner substituted into the base URL.
    pub owner: String,
    /// Clone URL template, may contain `{owner}`.
    pub base_url: String,
    /// Comma-delimited repository names.
    pub repos: String,
    pub signals: BranchSignals,
    pub build_mode: BuildMode,
    pub analysis: AnalysisConfig,
    /// Escalate any per-repository failure to a run failure.
    pub fail_on_missing_branch: bool,
    pub workspace: PathBuf,
    pub image: ImageConfig,
    pub credentials: Option<RegistryCredentials>,
    pub timeouts: Timeouts,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            repos: String::new(),
            signals: BranchSignals::default(),
            build_mode: BuildMode::default(),
            analysis: AnalysisConfig::default(),
            fail_on_missing_branch: false,
            workspace: PathBuf::from(DEFAULT_WORKSPACE),
            image: ImageConfig::default(),
            credentials: None,
            timeouts: Timeouts::default(),
        }
    }
}

impl PipelineConfig {
    /// Check option values that do not depend on the run's signals.
    ///
    /// Branch signals, the fallback included, are left to the branch gate so
    /// an unused or disallowed fallback never fails the run. Repository names
    /// and credentials are checked by the stages that use them so that their
    /// failures are reported where they happen.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.base_url.trim().is_empty() {
            problems.push("base URL must not be empty".to_string());
        }
        if self.base_url.contains(OWNER_PLACEHOLDER) && self.owner.trim().is_empty() {
            problems.push(format!(
                "base URL contains {OWNER_PLACEHOLDER} but no repository owner is set"
            ));
        }
        if self.workspace.as_os_str().is_empty() {
            problems.push("workspace must not be empty".to_string());
        }
        for (field, value) in [
            ("registry", &self.image.registry),
            ("namespace", &self.image.namespace),
            ("image name", &self.image.name),
            ("base image", &self.image.base_image),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{field} must not be empty"));
            }
        }
        if self.analysis.enabled && self.analysis.host_url.is_none() {
            problems.push("static analysis is enabled but no server URL is set".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(StowageError::InvalidConfig(problems.join("; ")))
        }
    }

    /// Base URL with the owner substituted.
    pub fn resolved_base_url(&self) -> String {
        expand_base_url(&self.base_url, &self.owner)
    }

    /// Image repository name for the given repositories.
    ///
    /// Single mode requires exactly one repository.
    pub fn image_name(&self, repos: &[RepoSpec]) -> Result<String> {
        match self.build_mode {
            BuildMode::Bundle => Ok(self.image.name.clone()),
            BuildMode::Single => match repos {
                [repo] => Ok(repo.name.to_ascii_lowercase()),
                _ => Err(StowageError::InvalidConfig(format!(
                    "single build mode needs exactly one repository, got {}",
                    repos.len()
                ))),
            },
        }
    }

    /// `<registry>/<namespace>/<name>`, the local repository tags are
    /// listed under.
    pub fn image_repository(&self, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.image.registry.trim_end_matches('/'),
            self.image.namespace,
            name
        )
    }
}
