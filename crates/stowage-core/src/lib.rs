//! Stowage Core
//!
//! Domain logic of the build-and-bundle pipeline:
//! - branch resolution and the allow-list gate
//! - repository list parsing and validation
//! - primary artifact selection and staging
//! - image version computation
//! - typed configuration, run context and outcomes

pub mod artifact;
pub mod branch;
pub mod config;
pub mod context;
pub mod error;
pub mod obs;
pub mod outcome;
pub mod repos;
pub mod telemetry;
pub mod version;

pub use artifact::{
    find_primary_artifact, select_primary_artifact, stage_artifact, StagedArtifact,
};
pub use branch::{
    resolve_branch, BranchDecision, BranchSignals, BranchSource, EffectiveBranch,
    ALLOWED_BRANCHES,
};
pub use config::{
    AnalysisConfig, BuildMode, ImageConfig, PipelineConfig, RegistryCredentials, Timeouts,
};
pub use context::RunContext;
pub use error::{Result, StowageError};
pub use outcome::{BuildOutcome, RepoOutcome, RunStatus};
pub use repos::{parse_repo_list, RepoSpec};
pub use telemetry::init_tracing;
pub use version::{next_version, ImageVersion};

/// Stowage version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
