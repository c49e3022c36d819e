//! Stowage CI - pipeline execution
//!
//! Drives the external tools of a run:
//! - shallow checkout and packaging of every repository, in parallel
//! - optional static analysis of the built repositories
//! - versioned image build and push

pub mod analysis;
pub mod coordinator;
pub mod fakes;
pub mod pipeline;
pub mod publisher;
pub mod runner;
pub mod task;
pub mod tools;

// Re-export key types
pub use analysis::{run_static_analysis, AnalysisSummary};
pub use coordinator::BuildCoordinator;
pub use pipeline::{Pipeline, RunReport};
pub use publisher::{ImagePublisher, PublishedImage};
pub use runner::{ToolCommand, ToolOutput, ToolRunner};
pub use task::RepoBuildTask;
pub use tools::{BuildTool, ContainerEngine, DockerCli, GitCli, MavenCli, SourceControl, Toolchain};
