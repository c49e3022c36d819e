//! Stowage CLI
//!
//! The `stowage` command builds a set of repositories on one branch, stages
//! their primary artifacts and publishes them as a versioned image.
//!
//! ## Commands
//!
//! - `run`: execute the whole pipeline once
//! - `resolve-branch`: print the branch a run would build, without building
//!
//! Exit status: `0` success, `1` failed, `3` not built.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::builder::{FalseyValueParser, PossibleValuesParser};
use clap::{ArgAction, Args, Parser, Subcommand};
use stowage_ci::{Pipeline, RunReport, Toolchain};
use stowage_core::config::{
    DEFAULT_BASE_IMAGE, DEFAULT_BASE_URL, DEFAULT_IMAGE_NAME, DEFAULT_NAMESPACE,
    DEFAULT_REGISTRY, DEFAULT_WORKSPACE,
};
use stowage_core::{
    resolve_branch, AnalysisConfig, BranchDecision, BranchSignals, BuildMode, BuildOutcome,
    ImageConfig, PipelineConfig, RegistryCredentials, RunStatus, Timeouts, ALLOWED_BRANCHES,
};
use tracing::Level;

const REGISTRY_USERNAME_ENV: &str = "REGISTRY_USERNAME";
const REGISTRY_PASSWORD_ENV: &str = "REGISTRY_PASSWORD";
const SONAR_TOKEN_ENV: &str = "SONAR_TOKEN";

#[derive(Parser)]
#[command(name = "stowage")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-repository build-and-bundle pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines (and the final report as JSON)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every listed repository and publish the bundle image
    Run(RunArgs),

    /// Print the effective branch for the given signals
    ResolveBranch(BranchArgs),
}

/// Branch signals, shared by `run` and `resolve-branch`.
#[derive(Args, Debug, Clone)]
struct BranchArgs {
    /// Fallback branch when no push signal is present
    #[arg(long, env = "STOWAGE_BRANCH", value_parser = PossibleValuesParser::new(ALLOWED_BRANCHES))]
    branch: Option<String>,

    /// Full ref of the webhook push event (e.g. refs/heads/main)
    #[arg(long, env = "WEBHOOK_REF")]
    webhook_ref: Option<String>,

    /// Branch reported by the SCM plugin (e.g. origin/main)
    #[arg(long, env = "GIT_BRANCH")]
    scm_branch: Option<String>,
}

impl BranchArgs {
    fn signals(&self) -> BranchSignals {
        BranchSignals {
            webhook_ref: self.webhook_ref.clone(),
            scm_branch: self.scm_branch.clone(),
            fallback: self.branch.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Repository owner substituted for `{owner}` in the base URL
    #[arg(long, env = "STOWAGE_OWNER", default_value = "")]
    owner: String,

    /// Clone URL template
    #[arg(long, env = "STOWAGE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Comma-delimited repository names
    #[arg(long, env = "STOWAGE_REPOS")]
    repos: String,

    #[command(flatten)]
    branch: BranchArgs,

    /// Packaging strategy: single or bundle
    #[arg(long, env = "STOWAGE_BUILD_MODE", default_value = "bundle")]
    build_mode: BuildMode,

    /// Submit built repositories for static analysis
    #[arg(long, env = "STOWAGE_STATIC_ANALYSIS", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    static_analysis: bool,

    /// Analysis server URL
    #[arg(long, env = "SONAR_HOST_URL")]
    sonar_url: Option<String>,

    /// Fail the whole run when any repository does not build
    #[arg(long, env = "STOWAGE_FAIL_ON_MISSING_BRANCH", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    fail_on_missing_branch: bool,

    /// Run workspace; the previous run's outputs are removed at start
    #[arg(long, env = "STOWAGE_WORKSPACE", default_value = DEFAULT_WORKSPACE)]
    workspace: PathBuf,

    /// Registry host
    #[arg(long, env = "STOWAGE_REGISTRY", default_value = DEFAULT_REGISTRY)]
    registry: String,

    /// Image namespace
    #[arg(long, env = "STOWAGE_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Image repository name in bundle mode
    #[arg(long, env = "STOWAGE_IMAGE_NAME", default_value = DEFAULT_IMAGE_NAME)]
    image_name: String,

    /// Dockerfile to build with (generated when omitted)
    #[arg(long, env = "STOWAGE_DOCKERFILE")]
    dockerfile: Option<PathBuf>,

    /// Base image of the generated Dockerfile
    #[arg(long, env = "STOWAGE_BASE_IMAGE", default_value = DEFAULT_BASE_IMAGE)]
    base_image: String,

    /// Checkout timeout per repository, 0 disables
    #[arg(long)]
    checkout_timeout_secs: Option<u64>,

    /// Build timeout per repository and for the image build, 0 disables
    #[arg(long)]
    build_timeout_secs: Option<u64>,
}

impl RunArgs {
    /// Turn parsed flags into a pipeline configuration. Secrets come from
    /// `env` only.
    fn into_config(self, env: impl Fn(&str) -> Option<String>) -> PipelineConfig {
        let mut timeouts = Timeouts::default();
        if let Some(secs) = self.checkout_timeout_secs {
            timeouts.checkout_secs = secs;
        }
        if let Some(secs) = self.build_timeout_secs {
            timeouts.build_secs = secs;
            timeouts.image_secs = secs;
        }

        let credentials = match (env(REGISTRY_USERNAME_ENV), env(REGISTRY_PASSWORD_ENV)) {
            (Some(username), Some(password)) if !username.is_empty() => {
                Some(RegistryCredentials { username, password })
            }
            _ => None,
        };

        PipelineConfig {
            owner: self.owner,
            base_url: self.base_url,
            repos: self.repos,
            signals: self.branch.signals(),
            build_mode: self.build_mode,
            analysis: AnalysisConfig {
                enabled: self.static_analysis,
                host_url: self.sonar_url,
                token: env(SONAR_TOKEN_ENV).filter(|t| !t.is_empty()),
            },
            fail_on_missing_branch: self.fail_on_missing_branch,
            workspace: self.workspace,
            image: ImageConfig {
                registry: self.registry,
                namespace: self.namespace,
                name: self.image_name,
                dockerfile: self.dockerfile,
                base_image: self.base_image,
            },
            credentials,
            timeouts,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    stowage_core::init_tracing(cli.json, level);

    let status = match cli.command {
        Commands::Run(args) => cmd_run(args, cli.json).await?,
        Commands::ResolveBranch(args) => cmd_resolve_branch(&args),
    };

    std::process::exit(status.exit_code());
}

async fn cmd_run(args: RunArgs, json: bool) -> Result<RunStatus> {
    let config = args.into_config(|key| std::env::var(key).ok());
    let tools = Toolchain::system(&config.timeouts);
    let workspace = config.workspace.clone();

    let report = Pipeline::new(config, tools).run().await;

    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
        println!("{rendered}");
    } else {
        print_summary(&report);
        println!(
            "Report: {}",
            stowage_core::context::report_path(&workspace).display()
        );
    }
    Ok(report.status)
}

fn cmd_resolve_branch(args: &BranchArgs) -> RunStatus {
    match resolve_branch(&args.signals()) {
        BranchDecision::Build { branch, source } => {
            println!("{branch} (from {})", source.as_str());
            RunStatus::Success
        }
        BranchDecision::NotAllowed { candidate, source } => {
            println!(
                "'{candidate}' (from {}) is not allowed; allowed: {}",
                source.as_str(),
                ALLOWED_BRANCHES.join(", ")
            );
            RunStatus::NotBuilt
        }
    }
}

fn print_summary(report: &RunReport) {
    println!("Run {} : {}", report.run_id, report.status);
    if let Some(branch) = &report.branch {
        println!("  Branch: {branch}");
    }
    for outcome in &report.outcomes {
        match &outcome.outcome {
            BuildOutcome::Built { artifact } => println!(
                "  [built]   {} -> {} ({} ms)",
                outcome.repo,
                artifact.path.display(),
                outcome.duration_ms
            ),
            other => println!(
                "  [{}] {}: {}",
                other.label(),
                outcome.repo,
                other.reason().unwrap_or_default()
            ),
        }
    }
    if let Some(image) = &report.image {
        println!("  Image: {}", image.reference);
    }
    if let Some(error) = &report.error {
        println!("  Error: {error}");
    }
}
