//! External tool execution.
//!
//! Every subprocess the pipeline starts goes through [`ToolRunner::run`]:
//! arguments are passed as a vector (never through a shell), secrets travel
//! over stdin or the child's environment, and each call has a timeout.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use stowage_core::{Result, StowageError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Bytes of stderr kept in error messages.
const STDERR_TAIL: usize = 2048;

/// One external tool invocation.
#[derive(Clone, Default)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Extra environment for the child. Values are never logged.
    pub env: Vec<(String, String)>,
    /// Written to the child's stdin, then closed. Never logged.
    pub stdin: Option<String>,
    /// `0` disables the timeout.
    pub timeout_secs: u64,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// `program arg1 arg2`, for log lines.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Debug for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCommand")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field(
                "env",
                &self.env.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            )
            .field("stdin", &self.stdin.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Result of a tool invocation that ran to completion.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub program: String,

    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,

    pub duration_ms: u64,

    pub success: bool,
}

impl ToolOutput {
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// Turn a non-zero exit into [`StowageError::Tool`].
    pub fn into_result(self) -> Result<ToolOutput> {
        if self.passed() {
            return Ok(self);
        }
        Err(StowageError::tool(
            self.program.clone(),
            format!("exit code {}: {}", self.exit_code, stderr_tail(&self.stderr)),
        ))
    }
}

fn stderr_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL {
        return trimmed;
    }
    let mut start = trimmed.len() - STDERR_TAIL;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    &trimmed[start..]
}

/// Runs external tools.
pub struct ToolRunner;

impl ToolRunner {
    /// Run a command to completion and capture its output.
    ///
    /// Spawn failures and timeouts are errors; a non-zero exit is not (see
    /// [`ToolOutput::into_result`]). The child is killed if the returned
    /// future is dropped.
    pub async fn run(cmd: &ToolCommand) -> Result<ToolOutput> {
        let start = Instant::now();

        if cmd.program.is_empty() {
            return Err(StowageError::tool("<empty>", "empty command"));
        }

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .envs(cmd.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if cmd.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }

        debug!(command = %cmd.display(), "spawning tool");
        let mut child = command
            .spawn()
            .map_err(|e| StowageError::tool(cmd.program.clone(), format!("failed to spawn: {e}")))?;

        if let Some(input) = &cmd.stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes()).await?;
                pipe.shutdown().await?;
            }
        }

        let output = if cmd.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(cmd.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| StowageError::Timeout {
                tool: cmd.program.clone(),
                secs: cmd.timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        Ok(ToolOutput {
            program: cmd.program.clone(),
            exit_code,
            stdout,
            stderr,
            duration_ms,
            success: output.status.success(),
        })
    }

    /// Run and require a zero exit.
    pub async fn run_checked(cmd: &ToolCommand) -> Result<ToolOutput> {
        Self::run(cmd).await?.into_result()
    }
}
