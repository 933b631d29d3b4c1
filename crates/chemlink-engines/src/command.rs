//! Bounded execution of external chemistry tools.

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, trace};

use chemlink_core::defaults::ENGINE_CMD_TIMEOUT_SECS;
use chemlink_core::{Error, Result};

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub status: String,
    pub stdout: Vec<String>,
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout lines joined with `\n`.
    pub fn joined(&self) -> String {
        self.stdout.join("\n")
    }
}

/// Runs external tools with a per-command timeout.
///
/// The child is killed when the timeout fires. Launch failures and
/// timeouts are `Error::Command`.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(ENGINE_CMD_TIMEOUT_SECS))
    }
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Read `ENGINE_CMD_TIMEOUT_SECS` from the environment.
    pub fn from_env() -> Self {
        let secs = std::env::var("ENGINE_CMD_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(ENGINE_CMD_TIMEOUT_SECS);
        Self::new(Duration::from_secs(secs))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run to completion and return stdout lines. A non-zero exit is an error.
    pub async fn run<S: AsRef<OsStr>>(&self, program: &str, args: &[S]) -> Result<Vec<String>> {
        let output = self.capture(program, args).await?;
        if !output.success {
            return Err(Error::Command(format!(
                "{} failed (exit {}): {}",
                program,
                output.status,
                output.stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    /// Run to completion and return everything, whatever the exit status.
    pub async fn capture<S: AsRef<OsStr>>(
        &self,
        program: &str,
        args: &[S],
    ) -> Result<CommandOutput> {
        let rendered: Vec<String> = args
            .iter()
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .collect();
        debug!(program, args = ?rendered, "Executing command");

        let start = Instant::now();
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                Error::Command(format!(
                    "{} timed out after {}s",
                    program,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::Command(format!("Failed to execute {}: {}", program, e)))?;

        let stdout: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect();
        let duration_ms = start.elapsed().as_millis() as u64;
        trace!(
            program,
            line_count = stdout.len(),
            duration_ms,
            exit = %output.status,
            "Command finished"
        );

        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
