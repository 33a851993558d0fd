//! Subprocess execution
//!
//! The single point of contact with the operating system's process
//! facility. Converters take a [`CommandRunner`] rather than spawning
//! directly so tests can substitute a scripted toolchain.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::EngineError;

/// Captured output of a finished child process.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when the child was terminated by a signal.
    pub status: Option<i32>,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Executes a command line in a working directory and captures its output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        argv: &[String],
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Result<RunOutput, EngineError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        argv: &[String],
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Result<RunOutput, EngineError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| EngineError::Toolchain("empty command line".to_string()))?;

        debug!(command = %argv.join(" "), cwd = %cwd.display(), "spawning child process");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future (e.g. on timeout) must not leave
            // the child running.
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| EngineError::Launch {
            command: program.clone(),
            source,
        })?;

        let wait = child.wait_with_output();
        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| EngineError::Timeout(limit.as_millis() as u64))??,
            None => wait.await?,
        };

        Ok(RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        })
    }
}
