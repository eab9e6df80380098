//! Builder for running `git` as a child process.
//!
//! Commands run on a `tokio` process driver so one deadline bounds both the
//! exit of the child and the draining of its pipes. Callers are synchronous;
//! each execution drives its own current-thread runtime.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::SyncError;

/// Captured output of a successful command.
#[derive(Debug, Default)]
pub(crate) struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A single `git` invocation.
///
/// Output is always captured. Commands that run past the timeout are killed
/// and reported as [`SyncError::Timeout`].
pub(crate) struct GitCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl GitCommand {
    pub fn new() -> Self {
        Self {
            program: "git".to_owned(),
            args: Vec::new(),
            current_dir: None,
            timeout: None,
        }
    }

    /// Run `program` instead of `git`.
    #[cfg(test)]
    pub fn program(mut self, program: &str) -> Self {
        self.program = program.to_owned();
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

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn display(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }

    /// Run the command and require a zero exit status.
    ///
    /// Non-empty stdout is logged at debug level and stderr at warn level.
    pub fn execute_success(self) -> Result<GitOutput, SyncError> {
        let command = self.display();
        let (status, output) = self.run(&command)?;

        if !output.stdout.trim().is_empty() {
            tracing::debug!(target: "git", command = %command, "{}", output.stdout.trim_end());
        }
        if !output.stderr.trim().is_empty() {
            tracing::warn!(target: "git", command = %command, "{}", output.stderr.trim_end());
        }

        if !status.success() {
            return Err(SyncError::Command {
                command,
                status: status.code(),
                stderr: output.stderr.trim().to_owned(),
            });
        }
        Ok(output)
    }

    fn run(self, command: &str) -> Result<(ExitStatus, GitOutput), SyncError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| SyncError::Spawn {
                command: command.to_owned(),
                source,
            })?;
        runtime.block_on(self.run_async(command))
    }

    async fn run_async(self, command: &str) -> Result<(ExitStatus, GitOutput), SyncError> {
        let spawn_err = |source| SyncError::Spawn {
            command: command.to_owned(),
            source,
        };
        match &self.current_dir {
            Some(dir) => {
                tracing::debug!(target: "git", dir = %dir.display(), "executing: {command}");
            }
            None => tracing::debug!(target: "git", "executing: {command}"),
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(spawn_err)?;
        let Some(timeout) = self.timeout else {
            return collect(&mut child).await.map_err(spawn_err);
        };

        // The deadline also covers pipe draining, so a helper process holding
        // the pipes open after git exits cannot stall the call
        if let Ok(result) = tokio::time::timeout(timeout, collect(&mut child)).await {
            return result.map_err(spawn_err);
        }
        tracing::warn!(target: "git", "command timed out after {}s: {command}", timeout.as_secs());
        // Kills and reaps the child
        if let Err(e) = child.kill().await {
            tracing::warn!(target: "git", "failed to kill timed out command: {e}");
        }
        Err(SyncError::Timeout {
            command: command.to_owned(),
            timeout,
        })
    }
}

/// Wait for `child` to exit while draining both pipes.
async fn collect(child: &mut Child) -> std::io::Result<(ExitStatus, GitOutput)> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (status, stdout, stderr) = tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr));
    Ok((
        status?,
        GitOutput {
            stdout: stdout?,
            stderr: stderr?,
        },
    ))
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<String> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
