//! Builder for executing external tool commands with timeout and cancellation.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Default command timeout for short invocations: 5 minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// The child is spawned with kill-on-drop, so a timeout or a cancelled token
/// terminates the process instead of leaving it running in the background.
///
/// # Example
///
/// ```no_run
/// use stemdub_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> stemdub_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("yt-dlp"))
///     .arg("--flat-playlist")
///     .arg("-J")
///     .arg("https://example.com/playlist")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: Some(DEFAULT_TIMEOUT),
            cancel: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = Some(d);
        self
    }

    /// Set or clear the maximum execution time. `None` lets the process run
    /// until it exits or the command is cancelled.
    pub fn timeout_opt(&mut self, d: Option<Duration>) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Abort the process as soon as `token` is cancelled.
    pub fn cancel_on(&mut self, token: &CancellationToken) -> &mut Self {
        self.cancel = Some(token.clone());
        self
    }

    /// Arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`stemdub_core::Error::Tool`] if spawning fails, the process exits
    ///   with a non-zero status (message includes stderr), or the timeout
    ///   expires.
    /// - [`stemdub_core::Error::Cancelled`] if the cancellation token fires.
    pub async fn execute(&self) -> stemdub_core::Result<ToolOutput> {
        let program_name = self.program_name();

        if let Some(ref token) = self.cancel {
            if token.is_cancelled() {
                return Err(stemdub_core::Error::Cancelled(format!(
                    "{program_name} not started"
                )));
            }
        }

        tracing::debug!("exec {} {:?}", self.program.display(), self.args);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| stemdub_core::Error::Tool {
            tool: program_name.clone(),
            message: format!("failed to spawn: {e}"),
        })?;

        let wait = child.wait_with_output();
        let bounded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, wait).await.ok(),
                None => Some(wait.await),
            }
        };

        let cancelled = async {
            match self.cancel {
                Some(ref token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        let result = tokio::select! {
            r = bounded => r,
            _ = cancelled => {
                tracing::info!("{program_name} cancelled");
                return Err(stemdub_core::Error::Cancelled(format!(
                    "{program_name} was cancelled"
                )));
            }
        };

        match result {
            Some(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(stemdub_core::Error::Tool {
                        tool: program_name,
                        message: format!(
                            "exited with status {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    });
                }

                Ok(tool_output)
            }
            Some(Err(e)) => Err(stemdub_core::Error::Tool {
                tool: program_name,
                message: format!("I/O error waiting for process: {e}"),
            }),
            None => Err(stemdub_core::Error::Tool {
                tool: program_name,
                message: format!("timed out after {:?}", self.timeout.unwrap_or_default()),
            }),
        }
    }
}
