//! Process runner for the playbook binary.
//!
//! The runner launches the binary with the JSON stdout callback forced on,
//! drains stdout and stderr concurrently, and reports the exit status
//! together with both captured streams. A non-zero exit is not an error at
//! this layer: deciding what a failed run means is left to the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use playbook_bridge::runner::ProcessRunner;
//!
//! # async fn example() -> playbook_bridge::Result<()> {
//! let output = ProcessRunner::new("ansible-playbook")
//!     .run(&["site.yml".to_string()])
//!     .await?;
//! println!("exit code: {:?}", output.exit_code);
//! # Ok(())
//! # }
//! ```

mod pump;

pub use pump::{drain, OutputLine, StreamKind};

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Environment variable selecting ansible's stdout callback
pub const STDOUT_CALLBACK_VAR: &str = "ANSIBLE_STDOUT_CALLBACK";

/// The callback that makes stdout a single JSON document
pub const STDOUT_CALLBACK_JSON: &str = "json";

/// Result of one playbook process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was ended by a signal
    pub exit_code: Option<i32>,
    /// Whether the process exited with status zero
    pub success: bool,
    /// Everything written to stdout
    pub stdout: Vec<u8>,
    /// Everything written to stderr
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Stdout as text, with invalid UTF-8 replaced
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr as text, with invalid UTF-8 replaced
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Launches the playbook binary and collects its output.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    binary: String,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
    tap: Option<mpsc::Sender<OutputLine>>,
    cancel: CancellationToken,
}

impl ProcessRunner {
    /// Create a runner for `binary`, a name looked up on `PATH` or a path.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            env: BTreeMap::new(),
            working_dir: None,
            timeout: None,
            tap: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Add an environment variable on top of the inherited environment.
    ///
    /// `ANSIBLE_STDOUT_CALLBACK` is always forced to `json` regardless.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add several environment variables
    pub fn with_envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Run the process in `dir`
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Kill the process if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Offer every output line to `tap` as it is read.
    ///
    /// Lines that find the channel full are skipped for the tap but still
    /// captured, so a slow observer never holds up the process.
    pub fn with_tap(mut self, tap: mpsc::Sender<OutputLine>) -> Self {
        self.tap = Some(tap);
        self
    }

    /// Kill the process when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The binary this runner launches
    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn resolve_binary(&self) -> Result<PathBuf> {
        which::which(&self.binary).map_err(|_| Error::BinaryNotFound(self.binary.clone()))
    }

    fn build_command(&self, program: PathBuf, args: &[String]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&self.env)
            .env(STDOUT_CALLBACK_VAR, STDOUT_CALLBACK_JSON)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        cmd
    }

    /// Launch the binary with `args` and wait for it to finish.
    ///
    /// Both streams are read to end-of-stream before this returns. Output
    /// volume on either stream never blocks the other, and neither does an
    /// attached tap.
    pub async fn run(&self, args: &[String]) -> Result<ProcessOutput> {
        let program = self.resolve_binary()?;
        debug!(binary = %program.display(), args = ?args, "Launching playbook");

        let mut child = self
            .build_command(program, args)
            .spawn()
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => Error::BinaryNotFound(self.binary.clone()),
                _ => Error::Spawn {
                    binary: self.binary.clone(),
                    source,
                },
            })?;

        let stdout = child.stdout.take().ok_or(Error::StreamSetup("stdout"))?;
        let stderr = child.stderr.take().ok_or(Error::StreamSetup("stderr"))?;

        let mut out_task = drain(stdout, StreamKind::Stdout, self.tap.clone());
        let mut err_task = drain(stderr, StreamKind::Stderr, self.tap.clone());

        let deadline = async {
            match self.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };

        let finished = tokio::select! {
            joined = async { tokio::join!(child.wait(), &mut out_task, &mut err_task) } => Some(joined),
            _ = self.cancel.cancelled() => None,
            _ = deadline => None,
        };

        let Some((status, out, err)) = finished else {
            let _ = child.kill().await;
            out_task.abort();
            err_task.abort();
            if self.cancel.is_cancelled() {
                warn!(binary = %self.binary, "Playbook run cancelled, process killed");
                return Err(Error::Cancelled);
            }
            let timeout_secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
            warn!(binary = %self.binary, timeout_secs, "Playbook run timed out, process killed");
            return Err(Error::TimedOut { timeout_secs });
        };

        let status = status.map_err(Error::Wait)?;
        let stdout = join_stream(out, StreamKind::Stdout)?;
        let stderr = join_stream(err, StreamKind::Stderr)?;

        info!(
            binary = %self.binary,
            exit_code = ?status.code(),
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "Playbook process finished"
        );

        Ok(ProcessOutput {
            exit_code: status.code(),
            success: status.success(),
            stdout,
            stderr,
        })
    }
}

fn join_stream(
    joined: std::result::Result<Result<Vec<u8>>, tokio::task::JoinError>,
    stream: StreamKind,
) -> Result<Vec<u8>> {
    joined.map_err(|e| Error::StreamIo {
        stream: stream.as_str(),
        source: std::io::Error::new(ErrorKind::Other, e),
    })?
}
