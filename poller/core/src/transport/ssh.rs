//! SSH Process Transport
//!
//! Runs the device's NETCONF shell through the system OpenSSH client:
//!
//! ```text
//! ssh -T -p PORT [-o OPTION]... [user@]host "netconf format"
//! ```
//!
//! Host key verification, agents and key files follow the user's normal
//! OpenSSH configuration. A password, when given, is never placed on the
//! command line: ssh is pointed at an askpass helper (`SSH_ASKPASS`) that
//! prints the secret from [`ASKPASS_SECRET_ENV`].
//!
//! stdout is read by a background task that forwards complete lines over a
//! channel, which keeps [`ShellChannel::next_line`] cancel-safe. stderr is
//! forwarded to `tracing` and its tail is kept to classify failures.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::traits::{SessionTarget, ShellChannel, ShellLine, ShellTransport, TransportError};

/// Environment variable carrying the password to the askpass helper
pub const ASKPASS_SECRET_ENV: &str = "NETCONF_POLL_ASKPASS_SECRET";

/// Shell command that starts the XML NETCONF agent on IOS-XR style devices
pub const DEFAULT_SHELL_COMMAND: &str = "netconf format";

/// Exit status OpenSSH uses for its own (connection/auth) failures
const SSH_FAILURE_STATUS: i32 = 255;

/// Lines of stderr kept for error classification
const STDERR_TAIL_LINES: usize = 20;

/// Capacity of the stdout line channel
const LINE_CHANNEL_CAPACITY: usize = 1024;

/// How long to wait for ssh to exit after it was asked to stop
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Opens shells by spawning the OpenSSH client
#[derive(Clone, Debug)]
pub struct SshTransport {
    program: String,
    shell_command: String,
    options: Vec<String>,
    askpass: Option<PathBuf>,
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SshTransport {
    /// Use `ssh` from `PATH` and the default shell command
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: "ssh".to_string(),
            shell_command: DEFAULT_SHELL_COMMAND.to_string(),
            options: Vec::new(),
            askpass: None,
        }
    }

    /// Use a different ssh executable
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Run a different remote command
    #[must_use]
    pub fn with_shell_command(mut self, command: impl Into<String>) -> Self {
        self.shell_command = command.into();
        self
    }

    /// Pass `-o OPTION` to ssh (repeatable)
    #[must_use]
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Program ssh runs to obtain the password
    #[must_use]
    pub fn with_askpass(mut self, helper: impl Into<PathBuf>) -> Self {
        self.askpass = Some(helper.into());
        self
    }

    fn command(&self, target: &SessionTarget) -> Result<Command, TransportError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-T").arg("-p").arg(target.port.to_string());
        for option in &self.options {
            cmd.arg("-o").arg(option);
        }

        if let Some(password) = &target.password {
            let helper = self.askpass.as_ref().ok_or_else(|| {
                TransportError::InvalidState(
                    "password authentication needs an askpass helper".to_string(),
                )
            })?;
            cmd.arg("-o")
                .arg("NumberOfPasswordPrompts=1")
                .env("SSH_ASKPASS", helper)
                .env("SSH_ASKPASS_REQUIRE", "force")
                .env(ASKPASS_SECRET_ENV, password);
        }

        cmd.arg(target.destination())
            .arg(&self.shell_command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }
}

#[async_trait]
impl ShellTransport for SshTransport {
    type Channel = SshChannel;

    fn name(&self) -> &str {
        "ssh"
    }

    async fn open_shell(&self, target: &SessionTarget) -> Result<SshChannel, TransportError> {
        let mut child = self.command(target)?.spawn().map_err(|e| {
            TransportError::ConnectionFailed(format!("Failed to start {}: {e}", self.program))
        })?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::InvalidState("ssh stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportError::InvalidState("ssh stderr not captured".to_string()))?;

        // Read task: stdout -> line_tx
        let (line_tx, line_rx) = mpsc::channel::<Result<ShellLine, String>>(LINE_CHANNEL_CAPACITY);
        let reader = tokio::spawn(async move {
            let mut stdout = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match stdout.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        if line_tx.send(Ok(ShellLine::from_bytes(&buf))).await.is_err() {
                            tracing::debug!("Line receiver dropped");
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = line_tx.send(Err(e.to_string())).await;
                        break;
                    }
                }
            }
        });

        // stderr -> tracing, keeping a short tail
        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let tail = Arc::clone(&stderr_tail);
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::warn!(target: "netconf_poll_core::ssh", "{line}");
                let mut kept = tail.lock();
                if kept.len() == STDERR_TAIL_LINES {
                    kept.pop_front();
                }
                kept.push_back(line);
            }
        });

        tracing::info!(
            destination = %target.destination(),
            port = target.port,
            command = %self.shell_command,
            "Started ssh session"
        );

        Ok(SshChannel {
            child,
            stdin,
            lines: line_rx,
            reader,
            stderr_task: Some(stderr_task),
            stderr_tail,
            closed: false,
        })
    }
}

/// Channel backed by a running ssh process
#[derive(Debug)]
pub struct SshChannel {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: mpsc::Receiver<Result<ShellLine, String>>,
    reader: JoinHandle<()>,
    stderr_task: Option<JoinHandle<()>>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    closed: bool,
}

impl SshChannel {
    /// Turn the exit of the ssh process into a transport outcome
    async fn end_of_stream(&mut self) -> Result<Option<ShellLine>, TransportError> {
        let status = tokio::time::timeout(EXIT_GRACE, self.child.wait())
            .await
            .map_err(|_| {
                TransportError::ReceiveFailed("ssh closed stdout but kept running".to_string())
            })??;

        if let Some(task) = self.stderr_task.take() {
            let _ = tokio::time::timeout(EXIT_GRACE, task).await;
        }

        if status.code() != Some(SSH_FAILURE_STATUS) {
            tracing::debug!(status = %status, "ssh exited");
            return Ok(None);
        }

        let tail = self
            .stderr_tail
            .lock()
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("; ");
        if tail.contains("Permission denied") || tail.contains("Authentication failed") {
            Err(TransportError::AuthenticationFailed(tail))
        } else {
            Err(TransportError::ConnectionFailed(tail))
        }
    }
}

#[async_trait]
impl ShellChannel for SshChannel {
    async fn write_payload(&mut self, payload: &str) -> Result<(), TransportError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| TransportError::InvalidState("Channel released".to_string()))?;

        let mut data = String::with_capacity(payload.len() + 1);
        data.push_str(payload);
        data.push('\n');

        stdin
            .write_all(data.as_bytes())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn next_line(&mut self) -> Result<Option<ShellLine>, TransportError> {
        if self.closed {
            return Err(TransportError::InvalidState("Channel released".to_string()));
        }

        match self.lines.recv().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(TransportError::ReceiveFailed(e)),
            None => self.end_of_stream().await,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Closing stdin ends the remote shell; kill in case it lingers
        drop(self.stdin.take());
        self.reader.abort();
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "ssh already exited");
        }
        let _ = tokio::time::timeout(EXIT_GRACE, self.child.wait()).await;

        tracing::info!("Closed ssh session");
        Ok(())
    }
}
