//! Run Configuration
//!
//! The immutable, validated parameters of one polling run.

use std::path::PathBuf;
use std::time::Duration;

use super::ConfigError;
use crate::transport::ssh::DEFAULT_SHELL_COMMAND;
use crate::transport::SessionTarget;

/// Pause after the shell opens, before the first request
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on waiting for a complete reply
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default pause between iterations, in minutes
pub const DEFAULT_DELAY_MINUTES: f64 = 1.0;

/// Parameters of one polling run
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    /// Device and credentials
    pub target: SessionTarget,
    /// Operation path tokens
    pub path: Vec<String>,
    /// Number of request/response cycles (at least 1)
    pub iterations: u32,
    /// Pause before every iteration but the first
    pub delay: Duration,
    /// Log file receiving one line per iteration
    pub log_path: PathBuf,
    /// Drain period after the shell opens
    pub settle_delay: Duration,
    /// Bound on the collecting phase (`None` waits forever)
    pub response_timeout: Option<Duration>,
    /// Announce the base capability before the first request
    pub send_hello: bool,
    /// Remote command starting the NETCONF shell
    pub shell_command: String,
    /// ssh executable
    pub ssh_program: String,
    /// Extra `-o` options for ssh
    pub ssh_options: Vec<String>,
}

impl RunConfig {
    /// A single-iteration run with default timing
    pub fn new(target: SessionTarget, path: Vec<String>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            target,
            path,
            iterations: 1,
            delay: Duration::from_secs(60),
            log_path: log_path.into(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
            send_hello: false,
            shell_command: DEFAULT_SHELL_COMMAND.to_string(),
            ssh_program: "ssh".to_string(),
            ssh_options: Vec::new(),
        }
    }

    /// Set the iteration count
    #[must_use]
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the inter-iteration delay
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the settle delay
    #[must_use]
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle_delay = settle;
        self
    }

    /// Set or disable the response timeout
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Send the capability announcement first
    #[must_use]
    pub fn with_hello(mut self, send_hello: bool) -> Self {
        self.send_hello = send_hello;
        self
    }

    /// Check the invariants of a run
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an empty host, a zero
    /// iteration count or a zero response timeout. The path is checked when
    /// the query is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.host.trim().is_empty() {
            return Err(ConfigError::ValidationError("host is required".to_string()));
        }
        if self.iterations == 0 {
            return Err(ConfigError::ValidationError(
                "iteration count must be at least 1".to_string(),
            ));
        }
        if self.response_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ValidationError(
                "response timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Convert a delay given in minutes into a duration
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] for negative or non-finite input.
pub fn delay_from_minutes(minutes: f64) -> Result<Duration, ConfigError> {
    if !minutes.is_finite() || minutes < 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "delay must be a non-negative number of minutes, got {minutes}"
        )));
    }
    Duration::try_from_secs_f64(minutes * 60.0)
        .map_err(|e| ConfigError::ValidationError(format!("delay out of range: {e}")))
}
