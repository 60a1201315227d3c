//! Poller Configuration
//!
//! Layered settings for a polling run.
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Config file (`~/.config/netconf-poll/poller.toml`)
//! 4. Default values (lowest priority)
//!
//! # Config File Format
//!
//! ```toml
//! [session]
//! host = "192.0.2.10"
//! port = 22
//! username = "admin"
//! shell_command = "netconf format"
//!
//! [polling]
//! count = 10
//! sleep_minutes = 5.0
//! log_file = "poll.log"
//! settle_ms = 1000
//! response_timeout_secs = 120
//! send_hello = true
//! ```
//!
//! # Environment Variables
//!
//! - `NETCONF_POLL_HOST`, `NETCONF_POLL_PORT`, `NETCONF_POLL_USER`
//! - `NETCONF_POLL_PASSWORD`
//! - `NETCONF_POLL_COUNT`, `NETCONF_POLL_SLEEP` (minutes)
//! - `NETCONF_POLL_LOG_FILE`

pub mod run;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use run::{
    delay_from_minutes, RunConfig, DEFAULT_DELAY_MINUTES, DEFAULT_RESPONSE_TIMEOUT,
    DEFAULT_SETTLE_DELAY,
};

use crate::transport::ssh::DEFAULT_SHELL_COMMAND;
use crate::transport::traits::DEFAULT_PORT;
use crate::transport::SessionTarget;

/// Directory under the user config dir holding `poller.toml`
pub const CONFIG_DIR_NAME: &str = "netconf-poll";

/// Config file name
pub const CONFIG_FILE_NAME: &str = "poller.toml";

/// Default log file when none is configured
pub const DEFAULT_LOG_FILE: &str = "netconf-poll.log";

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Where a setting came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Command-line argument
    Cli,
    /// Environment variable
    Env,
    /// Config file
    File,
    /// Built-in default
    #[default]
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// ============================================================================
// TOML Structures
// ============================================================================

/// `[session]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub shell_command: Option<String>,
    pub ssh_program: Option<String>,
    pub ssh_options: Option<Vec<String>>,
}

/// `[polling]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PollingToml {
    pub count: Option<u32>,
    pub sleep_minutes: Option<f64>,
    pub log_file: Option<PathBuf>,
    pub settle_ms: Option<u64>,
    /// 0 disables the timeout
    pub response_timeout_secs: Option<u64>,
    pub send_hello: Option<bool>,
}

/// Root of `poller.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PollerToml {
    pub session: SessionToml,
    pub polling: PollingToml,
}

// ============================================================================
// Accumulated Settings
// ============================================================================

/// Settings gathered from every layer, not yet validated
#[derive(Clone, Debug, PartialEq)]
pub struct PollerSettings {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub shell_command: String,
    pub ssh_program: String,
    pub ssh_options: Vec<String>,
    pub count: u32,
    pub sleep_minutes: f64,
    pub log_file: PathBuf,
    pub settle_delay: Duration,
    pub response_timeout: Option<Duration>,
    pub send_hello: bool,

    /// Where the host was set
    pub host_source: ConfigSource,
    /// Config file that was loaded, if any
    pub config_file: Option<PathBuf>,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            username: None,
            password: None,
            shell_command: DEFAULT_SHELL_COMMAND.to_string(),
            ssh_program: "ssh".to_string(),
            ssh_options: Vec::new(),
            count: 1,
            sleep_minutes: DEFAULT_DELAY_MINUTES,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            settle_delay: DEFAULT_SETTLE_DELAY,
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
            send_hello: false,
            host_source: ConfigSource::Default,
            config_file: None,
        }
    }
}

impl PollerSettings {
    /// Turn the settings into a validated [`RunConfig`]
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when the host is missing,
    /// the delay is not a valid number of minutes, or the assembled run
    /// fails [`RunConfig::validate`].
    pub fn into_run_config(self, path: Vec<String>) -> Result<RunConfig, ConfigError> {
        let host = self.host.ok_or_else(|| {
            ConfigError::ValidationError(
                "no host given (use --ip, NETCONF_POLL_HOST or [session].host)".to_string(),
            )
        })?;

        let mut target = SessionTarget::new(host).with_port(self.port);
        if let Some(username) = self.username {
            target = target.with_username(username);
        }
        if let Some(password) = self.password {
            target = target.with_password(password);
        }

        let mut config = RunConfig::new(target, path, self.log_file)
            .with_iterations(self.count)
            .with_delay(delay_from_minutes(self.sleep_minutes)?)
            .with_settle_delay(self.settle_delay)
            .with_response_timeout(self.response_timeout)
            .with_hello(self.send_hello);
        config.shell_command = self.shell_command;
        config.ssh_program = self.ssh_program;
        config.ssh_options = self.ssh_options;

        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Default config file location
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load settings from the default file and the environment
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed,
/// or an environment variable holds an unparsable value.
pub fn load_settings() -> Result<PollerSettings, ConfigError> {
    load_settings_from_path(None)
}

/// Load settings from a specific file (or the default) and the environment
///
/// An explicitly given file must exist; a missing default file is skipped.
///
/// # Errors
///
/// See [`load_settings`].
pub fn load_settings_from_path(path: Option<PathBuf>) -> Result<PollerSettings, ConfigError> {
    let mut settings = PollerSettings::default();

    let explicit = path.is_some();
    if let Some(path) = path.or_else(default_config_path) {
        if explicit || path.exists() {
            let toml_config = read_toml(&path)?;
            apply_toml_config(&mut settings, &toml_config);
            settings.config_file = Some(path.clone());
            tracing::debug!(path = ?path, "Loaded config file");
        } else {
            tracing::debug!(path = ?path, "No config file, using defaults");
        }
    }

    apply_env_config(&mut settings)?;
    Ok(settings)
}

fn read_toml(path: &Path) -> Result<PollerToml, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&contents)?)
}

/// Apply file values over the current settings
pub fn apply_toml_config(settings: &mut PollerSettings, toml: &PollerToml) {
    let session = &toml.session;
    if let Some(host) = &session.host {
        settings.host = Some(host.clone());
        settings.host_source = ConfigSource::File;
    }
    if let Some(port) = session.port {
        settings.port = port;
    }
    if let Some(username) = &session.username {
        settings.username = Some(username.clone());
    }
    if let Some(password) = &session.password {
        settings.password = Some(password.clone());
    }
    if let Some(command) = &session.shell_command {
        settings.shell_command = command.clone();
    }
    if let Some(program) = &session.ssh_program {
        settings.ssh_program = program.clone();
    }
    if let Some(options) = &session.ssh_options {
        settings.ssh_options = options.clone();
    }

    let polling = &toml.polling;
    if let Some(count) = polling.count {
        settings.count = count;
    }
    if let Some(minutes) = polling.sleep_minutes {
        settings.sleep_minutes = minutes;
    }
    if let Some(log_file) = &polling.log_file {
        settings.log_file = log_file.clone();
    }
    if let Some(ms) = polling.settle_ms {
        settings.settle_delay = Duration::from_millis(ms);
    }
    if let Some(secs) = polling.response_timeout_secs {
        settings.response_timeout = timeout_from_secs(secs);
    }
    if let Some(hello) = polling.send_hello {
        settings.send_hello = hello;
    }
}

/// Apply `NETCONF_POLL_*` environment variables over the current settings
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] for a numeric variable that
/// does not parse.
pub fn apply_env_config(settings: &mut PollerSettings) -> Result<(), ConfigError> {
    if let Ok(host) = std::env::var("NETCONF_POLL_HOST") {
        settings.host = Some(host);
        settings.host_source = ConfigSource::Env;
    }
    if let Ok(port) = std::env::var("NETCONF_POLL_PORT") {
        settings.port = parse_env("NETCONF_POLL_PORT", &port)?;
    }
    if let Ok(user) = std::env::var("NETCONF_POLL_USER") {
        settings.username = Some(user);
    }
    if let Ok(password) = std::env::var("NETCONF_POLL_PASSWORD") {
        settings.password = Some(password);
    }
    if let Ok(count) = std::env::var("NETCONF_POLL_COUNT") {
        settings.count = parse_env("NETCONF_POLL_COUNT", &count)?;
    }
    if let Ok(sleep) = std::env::var("NETCONF_POLL_SLEEP") {
        settings.sleep_minutes = parse_env("NETCONF_POLL_SLEEP", &sleep)?;
    }
    if let Ok(log_file) = std::env::var("NETCONF_POLL_LOG_FILE") {
        settings.log_file = PathBuf::from(log_file);
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{name} has invalid value {value:?}")))
}

/// Seconds to an optional timeout, where 0 means none
#[must_use]
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

// ============================================================================
// CLI Overrides
// ============================================================================

/// Values given on the command line; `None` leaves the lower layer alone
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub count: Option<u32>,
    pub sleep_minutes: Option<f64>,
    pub log_file: Option<PathBuf>,
    pub settle_ms: Option<u64>,
    pub response_timeout_secs: Option<u64>,
    pub send_hello: Option<bool>,
    pub ssh_options: Vec<String>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn sleep_minutes(mut self, minutes: f64) -> Self {
        self.sleep_minutes = Some(minutes);
        self
    }

    /// Apply the overrides to the settings
    pub fn apply(&self, settings: &mut PollerSettings) {
        if let Some(host) = &self.host {
            settings.host = Some(host.clone());
            settings.host_source = ConfigSource::Cli;
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(username) = &self.username {
            settings.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            settings.password = Some(password.clone());
        }
        if let Some(count) = self.count {
            settings.count = count;
        }
        if let Some(minutes) = self.sleep_minutes {
            settings.sleep_minutes = minutes;
        }
        if let Some(log_file) = &self.log_file {
            settings.log_file = log_file.clone();
        }
        if let Some(ms) = self.settle_ms {
            settings.settle_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = self.response_timeout_secs {
            settings.response_timeout = timeout_from_secs(secs);
        }
        if let Some(hello) = self.send_hello {
            settings.send_hello = hello;
        }
        // CLI options add to file options
        settings.ssh_options.extend(self.ssh_options.iter().cloned());
    }
}

// ============================================================================
// Tests
// ============================================================================
