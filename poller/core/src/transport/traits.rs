//! Transport Traits
//!
//! Core trait definitions for talking to a device's management shell.
//!
//! - `ShellTransport`: opens an authenticated shell channel
//! - `ShellChannel`: the open channel, owned by exactly one poller

use std::fmt;

use async_trait::async_trait;

/// Default SSH port of the management plane
pub const DEFAULT_PORT: u16 = 22;

/// Where and as whom to open the session
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTarget {
    /// Device host name or address
    pub host: String,
    /// Device SSH port
    pub port: u16,
    /// Login user (`None` = transport default)
    pub username: Option<String>,
    /// Login password (`None` = key or agent authentication)
    pub password: Option<String>,
}

impl SessionTarget {
    /// Target a host on the default port with no credentials
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
        }
    }

    /// Set the login user
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the login password
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `user@host` or just `host`
    #[must_use]
    pub fn destination(&self) -> String {
        match &self.username {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }
}

impl fmt::Debug for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One line read from the device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellLine {
    /// Decoded text, including the line terminator
    pub text: String,
    /// Bytes the line occupied on the wire
    pub wire_bytes: usize,
}

impl ShellLine {
    /// A line that arrived as valid UTF-8
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            wire_bytes: text.len(),
            text,
        }
    }

    /// Decode raw bytes, replacing invalid sequences
    ///
    /// `wire_bytes` keeps the raw length, not the length of the decoded
    /// replacement text.
    #[must_use]
    pub fn from_bytes(raw: &[u8]) -> Self {
        Self {
            text: String::from_utf8_lossy(raw).into_owned(),
            wire_bytes: raw.len(),
        }
    }
}

/// Errors that can occur during transport operations
#[derive(Debug)]
pub enum TransportError {
    /// Could not reach the device or start the session
    ConnectionFailed(String),
    /// The device rejected the credentials
    AuthenticationFailed(String),
    /// The channel ended while a reply was expected
    ChannelClosed,
    /// Failed to write a payload
    SendFailed(String),
    /// Failed to read from the channel
    ReceiveFailed(String),
    /// IO error from underlying transport
    IoError(std::io::Error),
    /// Transport not in expected state
    InvalidState(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed(msg) => f.write_str(msg),
            Self::AuthenticationFailed(msg) => write!(f, "Authentication failed: {msg}"),
            Self::ChannelClosed => write!(f, "Channel closed"),
            Self::SendFailed(msg) => write!(f, "Send failed: {msg}"),
            Self::ReceiveFailed(msg) => write!(f, "Receive failed: {msg}"),
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err)
    }
}

/// Opens shell channels to a device
#[async_trait]
pub trait ShellTransport: Send + Sync {
    /// Channel type produced by this transport
    type Channel: ShellChannel;

    /// Transport name for logs (e.g. "ssh")
    fn name(&self) -> &str;

    /// Open and authenticate a session, then start the management shell
    async fn open_shell(&self, target: &SessionTarget) -> Result<Self::Channel, TransportError>;
}

/// An open, authenticated shell channel
#[async_trait]
pub trait ShellChannel: Send {
    /// Write `payload` followed by a newline and flush it
    async fn write_payload(&mut self, payload: &str) -> Result<(), TransportError>;

    /// Next line from the device, including its line terminator
    ///
    /// Returns `Ok(None)` once the stream has ended. Implementations must
    /// be cancel-safe: dropping the future loses no data, because the
    /// poller races this call against timers.
    async fn next_line(&mut self) -> Result<Option<ShellLine>, TransportError>;

    /// Release the channel; calling it again is a no-op
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination() {
        let target = SessionTarget::new("10.0.0.1");
        assert_eq!(target.destination(), "10.0.0.1");

        let target = target.with_username("admin");
        assert_eq!(target.destination(), "admin@10.0.0.1");
    }

    #[test]
    fn test_debug_redacts_password() {
        let target = SessionTarget::new("r1").with_password("hunter2");
        let debug = format!("{target:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::ConnectionFailed("r1: connection refused".to_string());
        assert_eq!(err.to_string(), "r1: connection refused");

        let err = TransportError::AuthenticationFailed("Permission denied".to_string());
        assert_eq!(err.to_string(), "Authentication failed: Permission denied");

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err = TransportError::IoError(io_err);
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_line_counts_raw_bytes() {
        let line = ShellLine::from_bytes(b"<a>\xff</a>\n");
        assert_eq!(line.wire_bytes, 9);
        assert_eq!(line.text, "<a>\u{fffd}</a>\n");
        assert_eq!(line.text.len(), 11);

        assert_eq!(ShellLine::new("é\n").wire_bytes, 3);
    }
}
