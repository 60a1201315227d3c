//! Run Errors
//!
//! Every failure a polling run can report. None of them is retried inside
//! the crate.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::logger::SinkWriteError;
use crate::query::InvalidPathError;
use crate::throughput::InvalidDurationError;
use crate::transport::TransportError;

/// Failure of a polling run
#[derive(Debug, Error)]
pub enum PollError {
    /// The operation path cannot be turned into a query
    #[error("invalid operation path: {0}")]
    InvalidPath(#[from] InvalidPathError),

    /// A reply was measured with a non-positive duration
    #[error("invalid measurement: {0}")]
    InvalidDuration(#[from] InvalidDurationError),

    /// Connecting, authenticating or talking to the device failed
    #[error("SSH connection failed: {0}")]
    Transport(#[from] TransportError),

    /// An iteration record could not be persisted
    #[error(transparent)]
    SinkWrite(#[from] SinkWriteError),

    /// No complete reply arrived in time
    #[error("no complete reply within {}s", .0.as_secs_f64())]
    ResponseTimeout(Duration),

    /// The run configuration is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PollError {
    /// Whether the failure came from the device session
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ResponseTimeout(_))
    }
}
