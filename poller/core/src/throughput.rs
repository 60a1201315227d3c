//! Throughput Calculation
//!
//! Converts a response size and the time it took to arrive into a rate in
//! kilobits per second: `bytes * 8 / seconds / 1000`.

use std::fmt;

use thiserror::Error;

/// Unit suffix of a rendered throughput
pub const THROUGHPUT_UNIT: &str = "kbps";

/// Elapsed time was zero, negative or not a number
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("elapsed time must be a positive number of seconds, got {elapsed_secs}")]
pub struct InvalidDurationError {
    /// The rejected elapsed time
    pub elapsed_secs: f64,
}

/// A measured transfer rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    /// Kilobits per second
    pub kbps: f64,
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {THROUGHPUT_UNIT}", self.kbps)
    }
}

/// Compute the rate of `bytes` received over `elapsed_secs`
///
/// # Errors
///
/// Returns [`InvalidDurationError`] unless `elapsed_secs` is finite and
/// strictly positive.
#[allow(clippy::cast_precision_loss)]
pub fn throughput(bytes: u64, elapsed_secs: f64) -> Result<Throughput, InvalidDurationError> {
    if !elapsed_secs.is_finite() || elapsed_secs <= 0.0 {
        return Err(InvalidDurationError { elapsed_secs });
    }

    let kbps = (bytes as f64 * 8.0) / elapsed_secs / 1000.0;
    Ok(Throughput { kbps })
}

/// Render the rate directly, e.g. `"8.00 kbps"`
///
/// # Errors
///
/// See [`throughput`].
pub fn format_throughput(bytes: u64, elapsed_secs: f64) -> Result<String, InvalidDurationError> {
    throughput(bytes, elapsed_secs).map(|t| t.to_string())
}
