//! Iteration Records
//!
//! One [`IterationRecord`] is produced per completed request/response
//! cycle and rendered as a single comma-separated log line:
//!
//! ```text
//! label,sent,first-byte,completed,elapsed,<N> bytes,<R> kbps
//! ```

use chrono::{DateTime, Local, TimeDelta, Timelike};

use crate::throughput::Throughput;

/// Measurements of one completed iteration
#[derive(Clone, Debug, PartialEq)]
pub struct IterationRecord {
    /// Operation label (path tokens joined by spaces)
    pub label: String,
    /// Taken immediately before the request was written
    pub sent_at: DateTime<Local>,
    /// Taken when the first response line arrived
    pub first_byte_at: DateTime<Local>,
    /// Taken when the terminating line arrived
    pub completed_at: DateTime<Local>,
    /// `completed_at - first_byte_at`
    pub elapsed: TimeDelta,
    /// Encoded length of all collected lines
    pub response_bytes: u64,
    /// Rate derived from `response_bytes` and `elapsed`
    pub throughput: Throughput,
}

impl IterationRecord {
    /// Render the record as one log line (without trailing newline)
    #[must_use]
    pub fn to_log_line(&self) -> String {
        format!(
            "{},{},{},{},{},{} bytes,{}",
            self.label,
            format_timestamp(&self.sent_at),
            format_timestamp(&self.first_byte_at),
            format_timestamp(&self.completed_at),
            format_elapsed(self.elapsed),
            self.response_bytes,
            self.throughput
        )
    }
}

/// `YYYY-MM-DD HH:MM:SS[.ffffff]`, fraction omitted on whole seconds
#[must_use]
pub fn format_timestamp(ts: &DateTime<Local>) -> String {
    if ts.nanosecond() / 1_000 == 0 {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

/// `[D day(s), ]H:MM:SS[.ffffff]`, fraction omitted on whole seconds
#[must_use]
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let sign = if elapsed < TimeDelta::zero() { "-" } else { "" };
    let elapsed = elapsed.abs();

    let total_secs = elapsed.num_seconds();
    let micros = elapsed.subsec_nanos() / 1_000;
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::from(sign);
    if days > 0 {
        let plural = if days == 1 { "" } else { "s" };
        out.push_str(&format!("{days} day{plural}, "));
    }
    out.push_str(&format!("{hours}:{minutes:02}:{seconds:02}"));
    if micros != 0 {
        out.push_str(&format!(".{micros:06}"));
    }
    out
}

/// Elapsed time in fractional seconds
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn elapsed_secs(elapsed: TimeDelta) -> f64 {
    match elapsed.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        None => elapsed.num_milliseconds() as f64 / 1e3,
    }
}
