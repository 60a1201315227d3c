//! Polling State Machine
//!
//! Drives a run of request/response cycles over one shell session:
//!
//! ```text
//! Idle -> Connected -> Sending -> Collecting -> Measuring -> (Sleeping -> Sending)* -> Done
//! ```
//!
//! # Timing
//!
//! - The settle delay after connecting drains session banners and is not
//!   part of any measurement.
//! - `sent_at` is read right before the request is written, `first_byte_at`
//!   when the first reply line arrives and `completed_at` when the
//!   terminating line arrives. Elapsed time is `completed_at - first_byte_at`.
//! - No delay precedes the first iteration.
//!
//! # Failure and Cancellation
//!
//! Any error ends the run at once; nothing is retried. The cancellation
//! token is checked before every transition and raced against both delays
//! and the reply collection. A cancelled iteration never produces a record.
//! The session is closed exactly once however the run ends.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::RunConfig;
use crate::error::PollError;
use crate::logger::IterationSink;
use crate::query::{build_query, hello_document, QueryDocument};
use crate::record::{elapsed_secs, IterationRecord};
use crate::reply::is_complete;
use crate::throughput::throughput;
use crate::transport::{ShellChannel, ShellTransport, TransportError};

/// Where the run currently is
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PollerState {
    /// No session yet
    #[default]
    Idle,
    /// Session open, settling
    Connected,
    /// Writing the request
    Sending,
    /// Reading reply lines
    Collecting,
    /// Computing and recording the iteration
    Measuring,
    /// Waiting for the next iteration
    Sleeping,
    /// Session released
    Done,
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connected => "connected",
            Self::Sending => "sending",
            Self::Collecting => "collecting",
            Self::Measuring => "measuring",
            Self::Sleeping => "sleeping",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a run ended without error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every configured iteration completed
    Completed,
    /// The cancellation token fired
    Cancelled,
}

/// Summary of a finished run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub iterations_completed: u32,
    pub outcome: RunOutcome,
}

/// A reply collected from the channel
#[derive(Debug)]
struct CollectedReply {
    first_byte_at: DateTime<Local>,
    completed_at: DateTime<Local>,
    bytes: u64,
    lines: usize,
}

/// Runs the configured iterations against one device
pub struct Poller<T, C, S>
where
    T: ShellTransport,
    C: Clock,
    S: IterationSink,
{
    config: RunConfig,
    transport: T,
    clock: C,
    sink: S,
    state: PollerState,
    completed: u32,
}

impl<T, C, S> Poller<T, C, S>
where
    T: ShellTransport,
    C: Clock,
    S: IterationSink,
{
    pub fn new(config: RunConfig, transport: T, clock: C, sink: S) -> Self {
        Self {
            config,
            transport,
            clock,
            sink,
            state: PollerState::Idle,
            completed: 0,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Iterations recorded so far
    #[must_use]
    pub fn iterations_completed(&self) -> u32 {
        self.completed
    }

    /// The sink receiving records
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Execute the run
    ///
    /// The query is built before any session is opened, so an invalid path
    /// never touches the device.
    ///
    /// # Errors
    ///
    /// Returns the first [`PollError`] encountered. Completed iterations
    /// stay recorded in the sink.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<RunReport, PollError> {
        self.config.validate()?;
        let query = build_query(&self.config.path)?;
        tracing::debug!(label = query.label(), bytes = query.len(), "Built query");

        if cancel.is_cancelled() {
            return Ok(self.report(RunOutcome::Cancelled));
        }

        tracing::info!(
            transport = self.transport.name(),
            destination = %self.config.target.destination(),
            "Opening session"
        );
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.transport.open_shell(&self.config.target) => Some(result?),
        };
        let Some(mut channel) = opened else {
            return Ok(self.report(RunOutcome::Cancelled));
        };
        self.transition(PollerState::Connected);

        let result = self.drive(&mut channel, &query, &cancel).await;

        let closed = channel.close().await;
        self.transition(PollerState::Done);

        let outcome = result?;
        closed?;
        Ok(self.report(outcome))
    }

    async fn drive(
        &mut self,
        channel: &mut T::Channel,
        query: &QueryDocument,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PollError> {
        if !self.settle(channel, cancel).await? {
            return Ok(RunOutcome::Cancelled);
        }

        for iteration in 0..self.config.iterations {
            if iteration > 0 {
                self.transition(PollerState::Sleeping);
                tracing::info!("Sleeping for {}s", self.config.delay.as_secs_f64());
                if !pause(self.config.delay, cancel).await {
                    return Ok(RunOutcome::Cancelled);
                }
            }
            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }

            self.transition(PollerState::Sending);
            tracing::info!(
                iteration = iteration + 1,
                of = self.config.iterations,
                "Sending query: {}",
                query.label()
            );
            let sent_at = self.clock.now();
            channel.write_payload(query.as_str()).await?;

            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }
            self.transition(PollerState::Collecting);
            let Some(reply) = self.collect(channel, cancel).await? else {
                return Ok(RunOutcome::Cancelled);
            };

            self.transition(PollerState::Measuring);
            let record = measure(query.label(), sent_at, &reply)?;
            tracing::info!(
                iteration = iteration + 1,
                bytes = record.response_bytes,
                lines = reply.lines,
                throughput = %record.throughput,
                "Reply received"
            );
            self.sink.append(&record).await?;
            self.completed += 1;
        }

        Ok(RunOutcome::Completed)
    }

    /// Send the optional hello, then discard whatever arrives during the
    /// settle delay. Returns `false` when cancelled.
    async fn settle(
        &mut self,
        channel: &mut T::Channel,
        cancel: &CancellationToken,
    ) -> Result<bool, PollError> {
        if self.config.send_hello {
            tracing::debug!("Sending capability announcement");
            channel.write_payload(&hello_document()).await?;
        }

        let timer = tokio::time::sleep(self.config.settle_delay);
        tokio::pin!(timer);

        let mut discarded = 0usize;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(false),
                _ = &mut timer => break,
                line = channel.next_line() => match line? {
                    Some(_) => discarded += 1,
                    None => return Err(TransportError::ChannelClosed.into()),
                },
            }
        }

        tracing::debug!(discarded, "Settle delay elapsed");
        Ok(true)
    }

    /// Read lines until one completes the reply. Returns `None` when
    /// cancelled.
    async fn collect(
        &mut self,
        channel: &mut T::Channel,
        cancel: &CancellationToken,
    ) -> Result<Option<CollectedReply>, PollError> {
        let timeout = self.config.response_timeout;
        let deadline = timeout.map(|t| Instant::now() + t);

        let mut first_byte_at = None;
        let mut bytes = 0u64;
        let mut lines = 0usize;

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                _ = deadline_reached(deadline) => {
                    return Err(PollError::ResponseTimeout(timeout.unwrap_or_default()));
                }
                line = channel.next_line() => line?,
            };
            let Some(line) = line else {
                return Err(TransportError::ChannelClosed.into());
            };

            let first = *first_byte_at.get_or_insert_with(|| self.clock.now());
            bytes += line.wire_bytes as u64;
            lines += 1;

            if is_complete(&line.text) {
                return Ok(Some(CollectedReply {
                    first_byte_at: first,
                    completed_at: self.clock.now(),
                    bytes,
                    lines,
                }));
            }
        }
    }

    fn transition(&mut self, next: PollerState) {
        tracing::debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
    }

    fn report(&self, outcome: RunOutcome) -> RunReport {
        if outcome == RunOutcome::Cancelled {
            tracing::info!(completed = self.completed, "Run cancelled");
        }
        RunReport {
            iterations_completed: self.completed,
            outcome,
        }
    }
}

fn measure(
    label: &str,
    sent_at: DateTime<Local>,
    reply: &CollectedReply,
) -> Result<IterationRecord, PollError> {
    let elapsed = reply.completed_at - reply.first_byte_at;
    let throughput = throughput(reply.bytes, elapsed_secs(elapsed))?;
    Ok(IterationRecord {
        label: label.to_string(),
        sent_at,
        first_byte_at: reply.first_byte_at,
        completed_at: reply.completed_at,
        elapsed,
        response_bytes: reply.bytes,
        throughput,
    })
}

/// Wait out `duration`. Returns `false` when cancelled first.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Resolves at `deadline`, never without one
async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
