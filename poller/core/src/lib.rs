//! netconf-poll core - periodic NETCONF operational queries
//!
//! This crate builds `<get>` requests from flat operation paths and drives
//! repeated request/response cycles over one device shell session,
//! measuring how large each reply is and how fast it arrives.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Poller                               │
//! │   Idle → Connected → Sending → Collecting → Measuring        │
//! │                 ↑                              │             │
//! │                 └────────── Sleeping ←─────────┘ → Done      │
//! └──────┬──────────────────┬────────────────────┬───────────────┘
//!        │                  │                    │
//!  ┌─────┴─────┐     ┌──────┴──────┐      ┌──────┴───────┐
//!  │   query   │     │  transport  │      │    logger    │
//!  │ (builder) │     │ ssh / fake  │      │ file / mem   │
//!  └───────────┘     └─────────────┘      └──────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Poller`]: the polling state machine
//! - [`RunConfig`]: validated parameters of a run
//! - [`QueryDocument`]: a framed request built by [`build_query`]
//! - [`IterationRecord`]: measurements of one cycle
//! - [`ShellTransport`] / [`ShellChannel`]: how the device is reached
//! - [`IterationSink`]: where records go
//!
//! # Quick Start
//!
//! ```ignore
//! use netconf_poll_core::{
//!     FileSink, Poller, RunConfig, SessionTarget, SshTransport, SystemClock,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! let config = RunConfig::new(
//!     SessionTarget::new("192.0.2.10").with_username("admin"),
//!     vec!["SystemMonitoring".into()],
//!     "poll.log",
//! );
//! let sink = FileSink::open(&config.log_path).await?;
//! let mut poller = Poller::new(config, SshTransport::new(), SystemClock, sink);
//! let report = poller.run(CancellationToken::new()).await?;
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod logger;
pub mod poller;
pub mod query;
pub mod record;
pub mod reply;
pub mod throughput;
pub mod transport;

// Re-exports for convenience
pub use clock::{Clock, SteppingClock, SystemClock};
pub use config::{
    load_settings, load_settings_from_path, ConfigError, ConfigOverrides, ConfigSource,
    PollerSettings, RunConfig,
};
pub use error::PollError;
pub use logger::{FileSink, IterationSink, MemorySink, SinkWriteError};
pub use poller::{Poller, PollerState, RunOutcome, RunReport};
pub use query::{build_query, hello_document, parse_operation, InvalidPathError, QueryDocument};
pub use record::IterationRecord;
pub use reply::{is_complete, TERMINATOR_MARKER};
pub use throughput::{format_throughput, throughput, InvalidDurationError, Throughput};
pub use transport::{
    InMemoryTransport, ScriptedReply, SessionTarget, ShellChannel, ShellLine, ShellTransport,
    SshTransport, TransportError, ASKPASS_SECRET_ENV,
};
