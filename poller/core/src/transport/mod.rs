//! Transport Layer for Device Sessions
//!
//! Provides abstraction over how the management shell is reached:
//! - `SshTransport`: OpenSSH client process running the device's
//!   `netconf format` shell
//! - `InMemoryTransport`: scripted device for tests and dry runs
//!
//! # Design
//!
//! The poller only needs four capabilities from a session: open it, write
//! a payload, read the next line, and close it. Authentication and
//! connection setup stay behind [`ShellTransport::open_shell`], so the
//! polling state machine never sees credentials or sockets.

pub mod in_memory;
pub mod ssh;
pub mod traits;

// Re-exports for convenience
pub use in_memory::{InMemoryChannel, InMemoryStats, InMemoryTransport, ScriptedReply};
pub use ssh::{SshChannel, SshTransport, ASKPASS_SECRET_ENV};
pub use traits::{SessionTarget, ShellChannel, ShellLine, ShellTransport, TransportError};
