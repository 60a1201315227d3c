//! In-Memory Transport
//!
//! A scripted stand-in for a device. Each request written to the channel
//! releases the next scripted reply; capability announcements release the
//! optional hello reply. Opens, closes and every written payload are
//! recorded so tests can inspect how the poller drove the session.
//!
//! # Usage
//!
//! ```ignore
//! let transport = InMemoryTransport::new()
//!     .with_banner(["Welcome\n"])
//!     .with_reply(["<rpc-reply>\n", "<data/>\n", "</rpc-reply>\n"]);
//! let stats = transport.stats();
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{SessionTarget, ShellChannel, ShellLine, ShellTransport, TransportError};

/// What the fake device does when it receives a request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Emit these lines
    Lines(Vec<String>),
    /// Emit nothing, leaving the reader waiting
    Silent,
}

impl ScriptedReply {
    /// Build a reply from anything string-like
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Lines(lines.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Default)]
struct StatsInner {
    opens: usize,
    closes: usize,
    writes: Vec<String>,
}

/// Shared counters of an [`InMemoryTransport`]
#[derive(Clone, Debug, Default)]
pub struct InMemoryStats {
    inner: Arc<Mutex<StatsInner>>,
}

impl InMemoryStats {
    /// Number of shells opened
    #[must_use]
    pub fn opens(&self) -> usize {
        self.inner.lock().opens
    }

    /// Number of channels released
    #[must_use]
    pub fn closes(&self) -> usize {
        self.inner.lock().closes
    }

    /// Every payload written, in order
    #[must_use]
    pub fn writes(&self) -> Vec<String> {
        self.inner.lock().writes.clone()
    }
}

#[derive(Debug)]
struct Script {
    replies: VecDeque<ScriptedReply>,
    repeat: Option<ScriptedReply>,
}

impl Script {
    fn next_reply(&mut self) -> ScriptedReply {
        self.replies
            .pop_front()
            .or_else(|| self.repeat.clone())
            .unwrap_or(ScriptedReply::Silent)
    }
}

/// Scripted device transport
#[derive(Debug)]
pub struct InMemoryTransport {
    banner: Vec<String>,
    hello_reply: Vec<String>,
    script: Arc<Mutex<Script>>,
    refuse: Option<String>,
    close_after: Option<usize>,
    stats: InMemoryStats,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    /// A device that accepts connections and never replies
    #[must_use]
    pub fn new() -> Self {
        Self {
            banner: Vec::new(),
            hello_reply: Vec::new(),
            script: Arc::new(Mutex::new(Script {
                replies: VecDeque::new(),
                repeat: None,
            })),
            refuse: None,
            close_after: None,
            stats: InMemoryStats::default(),
        }
    }

    /// Lines emitted as soon as the shell opens
    #[must_use]
    pub fn with_banner<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.banner = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Lines emitted in answer to a capability announcement
    #[must_use]
    pub fn with_hello_reply<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hello_reply = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Answer every request with the same lines
    #[must_use]
    pub fn with_reply<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script.lock().repeat = Some(ScriptedReply::lines(lines));
        self
    }

    /// Queue a one-off reply, used before the repeating reply
    #[must_use]
    pub fn with_scripted(self, reply: ScriptedReply) -> Self {
        self.script.lock().replies.push_back(reply);
        self
    }

    /// Fail every `open_shell` with a connection error
    #[must_use]
    pub fn refusing(mut self, reason: impl Into<String>) -> Self {
        self.refuse = Some(reason.into());
        self
    }

    /// End the stream after answering `requests` requests
    #[must_use]
    pub fn close_after(mut self, requests: usize) -> Self {
        self.close_after = Some(requests);
        self
    }

    /// Handle on the shared counters
    #[must_use]
    pub fn stats(&self) -> InMemoryStats {
        self.stats.clone()
    }
}

#[async_trait]
impl ShellTransport for InMemoryTransport {
    type Channel = InMemoryChannel;

    fn name(&self) -> &str {
        "in-memory"
    }

    async fn open_shell(&self, target: &SessionTarget) -> Result<InMemoryChannel, TransportError> {
        if let Some(reason) = &self.refuse {
            return Err(TransportError::ConnectionFailed(format!(
                "{}: {reason}",
                target.destination()
            )));
        }

        self.stats.inner.lock().opens += 1;

        Ok(InMemoryChannel {
            pending: self.banner.iter().cloned().collect(),
            hello_reply: self.hello_reply.clone(),
            script: Arc::clone(&self.script),
            close_after: self.close_after,
            requests_seen: 0,
            ended: false,
            closed: false,
            stats: self.stats.clone(),
        })
    }
}

/// Channel handed out by [`InMemoryTransport`]
#[derive(Debug)]
pub struct InMemoryChannel {
    pending: VecDeque<String>,
    hello_reply: Vec<String>,
    script: Arc<Mutex<Script>>,
    close_after: Option<usize>,
    requests_seen: usize,
    ended: bool,
    closed: bool,
    stats: InMemoryStats,
}

#[async_trait]
impl ShellChannel for InMemoryChannel {
    async fn write_payload(&mut self, payload: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::InvalidState("Channel released".to_string()));
        }
        if self.ended {
            return Err(TransportError::SendFailed("Stream ended".to_string()));
        }

        self.stats.inner.lock().writes.push(payload.to_string());

        if payload.contains("<hello>") {
            self.pending.extend(self.hello_reply.iter().cloned());
            return Ok(());
        }

        if payload.contains("<rpc") {
            if let ScriptedReply::Lines(lines) = self.script.lock().next_reply() {
                self.pending.extend(lines);
            }
            self.requests_seen += 1;
            if self.close_after == Some(self.requests_seen) {
                self.ended = true;
            }
        }

        Ok(())
    }

    async fn next_line(&mut self) -> Result<Option<ShellLine>, TransportError> {
        if self.closed {
            return Err(TransportError::InvalidState("Channel released".to_string()));
        }

        tokio::task::yield_now().await;

        if let Some(line) = self.pending.pop_front() {
            return Ok(Some(ShellLine::new(line)));
        }
        if self.ended {
            return Ok(None);
        }

        // Nothing scripted: wait like a silent device would
        std::future::pending::<()>().await;
        Ok(None)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            self.stats.inner.lock().closes += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_banner_then_reply() {
        let transport = InMemoryTransport::new()
            .with_banner(["banner\n"])
            .with_reply(["<rpc-reply>\n", "</rpc-reply>\n"]);
        let mut channel = transport.open_shell(&SessionTarget::new("r1")).await.unwrap();

        assert_eq!(
            channel.next_line().await.unwrap(),
            Some(ShellLine::new("banner\n"))
        );

        channel.write_payload("<rpc message-id=\"1\"/>").await.unwrap();
        assert_eq!(
            channel.next_line().await.unwrap(),
            Some(ShellLine::new("<rpc-reply>\n"))
        );
        assert_eq!(
            channel.next_line().await.unwrap(),
            Some(ShellLine::new("</rpc-reply>\n"))
        );
        assert_eq!(transport.stats().writes().len(), 1);
    }

    #[tokio::test]
    async fn test_silent_device_never_yields() {
        let transport = InMemoryTransport::new();
        let mut channel = transport.open_shell(&SessionTarget::new("r1")).await.unwrap();
        channel.write_payload("<rpc/>").await.unwrap();

        let mut next = tokio_test::task::spawn(channel.next_line());
        tokio_test::assert_pending!(next.poll());
        tokio_test::assert_pending!(next.poll());
    }

    #[tokio::test]
    async fn test_close_after_ends_stream() {
        let transport = InMemoryTransport::new()
            .with_reply(["</rpc-reply>\n"])
            .close_after(1);
        let mut channel = transport.open_shell(&SessionTarget::new("r1")).await.unwrap();

        channel.write_payload("<rpc/>").await.unwrap();
        assert!(channel.next_line().await.unwrap().is_some());
        assert!(channel.next_line().await.unwrap().is_none());
        assert!(matches!(
            channel.write_payload("<rpc/>").await,
            Err(TransportError::SendFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_refusing_transport() {
        let transport = InMemoryTransport::new().refusing("connection refused");
        let result = transport.open_shell(&SessionTarget::new("r1")).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert_eq!(transport.stats().opens(), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let transport = InMemoryTransport::new();
        let stats = transport.stats();
        let mut channel = transport.open_shell(&SessionTarget::new("r1")).await.unwrap();

        channel.close().await.unwrap();
        channel.close().await.unwrap();
        assert_eq!(stats.closes(), 1);
        assert!(matches!(
            channel.next_line().await,
            Err(TransportError::InvalidState(_))
        ));
    }
}
