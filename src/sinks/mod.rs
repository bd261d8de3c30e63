//! Notification sinks
//!
//! A sink is anything that receives formatted change text: a TCP client, the
//! local log, an in-process buffer. The registry owns sinks as
//! `Box<dyn Sink>` and is the only caller of their methods.

pub mod log;
pub mod stream;

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::net::SocketAddr;

pub use self::log::LogSink;
pub use self::stream::{StreamSink, TcpSink};

/// Identity of a registered sink
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriberId {
    /// Network connection, keyed by its local and remote endpoints
    Connection { local: SocketAddr, remote: SocketAddr },
    /// In-process sink (e.g. "log")
    Local(String),
}

impl SubscriberId {
    /// Id of an accepted connection, from the listener side
    pub fn connection(local: SocketAddr, remote: SocketAddr) -> Self {
        Self::Connection { local, remote }
    }

    /// Id of an in-process sink
    pub fn local(name: impl Into<String>) -> Self {
        Self::Local(name.into())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriberId::Connection { local, remote } => write!(f, "{} - {}", local, remote),
            SubscriberId::Local(name) => write!(f, "{}", name),
        }
    }
}

/// Receiver of formatted change notifications
///
/// Implementations only see calls from the registry actor, one at a time, so
/// they need `Send` but not `Sync`. The broadcaster bounds every `write`
/// with a timeout; a sink never has to enforce one itself.
#[async_trait]
pub trait Sink: Send {
    /// Short kind label for logs ("tcp", "log", ...)
    fn kind(&self) -> &'static str;

    /// Deliver one notification
    ///
    /// # Arguments
    ///
    /// * `bytes` - One complete notification line, newline included
    ///
    /// # Returns
    ///
    /// `Err` means the sink is dead; the registry evicts and closes it and
    /// never writes to it again.
    async fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Release the sink
    ///
    /// Called exactly once, when the sink leaves the registry. Errors are
    /// logged by the registry and otherwise ignored.
    async fn close(&mut self) -> io::Result<()>;
}
