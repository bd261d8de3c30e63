//! Subscriber registry - actor-owned set of live sinks
//!
//! All registry operations are messages to a single actor task, which owns the
//! map of sinks outright. Adds, removes and iterations are therefore applied
//! one at a time, and a sink can never be written after it was removed.
//!
//! ```text
//!   Acceptor ──add/remove──┐
//!                          ▼
//!   Broadcaster ──for_each──► RegistryActor { HashMap<SubscriberId, Box<dyn Sink>> }
//!                          ▲
//!   Monitor ──close_all────┘
//! ```

mod actor;
mod commands;
mod handle;

pub use handle::RegistryHandle;

use async_trait::async_trait;

use crate::sinks::{Sink, SubscriberId};

/// Verdict of a [`Visitor`] for one sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Keep,
    /// Close the sink and remove it from the registry
    Evict,
}

/// Per-sink callback run by [`RegistryHandle::for_each`]
///
/// The visitor runs inside the registry actor with exclusive access to each
/// sink in turn.
#[async_trait]
pub trait Visitor: Send + Sync {
    async fn visit(&self, id: &SubscriberId, sink: &mut dyn Sink) -> Visit;
}

/// Outcome of one `for_each` pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ForEachSummary {
    /// Sinks the visitor ran on
    pub visited: usize,
    /// Sinks evicted by the visitor
    pub evicted: Vec<SubscriberId>,
}

#[cfg(test)]
mod tests;
