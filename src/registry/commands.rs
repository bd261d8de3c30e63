//! Command messages for the registry actor

use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

use super::{ForEachSummary, Visitor};
use crate::sinks::{Sink, SubscriberId};

/// Commands processed sequentially by the registry actor
pub(crate) enum RegistryCommand {
    /// Register a sink; replaces (and closes) an existing sink with the same id
    Add {
        id: SubscriberId,
        sink: Box<dyn Sink>,
        /// `true` if a stale entry was replaced
        response: oneshot::Sender<bool>,
    },

    /// Deregister and close a sink; absent ids are a no-op
    Remove {
        id: SubscriberId,
        /// `true` if the id was present
        response: oneshot::Sender<bool>,
    },

    /// Run a visitor over every registered sink
    ForEach {
        visitor: Arc<dyn Visitor>,
        response: oneshot::Sender<ForEachSummary>,
    },

    Len {
        response: oneshot::Sender<usize>,
    },

    Ids {
        response: oneshot::Sender<Vec<SubscriberId>>,
    },

    /// Close and remove every sink; the actor keeps running
    CloseAll {
        response: oneshot::Sender<usize>,
    },

    /// Close every sink and stop the actor
    Shutdown,
}

impl fmt::Debug for RegistryCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryCommand::Add { id, sink, .. } => f
                .debug_struct("Add")
                .field("id", id)
                .field("kind", &sink.kind())
                .finish(),
            RegistryCommand::Remove { id, .. } => f.debug_struct("Remove").field("id", id).finish(),
            RegistryCommand::ForEach { .. } => f.write_str("ForEach"),
            RegistryCommand::Len { .. } => f.write_str("Len"),
            RegistryCommand::Ids { .. } => f.write_str("Ids"),
            RegistryCommand::CloseAll { .. } => f.write_str("CloseAll"),
            RegistryCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}
