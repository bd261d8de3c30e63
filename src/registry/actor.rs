//! RegistryActor - owns every live sink
//!
//! The actor processes one command at a time, so an add, a remove and a
//! broadcast pass can never interleave. Commands sent while a `ForEach` is
//! running wait in the channel and are applied after it.

use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::commands::RegistryCommand;
use super::handle::RegistryHandle;
use super::{ForEachSummary, Visit, Visitor};
use crate::sinks::{Sink, SubscriberId};

pub(crate) struct RegistryActor {
    sinks: HashMap<SubscriberId, Box<dyn Sink>>,
    command_rx: mpsc::UnboundedReceiver<RegistryCommand>,
    /// Total sinks ever registered
    added: u64,
    /// Total sinks evicted after a failed visit
    evicted: u64,
}

impl RegistryActor {
    /// Spawn the actor on the current runtime and return a handle to it
    pub(crate) fn spawn() -> RegistryHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let actor = RegistryActor {
            sinks: HashMap::new(),
            command_rx: cmd_rx,
            added: 0,
            evicted: 0,
        };
        tokio::spawn(actor.run());

        debug!("Subscriber registry spawned");
        RegistryHandle::new(cmd_tx)
    }

    async fn run(mut self) {
        while let Some(cmd) = self.command_rx.recv().await {
            trace!(?cmd, "Processing registry command");

            match cmd {
                RegistryCommand::Add { id, sink, response } => {
                    let replaced = self.handle_add(id, sink).await;
                    let _ = response.send(replaced);
                }
                RegistryCommand::Remove { id, response } => {
                    let removed = self.handle_remove(&id).await;
                    let _ = response.send(removed);
                }
                RegistryCommand::ForEach { visitor, response } => {
                    let summary = self.handle_for_each(visitor.as_ref()).await;
                    let _ = response.send(summary);
                }
                RegistryCommand::Len { response } => {
                    let _ = response.send(self.sinks.len());
                }
                RegistryCommand::Ids { response } => {
                    let _ = response.send(self.sinks.keys().cloned().collect());
                }
                RegistryCommand::CloseAll { response } => {
                    let closed = self.close_all().await;
                    let _ = response.send(closed);
                }
                RegistryCommand::Shutdown => {
                    debug!("Registry received shutdown command");
                    break;
                }
            }
        }

        let closed = self.close_all().await;
        info!(
            added = self.added,
            evicted = self.evicted,
            closed_at_shutdown = closed,
            "Subscriber registry stopped"
        );
    }

    async fn handle_add(&mut self, id: SubscriberId, sink: Box<dyn Sink>) -> bool {
        let kind = sink.kind();
        self.added += 1;

        let replaced = match self.sinks.insert(id.clone(), sink) {
            Some(stale) => {
                warn!(subscriber = %id, "Replacing stale subscriber with the same identity");
                close_sink(&id, stale).await;
                true
            }
            None => false,
        };

        info!(subscriber = %id, kind, total = self.sinks.len(), "Subscriber added");
        replaced
    }

    async fn handle_remove(&mut self, id: &SubscriberId) -> bool {
        match self.sinks.remove(id) {
            Some(sink) => {
                close_sink(id, sink).await;
                info!(subscriber = %id, total = self.sinks.len(), "Subscriber removed");
                true
            }
            None => {
                trace!(subscriber = %id, "Remove of unknown subscriber ignored");
                false
            }
        }
    }

    async fn handle_for_each(&mut self, visitor: &dyn Visitor) -> ForEachSummary {
        let mut summary = ForEachSummary::default();

        for (id, sink) in self.sinks.iter_mut() {
            summary.visited += 1;
            if visitor.visit(id, sink.as_mut()).await == Visit::Evict {
                summary.evicted.push(id.clone());
            }
        }

        for id in &summary.evicted {
            if let Some(sink) = self.sinks.remove(id) {
                self.evicted += 1;
                close_sink(id, sink).await;
                info!(subscriber = %id, total = self.sinks.len(), "Subscriber evicted");
            }
        }

        summary
    }

    async fn close_all(&mut self) -> usize {
        let count = self.sinks.len();
        for (id, sink) in self.sinks.drain() {
            close_sink(&id, sink).await;
        }
        if count > 0 {
            debug!(count, "Closed all subscribers");
        }
        count
    }
}

/// Close a sink, logging (not propagating) failures
async fn close_sink(id: &SubscriberId, mut sink: Box<dyn Sink>) {
    if let Err(e) = sink.close().await {
        debug!(subscriber = %id, error = %e, "Error while closing subscriber");
    }
}
