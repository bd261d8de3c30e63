//! RegistryHandle - public API for the registry actor
//!
//! Cheap to clone; the acceptor, the broadcaster and the monitor each hold
//! one. Every call is a message to the actor and waits for its reply.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use super::actor::RegistryActor;
use super::commands::RegistryCommand;
use super::{ForEachSummary, Visitor};
use crate::error::RegistryError;
use crate::sinks::{Sink, SubscriberId};

/// Handle for interacting with the subscriber registry
///
/// Async methods return [`RegistryError::Closed`] once the actor has stopped.
///
/// # Membership Methods
/// - `add` - Register a sink, replacing a stale one with the same id
/// - `remove` - Deregister and close a sink
///
/// # Delivery Methods
/// - `for_each` - Run a visitor over every sink, evicting rejected ones
///
/// # Query Methods
/// - `len` / `is_empty` - Number of registered sinks
/// - `ids` - Identities of registered sinks
///
/// # Lifecycle Methods
/// - `close_all` - Close every sink, keep the actor running
/// - `is_alive` - Whether the actor still accepts commands
/// - `shutdown` - Close every sink and stop the actor
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command channel to the RegistryActor
    cmd_tx: mpsc::UnboundedSender<RegistryCommand>,
}

impl RegistryHandle {
    pub(crate) fn new(cmd_tx: mpsc::UnboundedSender<RegistryCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Spawn a new registry actor and return its handle
    ///
    /// Must be called from within a tokio runtime. The actor stops when the
    /// last handle is dropped or on [`shutdown`](Self::shutdown).
    pub fn spawn() -> Self {
        RegistryActor::spawn()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, RegistryError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(response_tx))
            .map_err(|_| RegistryError::Closed)?;
        response_rx.await.map_err(|_| RegistryError::Closed)
    }

    // =========================================================================
    // Membership methods
    // =========================================================================

    /// Register a sink under `id`
    ///
    /// # Arguments
    ///
    /// * `id` - Identity of the subscriber (connection endpoints or a local name)
    /// * `sink` - Destination for notifications; owned by the registry from now on
    ///
    /// # Returns
    ///
    /// `true` if a stale sink with the same id was replaced (and closed)
    pub async fn add(
        &self,
        id: SubscriberId,
        sink: impl Sink + 'static,
    ) -> Result<bool, RegistryError> {
        let sink: Box<dyn Sink> = Box::new(sink);
        self.request(|response| RegistryCommand::Add { id, sink, response })
            .await
    }

    /// Deregister and close the sink under `id`
    ///
    /// Idempotent: returns `Ok(false)` when the id is not registered. Once
    /// this returns, the sink will never be written again.
    pub async fn remove(&self, id: &SubscriberId) -> Result<bool, RegistryError> {
        let id = id.clone();
        self.request(|response| RegistryCommand::Remove { id, response })
            .await
    }

    // =========================================================================
    // Delivery methods
    // =========================================================================

    /// Run `visitor` over every registered sink, evicting those it rejects
    ///
    /// The whole pass runs inside the actor, so adds and removes issued
    /// meanwhile are applied after it. Evicted sinks are closed before this
    /// returns.
    ///
    /// # Arguments
    ///
    /// * `visitor` - Called once per sink with exclusive access to it
    ///
    /// # Returns
    ///
    /// How many sinks were visited and which ones were evicted
    pub async fn for_each(
        &self,
        visitor: Arc<dyn Visitor>,
    ) -> Result<ForEachSummary, RegistryError> {
        self.request(|response| RegistryCommand::ForEach { visitor, response })
            .await
    }

    // =========================================================================
    // Query methods
    // =========================================================================

    /// Number of registered sinks
    pub async fn len(&self) -> Result<usize, RegistryError> {
        self.request(|response| RegistryCommand::Len { response })
            .await
    }

    pub async fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.len().await? == 0)
    }

    /// Identities of every registered sink, in no particular order
    pub async fn ids(&self) -> Result<Vec<SubscriberId>, RegistryError> {
        self.request(|response| RegistryCommand::Ids { response })
            .await
    }

    // =========================================================================
    // Lifecycle methods
    // =========================================================================

    /// Close and remove every sink; returns how many were closed
    ///
    /// The actor keeps running and accepts new sinks afterwards.
    pub async fn close_all(&self) -> Result<usize, RegistryError> {
        self.request(|response| RegistryCommand::CloseAll { response })
            .await
    }

    /// Returns false once the actor has stopped
    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Ask the actor to close every sink and stop
    ///
    /// Fire-and-forget: does not wait for the actor to finish.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(RegistryCommand::Shutdown);
    }
}
