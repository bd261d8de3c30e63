//! Broadcaster - formats state changes and fans them out to every subscriber
//!
//! Delivery is best-effort and at-most-once: each live subscriber gets one
//! write attempt per change, bounded by the write timeout. A subscriber whose
//! write fails or times out is evicted from the registry; the others still
//! receive the change.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::names::NameTables;
use crate::registry::{RegistryHandle, Visit, Visitor};
use crate::sampler::StateChange;
use crate::sinks::{Sink, SubscriberId};

/// Default upper bound for a single subscriber write
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 1000;

/// Result of broadcasting one change
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: Vec<SubscriberId>,
}

/// One write of one message to each visited sink
struct Delivery {
    message: String,
    write_timeout: Duration,
}

#[async_trait]
impl Visitor for Delivery {
    async fn visit(&self, id: &SubscriberId, sink: &mut dyn Sink) -> Visit {
        match tokio::time::timeout(self.write_timeout, sink.write(self.message.as_bytes())).await {
            Ok(Ok(())) => Visit::Keep,
            Ok(Err(e)) => {
                warn!(subscriber = %id, kind = sink.kind(), error = %e, "Write failed, dropping subscriber");
                Visit::Evict
            }
            Err(_) => {
                warn!(
                    subscriber = %id,
                    kind = sink.kind(),
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Write timed out, dropping subscriber"
                );
                Visit::Evict
            }
        }
    }
}

/// Consumes state changes and delivers them through the registry
pub struct Broadcaster {
    names: Arc<NameTables>,
    registry: RegistryHandle,
    write_timeout: Duration,
}

impl Broadcaster {
    pub fn new(names: Arc<NameTables>, registry: RegistryHandle, write_timeout: Duration) -> Self {
        Self {
            names,
            registry,
            write_timeout,
        }
    }

    /// Wire text for a change
    pub fn format(&self, change: &StateChange) -> String {
        self.names.describe(change)
    }

    /// Deliver one change to every registered subscriber
    pub async fn broadcast(&self, change: &StateChange) -> Result<DeliveryReport, RegistryError> {
        let message = self.format(change);
        let delivery = Arc::new(Delivery {
            message,
            write_timeout: self.write_timeout,
        });

        let summary = self.registry.for_each(delivery).await?;
        let report = DeliveryReport {
            delivered: summary.visited - summary.evicted.len(),
            dropped: summary.evicted,
        };

        let latency_ms = (Utc::now() - change.observed_at).num_milliseconds();
        debug!(
            line = %change.line,
            state = change.state,
            delivered = report.delivered,
            dropped = report.dropped.len(),
            latency_ms,
            "Change broadcast"
        );
        Ok(report)
    }

    /// Broadcast every change until the channel closes
    ///
    /// Returns the number of changes broadcast. Stops early only if the
    /// registry has gone away.
    pub async fn run(self, mut events: mpsc::Receiver<StateChange>) -> Result<u64, RegistryError> {
        let mut count = 0u64;
        info!("Broadcaster started");

        while let Some(change) = events.recv().await {
            self.broadcast(&change).await?;
            count += 1;
        }

        info!(changes = count, "Broadcaster stopped");
        Ok(count)
    }
}
