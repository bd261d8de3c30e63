//! Monitor - wires sampler, broadcaster, registry and acceptor together
//!
//! Startup order: configure lines, start the registry (plus the log sink),
//! bind the listener, then start the broadcaster and sampler. Any failure up
//! to that point is fatal. Shutdown runs the other way round so the
//! broadcaster drains every queued change before the sinks are closed.

use anyhow::{anyhow, Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::acceptor::Acceptor;
use crate::broadcast::Broadcaster;
use crate::config::Settings;
use crate::error::RegistryError;
use crate::lines::LineReader;
use crate::registry::RegistryHandle;
use crate::sampler::{Sampler, SamplerHandle, SamplerStats};
use crate::sinks::{LogSink, SubscriberId};

#[cfg(test)]
mod tests;

/// Counters collected at shutdown
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MonitorStats {
    pub sampler: SamplerStats,
    /// Changes the broadcaster delivered to the registry
    pub broadcast: u64,
    /// Connections accepted over the monitor's lifetime
    pub accepted: u64,
    /// Sinks still registered at shutdown
    pub closed: usize,
}

/// A running monitor
pub struct Monitor {
    registry: RegistryHandle,
    sampler: SamplerHandle,
    acceptor: Option<Acceptor>,
    broadcaster: Option<JoinHandle<Result<u64, RegistryError>>>,
}

impl Monitor {
    /// Configure the lines and start every task
    pub async fn start(settings: &Settings, reader: Arc<dyn LineReader>) -> Result<Self> {
        let sampler = Sampler::configure(reader, settings.names.line_ids(), settings.sampler)
            .context("Failed to configure input lines")?;

        let registry = RegistryHandle::spawn();
        if settings.log_changes {
            registry
                .add(SubscriberId::local("log"), LogSink::new())
                .await
                .context("Failed to register log sink")?;
        }

        let acceptor = match settings.listen {
            Some(addr) => Some(Acceptor::bind(addr, registry.clone()).await?),
            None => {
                info!("Network sink disabled");
                None
            }
        };

        let (events_tx, events_rx) = mpsc::channel(settings.channel_capacity);
        let broadcaster = Broadcaster::new(
            Arc::new(settings.names.clone()),
            registry.clone(),
            settings.write_timeout,
        );
        let broadcaster = tokio::spawn(broadcaster.run(events_rx));
        let sampler = sampler.spawn(events_tx);

        info!(
            lines = settings.names.line_ids().len(),
            listen = ?settings.listen,
            log_changes = settings.log_changes,
            "Monitor started"
        );

        Ok(Self {
            registry,
            sampler,
            acceptor,
            broadcaster: Some(broadcaster),
        })
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Address the listener is bound to, if the network sink is enabled
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.acceptor.as_ref().map(Acceptor::local_addr)
    }

    /// Run until `shutdown` resolves, then stop
    ///
    /// Returns early with an error if the broadcaster dies on its own.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<MonitorStats>
    where
        F: Future<Output = ()>,
    {
        let Some(mut broadcaster) = self.broadcaster.take() else {
            return self.stop().await;
        };

        let finished = tokio::select! {
            _ = shutdown => None,
            result = &mut broadcaster => Some(result),
        };

        match finished {
            None => {
                info!("Shutdown requested");
                self.broadcaster = Some(broadcaster);
                self.stop().await
            }
            Some(result) => {
                let err = match result {
                    Ok(Ok(count)) => anyhow!("Broadcaster stopped after {} changes", count),
                    Ok(Err(e)) => anyhow::Error::new(e),
                    Err(e) => anyhow::Error::new(e),
                };
                error!("Broadcaster failed: {:#}", err);
                self.stop().await?;
                Err(err.context("Broadcaster ended unexpectedly"))
            }
        }
    }

    /// Stop sampling and accepting, drain the broadcaster, close every sink
    pub async fn stop(self) -> Result<MonitorStats> {
        let Monitor {
            registry,
            sampler,
            acceptor,
            broadcaster,
        } = self;

        let sampler = sampler.stop().await;
        let accepted = match acceptor {
            Some(acceptor) => acceptor.stop().await,
            None => 0,
        };

        let broadcast = match broadcaster {
            Some(task) => task
                .await
                .context("Broadcaster task panicked")?
                .context("Broadcaster lost the subscriber registry")?,
            None => 0,
        };

        let closed = registry.close_all().await.unwrap_or(0);
        registry.shutdown();

        let stats = MonitorStats {
            sampler,
            broadcast,
            accepted,
            closed,
        };
        info!(
            sweeps = stats.sampler.sweeps,
            changes = stats.broadcast,
            dropped = stats.sampler.dropped,
            abandoned = stats.sampler.abandoned,
            read_errors = stats.sampler.read_errors,
            accepted = stats.accepted,
            "Monitor stopped"
        );
        Ok(stats)
    }
}

/// Start a monitor and run it until `shutdown` resolves
pub async fn run<F>(settings: &Settings, reader: Arc<dyn LineReader>, shutdown: F) -> Result<MonitorStats>
where
    F: Future<Output = ()>,
{
    Monitor::start(settings, reader).await?.run_until(shutdown).await
}
