//! TCP acceptor - registers every inbound connection as a subscriber
//!
//! Each accepted stream is split: the write half becomes a [`TcpSink`] in the
//! registry, the read half is drained by a watcher task. EOF only means the
//! client is done sending; a half-closed client stays subscribed until a write
//! to it fails. A read error (e.g. a reset) removes the subscriber right away.
//! Accept errors are logged and never end the loop.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::registry::RegistryHandle;
use crate::sinks::{SubscriberId, TcpSink};

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Running accept loop
pub struct Acceptor {
    local_addr: SocketAddr,
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<u64>>,
}

impl Acceptor {
    /// Bind the listener and start accepting
    ///
    /// A bind failure is fatal for the caller.
    pub async fn bind(addr: SocketAddr, registry: RegistryHandle) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind listener on {}", addr))?;
        let local_addr = listener
            .local_addr()
            .context("Failed to read listener address")?;

        info!("Listening for subscribers on {}", local_addr);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(accept_loop(listener, registry, shutdown_rx));

        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, abort the disconnect watchers and return the number of
    /// connections accepted
    pub async fn stop(mut self) -> u64 {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        match self.task.take() {
            Some(task) => task.await.unwrap_or_else(|e| {
                warn!("Acceptor task ended abnormally: {}", e);
                0
            }),
            None => 0,
        }
    }
}

impl Drop for Acceptor {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: RegistryHandle,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> u64 {
    let mut incoming = TcpListenerStream::new(listener);
    let mut watchers = JoinSet::new();
    let mut accepted = 0u64;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,

            next = incoming.next() => match next {
                Some(Ok(stream)) => match register(stream, &registry).await {
                    Ok((id, read_half)) => {
                        accepted += 1;
                        watchers.spawn(watch_disconnect(read_half, id, registry.clone()));
                    }
                    Err(e) => warn!("Failed to register connection: {:#}", e),
                },
                Some(Err(e)) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
                None => break,
            },

            Some(_) = watchers.join_next(), if !watchers.is_empty() => {}
        }
    }

    watchers.shutdown().await;
    info!(accepted, "Acceptor stopped");
    accepted
}

/// Register the write half; hand back the read half for the watcher
async fn register(
    stream: TcpStream,
    registry: &RegistryHandle,
) -> Result<(SubscriberId, OwnedReadHalf)> {
    let local = stream.local_addr().context("Connection has no local address")?;
    let remote = stream.peer_addr().context("Connection has no peer address")?;
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY for {}: {}", remote, e);
    }

    let id = SubscriberId::connection(local, remote);
    let (read_half, write_half) = stream.into_split();
    registry.add(id.clone(), TcpSink::tcp(write_half)).await?;

    Ok((id, read_half))
}

/// Drain whatever the client sends; remove the subscriber if the connection
/// breaks
async fn watch_disconnect(mut read_half: OwnedReadHalf, id: SubscriberId, registry: RegistryHandle) {
    let mut buf = [0u8; 256];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                // Half-closed: the write side is still usable
                debug!(subscriber = %id, "Subscriber closed its sending side");
                return;
            }
            Ok(n) => debug!(subscriber = %id, bytes = n, "Ignoring input from subscriber"),
            Err(e) => {
                debug!(subscriber = %id, error = %e, "Subscriber read failed");
                break;
            }
        }
    }

    match registry.remove(&id).await {
        Ok(true) => debug!(subscriber = %id, "Subscriber disconnected"),
        Ok(false) => {}
        Err(e) => debug!(subscriber = %id, error = %e, "Could not remove subscriber"),
    }
}
