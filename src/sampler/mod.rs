//! Line sampler - polls every configured line and emits state changes
//!
//! One sweep reads all lines in ascending id order and feeds each sample to
//! the [`EdgeDetector`]. The run loop forwards the resulting changes into the
//! event channel, then sleeps for the polling interval.
//!
//! ```text
//!  LineReader ──read──► EdgeDetector ──StateChange──► mpsc ──► Broadcaster
//!       ▲                                              │
//!       └──────────── sleep(interval) ◄────────────────┘
//! ```

mod edge;

pub use edge::{EdgeDetector, StateChange};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::LineError;
use crate::lines::{LineId, LineReader};

/// Default delay between sweeps
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Sampler timing and backpressure settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Sleep between the end of one sweep and the start of the next
    pub interval: Duration,
    /// `None` blocks on a full event channel; `Some` waits at most this
    /// long and then drops the event
    pub send_timeout: Option<Duration>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            send_timeout: None,
        }
    }
}

/// Counters reported when the sampler stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SamplerStats {
    pub sweeps: u64,
    /// Changes handed to the broadcaster
    pub changes: u64,
    /// Changes dropped after a send timeout
    pub dropped: u64,
    /// Changes still pending when the loop stopped
    pub abandoned: u64,
    pub read_errors: u64,
}

enum Forward {
    Sent,
    Dropped,
    Stop,
}

/// Polls a fixed set of lines and detects transitions
pub struct Sampler {
    reader: Arc<dyn LineReader>,
    lines: Vec<LineId>,
    detector: EdgeDetector,
    /// Consecutive failed reads per line
    failures: HashMap<LineId, u64>,
    read_errors: u64,
    config: SamplerConfig,
}

impl Sampler {
    /// Configure every line as a pulled-up input and build the sampler
    ///
    /// Fails on the first line the backend cannot configure.
    pub fn configure(
        reader: Arc<dyn LineReader>,
        mut lines: Vec<LineId>,
        config: SamplerConfig,
    ) -> Result<Self, LineError> {
        lines.sort_unstable();
        lines.dedup();

        for line in &lines {
            reader.configure_as_input(*line)?;
            reader.enable_pull_up(*line)?;
        }

        info!(
            backend = reader.name(),
            lines = lines.len(),
            interval_ms = config.interval.as_millis() as u64,
            "Lines configured"
        );

        Ok(Self {
            reader,
            lines,
            detector: EdgeDetector::new(),
            failures: HashMap::new(),
            read_errors: 0,
            config,
        })
    }

    pub fn lines(&self) -> &[LineId] {
        &self.lines
    }

    pub fn detector(&self) -> &EdgeDetector {
        &self.detector
    }

    /// Read every line once and return the changes, in line order
    ///
    /// A failed read counts as "no change" for that line.
    pub fn sweep(&mut self) -> Vec<StateChange> {
        let mut changes = Vec::new();

        for &line in &self.lines {
            match self.reader.read(line) {
                Ok(sample) => {
                    note_success(&mut self.failures, line);
                    if let Some(change) = self.detector.observe(line, sample) {
                        debug!(line = %line, state = sample, "Line changed");
                        changes.push(change);
                    }
                }
                Err(e) => {
                    self.read_errors += 1;
                    note_failure(&mut self.failures, line, &e);
                }
            }
        }

        changes
    }

    /// Start the polling loop on the runtime
    pub fn spawn(self, events: mpsc::Sender<StateChange>) -> SamplerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(self.run(events, shutdown_rx));

        SamplerHandle {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Sweeps run on the blocking pool since line reads are synchronous I/O
    async fn run(
        self,
        events: mpsc::Sender<StateChange>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> SamplerStats {
        let mut stats = SamplerStats::default();
        let mut sampler = self;
        info!(lines = ?sampler.lines, "Sampler started");

        'sampling: loop {
            let sweep = tokio::task::spawn_blocking(move || {
                let changes = sampler.sweep();
                (sampler, changes)
            });
            let changes = match sweep.await {
                Ok((back, changes)) => {
                    sampler = back;
                    changes
                }
                Err(e) => {
                    error!("Sweep task failed, stopping sampler: {}", e);
                    return stats;
                }
            };
            stats.sweeps += 1;

            let mut pending = changes.into_iter();
            while let Some(change) = pending.next() {
                match sampler.forward(change, &events, &mut shutdown_rx).await {
                    Forward::Sent => stats.changes += 1,
                    Forward::Dropped => stats.dropped += 1,
                    Forward::Stop => {
                        stats.abandoned = 1 + pending.len() as u64;
                        break 'sampling;
                    }
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break 'sampling,
                _ = tokio::time::sleep(sampler.config.interval) => {}
            }
        }

        stats.read_errors = sampler.read_errors;
        info!(
            sweeps = stats.sweeps,
            changes = stats.changes,
            dropped = stats.dropped,
            abandoned = stats.abandoned,
            read_errors = stats.read_errors,
            "Sampler stopped"
        );
        stats
    }

    /// Hand one change to the broadcaster according to the backpressure policy
    async fn forward(
        &self,
        change: StateChange,
        events: &mpsc::Sender<StateChange>,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> Forward {
        let line = change.line;
        let send_timeout = self.config.send_timeout;

        let send = async move {
            match send_timeout {
                None => events.send(change).await.map_err(|_| None),
                Some(limit) => events.send_timeout(change, limit).await.map_err(|e| match e {
                    SendTimeoutError::Timeout(_) => Some(limit),
                    SendTimeoutError::Closed(_) => None,
                }),
            }
        };

        tokio::select! {
            _ = shutdown_rx.recv() => Forward::Stop,
            result = send => match result {
                Ok(()) => Forward::Sent,
                Err(Some(limit)) => {
                    warn!(
                        line = %line,
                        timeout_ms = limit.as_millis() as u64,
                        "Event channel full, dropping state change"
                    );
                    Forward::Dropped
                }
                Err(None) => {
                    warn!("Event receiver dropped, stopping sampler");
                    Forward::Stop
                }
            },
        }
    }
}

fn note_failure(failures: &mut HashMap<LineId, u64>, line: LineId, err: &LineError) {
    let streak = failures.entry(line).or_insert(0);
    *streak += 1;

    if *streak == 1 {
        warn!(line = %line, error = %err, "Line read failed, treating as no change");
    } else {
        debug!(line = %line, streak = *streak, error = %err, "Line read still failing");
    }
}

fn note_success(failures: &mut HashMap<LineId, u64>, line: LineId) {
    if let Some(streak) = failures.remove(&line) {
        info!(line = %line, failed_reads = streak, "Line read recovered");
    }
}

/// Handle to a running sampler
///
/// Dropping the handle also stops the loop.
pub struct SamplerHandle {
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<SamplerStats>>,
}

impl SamplerHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the loop and wait for it to finish
    ///
    /// The event sender is dropped with the loop, which closes the channel
    /// once the broadcaster has drained it.
    pub async fn stop(mut self) -> SamplerStats {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        match self.task.take() {
            Some(task) => task.await.unwrap_or_else(|e| {
                warn!("Sampler task ended abnormally: {}", e);
                SamplerStats::default()
            }),
            None => SamplerStats::default(),
        }
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
    }
}
