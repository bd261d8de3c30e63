//! Sink that writes notifications to the local log
//!
//! Used when the network sink is disabled, or alongside it when
//! `log_changes` is set.

use async_trait::async_trait;
use std::io;
use tracing::info;

use super::Sink;

/// Log target for change notifications
pub const CHANGES_TARGET: &str = "linewatch::changes";

#[derive(Debug, Default)]
pub struct LogSink {
    written: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Sink for LogSink {
    fn kind(&self) -> &'static str {
        "log"
    }

    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let text = String::from_utf8_lossy(bytes);
        self.written += 1;
        info!(target: CHANGES_TARGET, seq = self.written, "{}", text.trim_end());
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        info!(notifications = self.written, "Log sink closed");
        Ok(())
    }
}
