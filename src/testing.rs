//! In-memory sinks for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

use crate::sinks::Sink;

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    pub lines: Vec<String>,
    pub closed: bool,
    pub close_calls: usize,
    pub wrote_after_close: bool,
    pub fail_writes: bool,
    pub fail_close: bool,
}

/// Sink recording everything written to it; clones share the same state
#[derive(Debug, Clone, Default)]
pub(crate) struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every write fails
    pub fn failing() -> Self {
        let sink = Self::new();
        sink.state.lock().fail_writes = true;
        sink
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.state.lock().fail_close = fail;
    }

    pub fn lines(&self) -> Vec<String> {
        self.state.lock().lines.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }

    pub fn wrote_after_close(&self) -> bool {
        self.state.lock().wrote_after_close
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            state.wrote_after_close = true;
        }
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "memory sink broken"));
        }
        state.lines.push(String::from_utf8_lossy(bytes).into_owned());
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        state.closed = true;
        state.close_calls += 1;
        if state.fail_close {
            return Err(io::Error::new(io::ErrorKind::Other, "close failed"));
        }
        Ok(())
    }
}
