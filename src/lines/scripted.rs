//! In-memory lines with scripted samples
//!
//! Each line plays back a queue of scripted samples, then holds its last
//! level. The level can also be set directly, which is how tests simulate a
//! door opening while the monitor is running.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use super::{LineId, LineReader};
use crate::error::LineError;

/// One scripted read result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    Level(bool),
    /// The read fails with a backend error
    Fail,
}

#[derive(Debug, Default)]
struct ScriptedLine {
    queue: VecDeque<Sample>,
    level: bool,
    input: bool,
    pull_up: bool,
    reads: usize,
}

/// Scripted [`LineReader`] backend
#[derive(Debug, Default)]
pub struct ScriptedLines {
    lines: Mutex<HashMap<LineId, ScriptedLine>>,
}

impl ScriptedLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line holding `level` until scripted otherwise
    pub fn with_line(self, line: impl Into<LineId>, level: bool) -> Self {
        self.lines.lock().insert(
            line.into(),
            ScriptedLine {
                level,
                ..Default::default()
            },
        );
        self
    }

    /// Append samples to the line's playback queue
    pub fn script(&self, line: impl Into<LineId>, samples: impl IntoIterator<Item = bool>) {
        let mut lines = self.lines.lock();
        let entry = lines.entry(line.into()).or_default();
        entry.queue.extend(samples.into_iter().map(Sample::Level));
    }

    /// Make the next queued read of the line fail
    pub fn push_failure(&self, line: impl Into<LineId>) {
        let mut lines = self.lines.lock();
        lines.entry(line.into()).or_default().queue.push_back(Sample::Fail);
    }

    /// Set the level immediately, discarding any queued samples
    pub fn set(&self, line: impl Into<LineId>, level: bool) {
        let mut lines = self.lines.lock();
        let entry = lines.entry(line.into()).or_default();
        entry.queue.clear();
        entry.level = level;
    }

    pub fn is_input(&self, line: impl Into<LineId>) -> bool {
        self.lines
            .lock()
            .get(&line.into())
            .map(|l| l.input)
            .unwrap_or(false)
    }

    pub fn is_pulled_up(&self, line: impl Into<LineId>) -> bool {
        self.lines
            .lock()
            .get(&line.into())
            .map(|l| l.pull_up)
            .unwrap_or(false)
    }

    /// Number of reads performed on the line
    pub fn reads(&self, line: impl Into<LineId>) -> usize {
        self.lines
            .lock()
            .get(&line.into())
            .map(|l| l.reads)
            .unwrap_or(0)
    }
}

impl LineReader for ScriptedLines {
    fn name(&self) -> &str {
        "scripted"
    }

    fn configure_as_input(&self, line: LineId) -> Result<(), LineError> {
        self.lines.lock().entry(line).or_default().input = true;
        Ok(())
    }

    fn enable_pull_up(&self, line: LineId) -> Result<(), LineError> {
        let mut lines = self.lines.lock();
        match lines.get_mut(&line) {
            Some(entry) if entry.input => {
                entry.pull_up = true;
                Ok(())
            }
            _ => Err(LineError::NotConfigured(line)),
        }
    }

    fn read(&self, line: LineId) -> Result<bool, LineError> {
        let mut lines = self.lines.lock();
        let entry = match lines.get_mut(&line) {
            Some(entry) if entry.input => entry,
            _ => return Err(LineError::NotConfigured(line)),
        };

        entry.reads += 1;
        match entry.queue.pop_front() {
            Some(Sample::Level(level)) => {
                entry.level = level;
                Ok(level)
            }
            Some(Sample::Fail) => Err(LineError::Backend {
                line,
                message: "scripted read failure".to_string(),
            }),
            None => Ok(entry.level),
        }
    }
}
