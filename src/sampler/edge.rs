//! Edge detection over successive line samples

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::lines::LineId;

/// A single observed transition of one line
#[derive(Debug, Clone)]
pub struct StateChange {
    pub line: LineId,
    /// New level (`true` = high)
    pub state: bool,
    /// When the sweep observed the new level
    pub observed_at: DateTime<Utc>,
}

impl StateChange {
    pub fn new(line: LineId, state: bool) -> Self {
        Self {
            line,
            state,
            observed_at: Utc::now(),
        }
    }

    /// Raw state value used for state-name lookup (0 or 1)
    pub fn raw_state(&self) -> u8 {
        u8::from(self.state)
    }
}

/// Last-known level per line
///
/// The first sample of a line only seeds the table. Later samples produce a
/// [`StateChange`] exactly when they differ from the recorded level.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    last: HashMap<LineId, bool>,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, line: LineId, sample: bool) -> Option<StateChange> {
        match self.last.insert(line, sample) {
            Some(previous) if previous != sample => Some(StateChange::new(line, sample)),
            _ => None,
        }
    }

    pub fn last_known(&self, line: LineId) -> Option<bool> {
        self.last.get(&line).copied()
    }

    /// Number of lines with a recorded level
    pub fn tracked(&self) -> usize {
        self.last.len()
    }
}
