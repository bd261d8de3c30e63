//! Display names for lines and states, and notification formatting

use std::collections::{BTreeMap, HashMap};

use crate::lines::LineId;
use crate::sampler::StateChange;

/// Built-in state names, applied before any overrides
pub const DEFAULT_STATE_NAMES: [(u8, &str); 2] = [(0, "off"), (1, "on")];

/// Name tables shared by all notification formatting
///
/// The keys of `lines` are the set of monitored lines. Both tables are
/// read-only once the monitor starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTables {
    lines: BTreeMap<LineId, String>,
    states: HashMap<u8, String>,
}

impl Default for NameTables {
    fn default() -> Self {
        Self {
            lines: BTreeMap::new(),
            states: DEFAULT_STATE_NAMES
                .iter()
                .map(|(value, name)| (*value, name.to_string()))
                .collect(),
        }
    }
}

impl NameTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name a line, replacing any earlier name
    pub fn with_line(mut self, line: impl Into<LineId>, name: impl Into<String>) -> Self {
        self.set_line(line.into(), name.into());
        self
    }

    /// Name a raw state value, replacing the default or earlier name
    pub fn with_state(mut self, value: u8, name: impl Into<String>) -> Self {
        self.set_state(value, name.into());
        self
    }

    pub fn set_line(&mut self, line: LineId, name: String) {
        self.lines.insert(line, name);
    }

    pub fn set_state(&mut self, value: u8, name: String) {
        self.states.insert(value, name);
    }

    /// Monitored lines in ascending id order
    pub fn line_ids(&self) -> Vec<LineId> {
        self.lines.keys().copied().collect()
    }

    pub fn lines(&self) -> impl Iterator<Item = (&LineId, &String)> {
        self.lines.iter()
    }

    /// State names sorted by raw value
    pub fn states(&self) -> Vec<(u8, &str)> {
        let mut states: Vec<_> = self
            .states
            .iter()
            .map(|(value, name)| (*value, name.as_str()))
            .collect();
        states.sort_unstable_by_key(|(value, _)| *value);
        states
    }

    /// Line name, falling back to the numeric id
    pub fn line_name(&self, line: LineId) -> String {
        self.lines
            .get(&line)
            .cloned()
            .unwrap_or_else(|| line.to_string())
    }

    /// State name, falling back to the numeric value
    pub fn state_name(&self, value: u8) -> String {
        self.states
            .get(&value)
            .cloned()
            .unwrap_or_else(|| value.to_string())
    }

    /// Format the wire text for a change: `"<line> changed state to <state>\n"`
    pub fn describe(&self, change: &StateChange) -> String {
        format!(
            "{} changed state to {}\n",
            self.line_name(change.line),
            self.state_name(change.raw_state())
        )
    }
}
