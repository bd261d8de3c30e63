//! Error types shared across the crate
//!
//! Library code returns these typed errors; the binary wraps them with
//! `anyhow` context at the application boundary.

use std::io;
use thiserror::Error;

use crate::lines::LineId;

/// Startup configuration errors. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("argument '{0}' not delimited by ':'")]
    MissingDelimiter(String),

    #[error("'{value}' in argument '{arg}' is not a number")]
    InvalidNumber { arg: String, value: String },

    #[error("value {0} outside supported range 0-255")]
    OutOfRange(i64),

    #[error("no lines configured (use -n ID:NAME or the 'lines' config key)")]
    NoLines,

    #[error("listen port {0} outside 1-65535")]
    InvalidPort(i64),

    #[error("poll interval must be greater than zero")]
    ZeroInterval,

    #[error("event channel capacity must be at least 1")]
    ZeroCapacity,

    #[error("backend '{0}' is not available in this build (enable the 'hardware-gpio' feature)")]
    UnsupportedBackend(&'static str),
}

/// Errors from the line-access capability.
///
/// Reads that fail in steady state are logged and treated as "no change";
/// failures while configuring lines at startup are fatal.
#[derive(Debug, Error)]
pub enum LineError {
    #[error("line {line}: {source}")]
    Io {
        line: LineId,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: unexpected value {value:?}")]
    Malformed { line: LineId, value: String },

    #[error("line {0} is not configured as an input")]
    NotConfigured(LineId),

    #[error("line {line}: {message}")]
    Backend { line: LineId, message: String },
}

/// The registry actor has stopped and no longer accepts commands.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("subscriber registry is no longer running")]
    Closed,
}
