//! linewatch - watch digital input lines and broadcast their state changes
//!
//! A [`sampler::Sampler`] polls the configured lines and turns transitions into
//! [`sampler::StateChange`] events. The [`broadcast::Broadcaster`] formats each
//! event as `"<name> changed state to <state>\n"` and writes it to every sink
//! in the [`registry`]. Sinks are TCP connections registered by the
//! [`acceptor::Acceptor`] and, optionally, the log. [`app::Monitor`] ties the
//! pieces together.

pub mod acceptor;
pub mod app;
pub mod broadcast;
pub mod cli;
pub mod config;
pub mod error;
pub mod lines;
pub mod names;
pub mod registry;
pub mod sampler;
pub mod sinks;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{Monitor, MonitorStats};
pub use config::{AppConfig, Settings};
pub use error::{ConfigError, LineError, RegistryError};
pub use lines::{LineId, LineReader};
pub use names::NameTables;
pub use sampler::StateChange;
