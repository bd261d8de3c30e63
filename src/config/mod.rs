//! Configuration management for linewatch
//!
//! Handles loading the optional YAML file, merging command-line flags over it
//! and resolving the result into validated runtime [`Settings`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::broadcast::DEFAULT_WRITE_TIMEOUT_MS;
use crate::cli::Args;
use crate::error::ConfigError;
use crate::lines::sysfs::DEFAULT_GPIO_ROOT;
use crate::lines::{Backend, LineId};
use crate::names::NameTables;
use crate::sampler::{SamplerConfig, DEFAULT_POLL_INTERVAL_MS};

/// Default capacity of the sampler-to-broadcaster channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// Root configuration structure, as read from YAML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Line id -> display name; the keys are the monitored lines
    #[serde(default)]
    pub lines: BTreeMap<i64, String>,
    /// State value -> display name, merged over 0=off, 1=on
    #[serde(default)]
    pub states: BTreeMap<i64, String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<i64>,
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_changes: Option<bool>,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_write_timeout_ms() -> u64 {
    DEFAULT_WRITE_TIMEOUT_MS
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_gpio_root() -> PathBuf {
    PathBuf::from(DEFAULT_GPIO_ROOT)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            lines: BTreeMap::new(),
            states: BTreeMap::new(),
            poll_interval_ms: default_poll_interval_ms(),
            listen_port: None,
            bind: default_bind(),
            write_timeout_ms: default_write_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            send_timeout_ms: None,
            log_changes: None,
            backend: Backend::default(),
            gpio_root: default_gpio_root(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        Ok(config)
    }

    /// Merge command-line flags over the file values
    pub fn apply_args(&mut self, args: &Args) {
        for (id, name) in &args.names {
            self.lines.insert(i64::from(id.0), name.clone());
        }
        for (value, name) in &args.states {
            self.states.insert(i64::from(*value), name.clone());
        }
        if let Some(port) = args.listen {
            self.listen_port = Some(port);
        }
        if let Some(bind) = args.bind {
            self.bind = bind;
        }
        if let Some(ms) = args.interval_ms {
            self.poll_interval_ms = ms;
        }
        if let Some(backend) = args.backend {
            self.backend = backend;
        }
        if let Some(root) = &args.gpio_root {
            self.gpio_root = root.clone();
        }
        if let Some(ms) = args.write_timeout_ms {
            self.write_timeout_ms = ms;
        }
        if let Some(ms) = args.send_timeout_ms {
            self.send_timeout_ms = Some(ms);
        }
        if let Some(capacity) = args.channel_capacity {
            self.channel_capacity = capacity;
        }
        if args.log_changes {
            self.log_changes = Some(true);
        }
    }

    /// Validate and resolve into runtime settings
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let mut names = NameTables::new();
        for (&id, name) in &self.lines {
            names.set_line(LineId(to_u8(id)?), name.clone());
        }
        for (&value, name) in &self.states {
            names.set_state(to_u8(value)?, name.clone());
        }
        if names.line_ids().is_empty() {
            return Err(ConfigError::NoLines);
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        let listen = match self.listen_port {
            None => None,
            Some(port) if port <= 0 => None,
            Some(port) => {
                let port = u16::try_from(port).map_err(|_| ConfigError::InvalidPort(port))?;
                Some(SocketAddr::new(self.bind, port))
            }
        };

        Ok(Settings {
            names,
            sampler: SamplerConfig {
                interval: Duration::from_millis(self.poll_interval_ms),
                send_timeout: self.send_timeout_ms.map(Duration::from_millis),
            },
            listen,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            channel_capacity: self.channel_capacity,
            log_changes: self.log_changes.unwrap_or(listen.is_none()),
            backend: self.backend,
            gpio_root: self.gpio_root.clone(),
        })
    }
}

fn to_u8(value: i64) -> Result<u8, ConfigError> {
    u8::try_from(value).map_err(|_| ConfigError::OutOfRange(value))
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub names: NameTables,
    pub sampler: SamplerConfig,
    /// `None` disables the network sink
    pub listen: Option<SocketAddr>,
    pub write_timeout: Duration,
    pub channel_capacity: usize,
    pub log_changes: bool,
    pub backend: Backend,
    pub gpio_root: PathBuf,
}

impl Settings {
    /// Defaults around the given names: no listener, changes go to the log
    pub fn new(names: NameTables) -> Self {
        Self {
            names,
            sampler: SamplerConfig::default(),
            listen: None,
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            log_changes: true,
            backend: Backend::default(),
            gpio_root: default_gpio_root(),
        }
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Lines:")?;
        for (id, name) in self.names.lines() {
            writeln!(f, "  {:>3}  {}", id, name)?;
        }
        writeln!(f, "States:")?;
        for (value, name) in self.names.states() {
            writeln!(f, "  {:>3}  {}", value, name)?;
        }
        writeln!(f, "Poll interval: {} ms", self.sampler.interval.as_millis())?;
        match self.listen {
            Some(addr) => writeln!(f, "Network sink: {}", addr)?,
            None => writeln!(f, "Network sink: disabled")?,
        }
        writeln!(f, "Write timeout: {} ms", self.write_timeout.as_millis())?;
        match self.sampler.send_timeout {
            Some(timeout) => writeln!(
                f,
                "Event channel: capacity {}, drop after {} ms",
                self.channel_capacity,
                timeout.as_millis()
            )?,
            None => writeln!(f, "Event channel: capacity {}, block", self.channel_capacity)?,
        }
        writeln!(f, "Log sink: {}", if self.log_changes { "enabled" } else { "disabled" })?;
        write!(f, "Backend: {}", self.backend.as_str())?;
        if self.backend == Backend::Sysfs {
            write!(f, " ({})", self.gpio_root.display())?;
        }
        Ok(())
    }
}
