//! Digital input lines
//!
//! The [`LineReader`] trait is the only way the rest of the crate touches
//! hardware. Backends:
//! - [`SysfsLines`] - Linux sysfs GPIO interface
//! - [`RppalLines`] - Raspberry Pi GPIO (feature `hardware-gpio`)
//! - [`ScriptedLines`] - in-memory lines for tests and simulations

pub mod scripted;
pub mod sysfs;

#[cfg(feature = "hardware-gpio")]
pub mod rpi;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::LineError;

pub use scripted::{Sample, ScriptedLines};
pub use sysfs::SysfsLines;

#[cfg(feature = "hardware-gpio")]
pub use rpi::RppalLines;

/// Line identifier (GPIO number, 0-255)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(pub u8);

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for LineId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

/// Access to digital input lines
///
/// Implementations use interior mutability; all methods take `&self` so a
/// reader can be shared as `Arc<dyn LineReader>`.
pub trait LineReader: Send + Sync {
    /// Backend name for logs (e.g. "sysfs", "rppal")
    fn name(&self) -> &str;

    /// Put the line into input mode
    fn configure_as_input(&self, line: LineId) -> Result<(), LineError>;

    /// Enable the internal pull-up resistor, where the backend supports it
    fn enable_pull_up(&self, line: LineId) -> Result<(), LineError>;

    /// Read the current level (`true` = high)
    fn read(&self, line: LineId) -> Result<bool, LineError>;
}

/// Line-access backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Linux sysfs GPIO (`/sys/class/gpio`)
    #[default]
    Sysfs,
    /// Raspberry Pi GPIO through rppal
    Rppal,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Sysfs => "sysfs",
            Backend::Rppal => "rppal",
        }
    }
}

/// Open the selected backend
pub fn open(backend: Backend, gpio_root: &Path) -> anyhow::Result<Arc<dyn LineReader>> {
    match backend {
        Backend::Sysfs => Ok(Arc::new(SysfsLines::new(gpio_root))),
        #[cfg(feature = "hardware-gpio")]
        Backend::Rppal => Ok(Arc::new(RppalLines::new()?)),
        #[cfg(not(feature = "hardware-gpio"))]
        Backend::Rppal => Err(crate::error::ConfigError::UnsupportedBackend(backend.as_str()).into()),
    }
}
