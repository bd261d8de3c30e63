//! Linux sysfs GPIO backend
//!
//! Uses the classic `/sys/class/gpio` layout: writing the line number to
//! `export` creates `gpioN/`, whose `direction` and `value` files control and
//! report the line.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{LineId, LineReader};
use crate::error::LineError;

/// Default sysfs GPIO root
pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// sysfs-backed [`LineReader`]
#[derive(Debug, Clone)]
pub struct SysfsLines {
    root: PathBuf,
}

impl SysfsLines {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn line_dir(&self, line: LineId) -> PathBuf {
        self.root.join(format!("gpio{}", line.0))
    }

    fn io_err(line: LineId) -> impl FnOnce(std::io::Error) -> LineError {
        move |source| LineError::Io { line, source }
    }
}

impl LineReader for SysfsLines {
    fn name(&self) -> &str {
        "sysfs"
    }

    fn configure_as_input(&self, line: LineId) -> Result<(), LineError> {
        let dir = self.line_dir(line);
        if !dir.exists() {
            debug!("Exporting line {} via {}", line, self.root.display());
            fs::write(self.root.join("export"), line.0.to_string()).map_err(Self::io_err(line))?;
        }

        fs::write(dir.join("direction"), "in").map_err(Self::io_err(line))?;
        debug!("Line {} configured as input", line);
        Ok(())
    }

    fn enable_pull_up(&self, line: LineId) -> Result<(), LineError> {
        // sysfs has no bias control
        info!(
            "Line {}: sysfs cannot enable pull-up, relying on external or default bias",
            line
        );
        Ok(())
    }

    fn read(&self, line: LineId) -> Result<bool, LineError> {
        let raw = fs::read_to_string(self.line_dir(line).join("value")).map_err(Self::io_err(line))?;
        match raw.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(LineError::Malformed {
                line,
                value: other.to_string(),
            }),
        }
    }
}
