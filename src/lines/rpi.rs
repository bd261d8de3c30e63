//! Raspberry Pi GPIO backend (rppal)

use parking_lot::Mutex;
use rppal::gpio::{Gpio, InputPin, Level};
use std::collections::HashMap;
use tracing::debug;

use super::{LineId, LineReader};
use crate::error::LineError;

/// rppal-backed [`LineReader`]
///
/// Pins are claimed on `configure_as_input` and held for the process
/// lifetime. Dropping an `InputPin` releases the pin and restores its mode.
pub struct RppalLines {
    gpio: Gpio,
    pins: Mutex<HashMap<LineId, InputPin>>,
}

impl RppalLines {
    pub fn new() -> anyhow::Result<Self> {
        let gpio = Gpio::new()?;
        Ok(Self {
            gpio,
            pins: Mutex::new(HashMap::new()),
        })
    }

    fn backend_err(line: LineId) -> impl FnOnce(rppal::gpio::Error) -> LineError {
        move |e| LineError::Backend {
            line,
            message: e.to_string(),
        }
    }
}

impl LineReader for RppalLines {
    fn name(&self) -> &str {
        "rppal"
    }

    fn configure_as_input(&self, line: LineId) -> Result<(), LineError> {
        let pin = self
            .gpio
            .get(line.0)
            .map_err(Self::backend_err(line))?
            .into_input();
        self.pins.lock().insert(line, pin);
        debug!("GPIO {} configured as input", line);
        Ok(())
    }

    fn enable_pull_up(&self, line: LineId) -> Result<(), LineError> {
        let mut pins = self.pins.lock();
        // Release the plain input so the pin can be claimed again with bias
        if pins.remove(&line).is_none() {
            return Err(LineError::NotConfigured(line));
        }

        let pin = self
            .gpio
            .get(line.0)
            .map_err(Self::backend_err(line))?
            .into_input_pullup();
        pins.insert(line, pin);
        debug!("GPIO {} pull-up enabled", line);
        Ok(())
    }

    fn read(&self, line: LineId) -> Result<bool, LineError> {
        self.pins
            .lock()
            .get(&line)
            .map(|pin| pin.read() == Level::High)
            .ok_or(LineError::NotConfigured(line))
    }
}
