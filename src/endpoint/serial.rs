//! Serial line endpoint
//!
//! Configured by device path and baud rate. Opening is immediate; reads use a
//! short timeout so callers polling the port never stall. An open port whose
//! device has gone away (unplugged adapter) stops counting as connected.

use super::{reconfigure, Endpoint, TransportKind};
use crate::constants::{DEFAULT_BAUD_RATE, SERIAL_TIMEOUT_MS};
use crate::error::{AgentError, Result};
use serialport::SerialPort;
use std::time::Duration;
use tracing::debug;

/// Serial endpoint; a device path and a non-zero baud rate are required
pub struct SerialEndpoint {
    device_path: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl Default for SerialEndpoint {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            port: None,
        }
    }
}

impl SerialEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn set_device_path(&mut self, path: impl Into<String>) {
        let path = path.into();
        reconfigure(self, |ep| {
            let changed = ep.device_path != path;
            ep.device_path = path;
            changed
        });
    }

    pub fn set_baud_rate(&mut self, baud_rate: u32) {
        reconfigure(self, |ep| {
            let changed = ep.baud_rate != baud_rate;
            ep.baud_rate = baud_rate;
            changed
        });
    }

    pub fn handle_mut(&mut self) -> Option<&mut (dyn SerialPort + 'static)> {
        self.port.as_deref_mut()
    }

    fn open(path: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>> {
        serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(SERIAL_TIMEOUT_MS))
            .open()
            .map_err(|e| AgentError::SerialOpen {
                path: path.to_string(),
                source: std::io::Error::other(e.to_string()),
            })
    }
}

impl Endpoint for SerialEndpoint {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn is_configured(&self) -> bool {
        !self.device_path.is_empty() && self.baud_rate != 0
    }

    fn connected(&self) -> bool {
        self.port
            .as_ref()
            .map(|p| p.bytes_to_read().is_ok())
            .unwrap_or(false)
    }

    fn has_handle(&self) -> bool {
        self.port.is_some()
    }

    fn initialize(&mut self) -> Result<()> {
        if self.connected() {
            return Ok(());
        }
        if !self.is_configured() {
            return Err(AgentError::NotConfigured {
                endpoint: self.describe(),
            });
        }

        // Device that went away
        self.disconnect();

        let port = Self::open(&self.device_path, self.baud_rate)?;
        debug!("Opened {} @ {} baud", self.device_path, self.baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.port.take().is_some() {
            debug!("Closed serial device {}", self.device_path);
        }
    }

    fn describe(&self) -> String {
        format!("{} {}", self.kind(), self.device_path)
    }
}
