//! Serial transport for the stage controller.
//!
//! Wraps the `serialport` crate. The port is opened 8N1 without flow control,
//! with the configured read timeout applied to every `read_line`. A timed-out
//! read keeps any partial bytes buffered so the next attempt completes the line.

use super::Transport;
use crate::error::{AppResult, PositionerError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(feature = "instrument_serial")]
use serialport::SerialPort;
#[cfg(feature = "instrument_serial")]
use std::io::{BufRead, BufReader, Write};
#[cfg(feature = "instrument_serial")]
use tracing::debug;

/// Connection parameters for the controller's serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Port identifier (e.g., "/dev/ttyACM0", "COM10"). Required to connect.
    #[serde(default)]
    pub port: Option<String>,
    /// Baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Timeout for a single line read.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_timeout() -> Duration {
    Duration::from_secs(1)
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            timeout: default_timeout(),
        }
    }
}

/// Serial transport (RS-232 over USB to the stage microcontroller).
pub struct SerialTransport {
    /// Port name (e.g., "/dev/ttyACM0", "COM10")
    port_name: String,

    /// Baud rate (e.g., 9600, 115200)
    baud_rate: u32,

    /// Per-read timeout
    #[cfg(feature = "instrument_serial")]
    timeout: Duration,

    /// Bytes of an incomplete line carried across timed-out reads
    #[cfg(feature = "instrument_serial")]
    pending: Vec<u8>,

    #[cfg(feature = "instrument_serial")]
    port: Option<BufReader<Box<dyn SerialPort>>>,
}

impl SerialTransport {
    /// Create an unopened transport.
    ///
    /// # Errors
    /// Returns [`PositionerError::Configuration`] when `settings.port` is unset.
    pub fn new(settings: &SerialSettings) -> AppResult<Self> {
        let port_name = settings
            .port
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                PositionerError::Configuration(
                    "No port specified. Use list_ports() to find available ports.".to_string(),
                )
            })?;

        Ok(Self {
            port_name,
            baud_rate: settings.baud_rate,
            #[cfg(feature = "instrument_serial")]
            timeout: settings.timeout,
            #[cfg(feature = "instrument_serial")]
            pending: Vec::new(),
            #[cfg(feature = "instrument_serial")]
            port: None,
        })
    }

    /// Port identifier this transport talks to.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Configured baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

#[cfg(feature = "instrument_serial")]
impl Transport for SerialTransport {
    fn open(&mut self) -> AppResult<()> {
        if self.port.is_some() {
            return Ok(());
        }

        let port = serialport::new(&self.port_name, self.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(self.timeout)
            .open()?;

        self.pending.clear();
        self.port = Some(BufReader::new(port));
        debug!(
            "Serial port '{}' opened at {} baud",
            self.port_name, self.baud_rate
        );
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write_command(&mut self, command: &str) -> AppResult<()> {
        let port = self.port.as_mut().ok_or(PositionerError::NotConnected)?;
        let writer = port.get_mut();
        writer.write_all(command.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> AppResult<String> {
        let port = self.port.as_mut().ok_or(PositionerError::NotConnected)?;

        match port.read_until(b'\n', &mut self.pending) {
            Ok(0) if self.pending.is_empty() => Ok(String::new()),
            Ok(_) => {
                let line = String::from_utf8_lossy(&self.pending).trim().to_string();
                self.pending.clear();
                Ok(line)
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) -> AppResult<()> {
        if self.port.take().is_some() {
            self.pending.clear();
            debug!("Serial port '{}' closed", self.port_name);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.port_name, self.baud_rate)
    }
}

#[cfg(not(feature = "instrument_serial"))]
impl Transport for SerialTransport {
    fn open(&mut self) -> AppResult<()> {
        Err(PositionerError::FeatureNotEnabled(
            "instrument_serial".to_string(),
        ))
    }

    fn is_open(&self) -> bool {
        false
    }

    fn write_command(&mut self, _command: &str) -> AppResult<()> {
        Err(PositionerError::NotConnected)
    }

    fn read_line(&mut self) -> AppResult<String> {
        Err(PositionerError::NotConnected)
    }

    fn close(&mut self) -> AppResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.port_name, self.baud_rate)
    }
}
