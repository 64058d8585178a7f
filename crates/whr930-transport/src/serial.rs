use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::SerialLink;

/// Default device path of the USB-serial adapter.
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";

/// The unit talks 9600 baud, 8N1.
pub const BAUD_RATE: u32 = 9600;

/// Serial port settings.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub path: PathBuf,
    /// Baud rate. Default: 9600.
    pub baud_rate: u32,
    /// Timeout for individual blocking reads and writes.
    pub io_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DEVICE),
            baud_rate: BAUD_RATE,
            io_timeout: Duration::from_millis(500),
        }
    }
}

impl SerialConfig {
    /// Settings for a given device path with the unit's defaults.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

/// A real serial port opened with the unit's fixed line settings.
pub struct SerialDevice {
    port: Box<dyn SerialPort>,
    path: PathBuf,
}

impl SerialDevice {
    /// Open the port at 8 data bits, no parity, 1 stop bit, no flow control.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let path_str = config.path.to_string_lossy();
        let port = serialport::new(path_str.as_ref(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.io_timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: config.path.clone(),
                source,
            })?;

        info!(path = ?config.path, baud = config.baud_rate, "opened serial device");

        Ok(Self {
            port,
            path: config.path.clone(),
        })
    }

    /// The device path this port was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for SerialDevice {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialDevice {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl SerialLink for SerialDevice {
    fn bytes_available(&mut self) -> std::io::Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn close(&mut self) -> std::io::Result<()> {
        debug!(path = ?self.path, "flushing serial device before close");
        self.port.flush()
    }
}

impl std::fmt::Debug for SerialDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialDevice")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_unit() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.path, PathBuf::from("/dev/ttyUSB0"));
    }

    #[test]
    fn open_missing_device_reports_path() {
        let config = SerialConfig::for_path("/dev/whr930-test-does-not-exist");
        let err = SerialDevice::open(&config).unwrap_err();
        match err {
            TransportError::Open { path, .. } => {
                assert_eq!(path, PathBuf::from("/dev/whr930-test-does-not-exist"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
