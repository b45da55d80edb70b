//! Async serial port backend using tokio-serial.
//!
//! Opens real devices as Tokio `SerialStream`s and splits them into the
//! read/write halves the session engine expects.

use super::error::PortError;
use super::traits::{PortConfiguration, PortOpener, SerialChannel};
use crate::device::DeviceHandle;
use async_trait::async_trait;
use tracing::debug;

/// Opens devices through tokio-serial.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSerialOpener;

impl TokioSerialOpener {
    pub fn new() -> Self {
        Self
    }

    /// Open a serial port for async I/O.
    ///
    /// # Example
    /// ```no_run
    /// use serial_console::port::{PortConfiguration, TokioSerialOpener};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let stream = TokioSerialOpener::open_stream("/dev/ttyUSB0", &PortConfiguration::default())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open_stream(
        port_name: &str,
        config: &PortConfiguration,
    ) -> Result<tokio_serial::SerialStream, PortError> {
        let builder = tokio_serial::new(port_name, config.effective_baud_rate())
            .data_bits(config.data_bits.into())
            .flow_control(config.flow_control.into())
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into());

        tokio_serial::SerialStream::open(&builder).map_err(|e| map_open_error(port_name, e))
    }
}

#[async_trait]
impl PortOpener for TokioSerialOpener {
    async fn open(
        &self,
        device: &DeviceHandle,
        config: &PortConfiguration,
    ) -> Result<SerialChannel, PortError> {
        debug!(port = %device.path(), settings = %config, "opening serial port");
        let stream = Self::open_stream(device.path(), config)?;
        Ok(SerialChannel::from_stream(stream))
    }
}

fn map_open_error(port_name: &str, e: tokio_serial::Error) -> PortError {
    match e.kind {
        tokio_serial::ErrorKind::NoDevice => PortError::not_found(port_name),
        tokio_serial::ErrorKind::InvalidInput => PortError::config(e.to_string()),
        tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            PortError::PermissionDenied(port_name.to_string())
        }
        _ if e.description.to_lowercase().contains("busy") => {
            PortError::Busy(port_name.to_string())
        }
        _ => PortError::Serial(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_mapping() {
        let e = tokio_serial::Error::new(tokio_serial::ErrorKind::NoDevice, "gone");
        assert!(matches!(map_open_error("COM9", e), PortError::NotFound(p) if p == "COM9"));

        let e = tokio_serial::Error::new(
            tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "EACCES",
        );
        assert!(map_open_error("/dev/ttyS0", e).is_permission_denied());

        let e = tokio_serial::Error::new(
            tokio_serial::ErrorKind::Io(std::io::ErrorKind::Other),
            "Device or resource busy",
        );
        assert!(matches!(map_open_error("/dev/ttyS0", e), PortError::Busy(_)));
    }

    #[tokio::test]
    async fn test_tokio_port_not_found_error() {
        let device = DeviceHandle::unknown("/dev/nonexistent_async_port_12345");
        let result = TokioSerialOpener::new()
            .open(&device, &PortConfiguration::default())
            .await;

        match result {
            Err(PortError::NotFound(name)) => assert!(name.contains("nonexistent")),
            Err(other) => {
                // Some platforms report a missing node as a plain I/O error.
                assert!(!other.to_string().is_empty());
            }
            Ok(_) => panic!("opening a nonexistent port must fail"),
        }
    }
}
