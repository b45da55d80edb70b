//! Port-specific error types.
//!
//! Kept separate from session and application errors so the byte channel layer
//! can be swapped (real hardware, mock) without touching the engine.

use std::io::ErrorKind;
use thiserror::Error;

/// Errors that can occur while opening or using a serial channel.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// The platform refused access to the device.
    #[error("Access to {0} was denied")]
    PermissionDenied(String),

    /// The device is held open by another process.
    #[error("Serial port is busy: {0}")]
    Busy(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether a read failure means the device is gone.
    ///
    /// Everything else (timeouts, interrupted reads, framing/parity/overrun
    /// faults surfaced as generic I/O errors) is treated as transient by the
    /// read pump.
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                ErrorKind::BrokenPipe
                    | ErrorKind::NotConnected
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::UnexpectedEof
            ),
            Self::NotFound(_) => true,
            _ => false,
        }
    }

    /// Whether this failure is a platform-level access restriction.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::PermissionDenied(_) => true,
            Self::Io(e) => e.kind() == ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}
