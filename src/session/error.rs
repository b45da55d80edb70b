//! Session error types.

use crate::port::PortError;
use crate::state::ConnectionState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// A connect was requested while a session exists or is changing state.
    #[error("Cannot connect while {0}")]
    Busy(ConnectionState),

    /// The port could not be opened.
    #[error("Failed to open port: {0}")]
    Open(#[source] PortError),

    /// The platform refused access to the device.
    #[error("Access to {0} was denied")]
    PermissionDenied(String),

    /// `try_write` found another write in flight.
    #[error("Channel busy: another write is in progress")]
    ChannelBusy,

    /// A write reached the engine without a connected session. The write
    /// path should have been disabled.
    #[error("Write attempted without a connected session")]
    WriteAfterClose,

    /// The session was torn down while the write was waiting or in flight.
    #[error("Session closed before the write completed")]
    Interrupted,

    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Errors a UI should surface directly to the user.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Open(_) | Self::PermissionDenied(_))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
