use crate::config::ConfigError;
use crate::input::HexParseError;
use crate::port::PortError;
use crate::session::SessionError;
use crate::state::InvalidTransition;
use std::fmt;

/// Result type for the binaries and other top-level callers.
pub type AppResult<T> = Result<T, AppError>;

/// Unified application error type.
///
/// The library modules each return their own error; this type collects them
/// for the command-line front ends so `main` can use `?` throughout.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Port(PortError),
    Session(SessionError),
    State(InvalidTransition),
    InvalidInput(String),
    NoDevice(String),
    IoError(std::io::Error),
    SerdeError(serde_json::Error),
}

impl AppError {
    /// Exit code for the command-line binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 78,
            Self::InvalidInput(_) => 64,
            Self::NoDevice(_) => 69,
            Self::Session(SessionError::PermissionDenied(_)) => 77,
            _ => 1,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Port(e) => write!(f, "A serial port error occurred: {e}"),
            Self::Session(e) => write!(f, "{e}"),
            Self::State(e) => write!(f, "Invalid connection state change: {e}"),
            Self::InvalidInput(details) => write!(f, "The input is invalid: {details}"),
            Self::NoDevice(name) => write!(f, "No serial device named '{name}' was found."),
            Self::IoError(e) => write!(f, "An I/O error occurred: {e}"),
            Self::SerdeError(e) => write!(f, "A serialization/deserialization error occurred: {e}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Port(e) => Some(e),
            Self::Session(e) => Some(e),
            Self::State(e) => Some(e),
            Self::IoError(e) => Some(e),
            Self::SerdeError(e) => Some(e),
            Self::InvalidInput(_) | Self::NoDevice(_) => None,
        }
    }
}

// Implement `From` conversions to allow the `?` operator to work seamlessly.
impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<PortError> for AppError {
    fn from(err: PortError) -> Self {
        AppError::Port(err)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        AppError::State(err)
    }
}

impl From<HexParseError> for AppError {
    fn from(err: HexParseError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerdeError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConnectionState;

    #[test]
    fn test_conversions_and_codes() {
        let err: AppError = crate::input::parse_hex_bytes("zz").unwrap_err().into();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(err.exit_code(), 64);

        let err: AppError = SessionError::PermissionDenied("/dev/ttyS0".into()).into();
        assert_eq!(err.exit_code(), 77);

        let err: AppError = ConfigError::validation("render.hex_row_width", "must be > 0").into();
        assert_eq!(err.exit_code(), 78);
        assert!(err.to_string().contains("[render] hex_row_width"));
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;
        let err: AppError = InvalidTransition {
            from: ConnectionState::Disconnected,
            to: ConnectionState::Connected,
        }
        .into();
        assert!(err.source().is_some());
        assert!(AppError::NoDevice("COM9".into()).source().is_none());
    }
}
