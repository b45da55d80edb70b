//! Serial Console Library
//!
//! An interactive serial session engine: one connection at a time, with the
//! incoming byte stream rendered twice in parallel, as severity-tagged text
//! lines and as a hex dump.
//!
//! # Modules
//!
//! - `port`: Byte channel abstraction over real serial ports and an in-memory mock
//! - `device`: Device handles, discovery and hot-plug watching
//! - `session`: Session controller, byte duplication and the read loops
//! - `render`: Text and binary renderers
//! - `state`: Connection state machine
//! - `decode`: Streaming text decoding
//! - `input`: Line endings and hex input parsing
//! - `allowlist`: Bluetooth service-class allow-list
//! - `store`: Persisted key-value settings
//! - `prompt`: Cancellable user prompts
//! - `config`: Configuration management with TOML support
//! - `logging`: Tracing subscriber setup
//! - `error`: Unified error handling for the binaries
//! - `tui`: Terminal UI application (when `tui` feature is enabled)

pub mod allowlist;
pub mod config;
pub mod decode;
pub mod device;
pub mod error;
pub mod input;
pub mod logging;
pub mod port;
pub mod prompt;
pub mod render;
pub mod session;
pub mod state;
pub mod store;

// TUI module
#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types for convenience
pub use decode::TextEncoding;
pub use device::{DeviceDescriptor, DeviceDiscovery, DeviceHandle, SystemDiscovery};
pub use error::{AppError, AppResult};
pub use input::LineEnding;
pub use port::{
    DataBits, FlowControl, MockPortOpener, Parity, PortConfiguration, PortError, PortOpener,
    StopBits, TokioSerialOpener,
};
pub use prompt::Outcome;
pub use session::{
    SessionController, SessionError, SessionEvent, SessionOptions, SessionSettings, View,
};
pub use state::{ConnectionState, Controls};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
