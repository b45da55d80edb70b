//! Port abstraction layer for serial communication.
//!
//! Provides the serial settings types, the `PortOpener` capability and its two
//! implementations: tokio-serial for real devices and an in-memory duplex for
//! tests.

pub mod async_port;
pub mod error;
pub mod mock;
pub mod traits;

pub use async_port::TokioSerialOpener;
pub use error::PortError;
pub use mock::{MockDevice, MockFailure, MockPortOpener};
pub use traits::*;
