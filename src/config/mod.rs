//! Configuration module for serial-console.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_CONSOLE_CONFIG` environment variable (explicit path)
//! 2. `./config.toml` (current directory)
//! 3. `config.toml` in the platform config directory
//!    (`~/.config/serial-console/` on Linux)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Most values can be overridden via environment variables.
//! The pattern is: `SERIAL_CONSOLE_<SECTION>_<KEY>`
//!
//! Examples:
//! - `SERIAL_CONSOLE_SERIAL_DEFAULT_BAUD=9600`
//! - `SERIAL_CONSOLE_RENDER_HEX_ROW_WIDTH=16`
//! - `SERIAL_CONSOLE_LOGGING_FORMAT=json`
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_console::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//!
//! println!("Default baud: {}", config.serial.default_baud);
//! println!("Hex row width: {}", config.render.hex_row_width);
//! # Ok::<(), serial_console::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult, FileAction};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{
    Config, LogFormat, LoggingConfig, RenderConfig, SerialConfig, SessionConfig, TuiConfig,
};
