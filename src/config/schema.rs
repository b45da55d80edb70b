//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::decode::TextEncoding;
use crate::input::LineEnding;
use crate::port::{DataBits, FlowControl, Parity, PortConfiguration, StopBits};
use crate::render::{
    SeverityKeywords, SeverityPolicy, DEFAULT_MAX_LINE_CHARS, DEFAULT_ROW_WIDTH,
    DEFAULT_SCROLLBACK_LINES,
};
use crate::session::{SessionOptions, SessionSettings, TeeOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial port defaults
    pub serial: SerialConfig,
    /// Output rendering
    pub render: RenderConfig,
    /// Session engine tuning
    pub session: SessionConfig,
    /// TUI configuration
    pub tui: TuiConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check values that would make the engine misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.default_baud == 0 {
            return Err(ConfigError::validation("serial.default_baud", "must be > 0"));
        }
        TextEncoding::for_label(&self.serial.encoding).ok_or_else(|| {
            ConfigError::validation(
                "serial.encoding",
                format!("unknown encoding '{}'", self.serial.encoding),
            )
        })?;
        if self.serial.discovery_interval_ms == 0 {
            return Err(ConfigError::validation(
                "serial.discovery_interval_ms",
                "must be > 0",
            ));
        }
        if self.render.hex_row_width == 0 {
            return Err(ConfigError::validation("render.hex_row_width", "must be > 0"));
        }
        if self.render.scrollback_lines == 0 {
            return Err(ConfigError::validation("render.scrollback_lines", "must be > 0"));
        }
        if self.render.max_line_chars == 0 {
            return Err(ConfigError::validation("render.max_line_chars", "must be > 0"));
        }
        SeverityPolicy::new(&self.render.severity)
            .map_err(|e| ConfigError::validation("render.severity", e.to_string()))?;
        if self.session.read_chunk_size == 0 {
            return Err(ConfigError::validation("session.read_chunk_size", "must be > 0"));
        }
        if self.session.max_consecutive_read_errors == 0 {
            return Err(ConfigError::validation(
                "session.max_consecutive_read_errors",
                "must be > 0",
            ));
        }
        if self.tui.refresh_rate_hz == 0 {
            return Err(ConfigError::validation("tui.refresh_rate_hz", "must be > 0"));
        }
        if self.tui.history_size == 0 {
            return Err(ConfigError::validation("tui.history_size", "must be > 0"));
        }
        Ok(())
    }

    /// Pending settings for a new session.
    pub fn session_settings(&self) -> ConfigResult<SessionSettings> {
        Ok(SessionSettings {
            port: self.serial.port_configuration()?,
            encoding: self.serial.text_encoding()?,
        })
    }

    /// Engine options for the session controller.
    pub fn session_options(&self) -> ConfigResult<SessionOptions> {
        let severity = SeverityPolicy::new(&self.render.severity)
            .map_err(|e| ConfigError::validation("render.severity", e.to_string()))?;
        Ok(SessionOptions {
            tee: TeeOptions {
                chunk_size: self.session.read_chunk_size,
                max_consecutive_errors: self.session.max_consecutive_read_errors,
            },
            hex_row_width: self.render.hex_row_width,
            scrollback_lines: self.render.scrollback_lines,
            max_line_chars: self.render.max_line_chars,
            severity: Arc::new(severity),
        })
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Default baud rate for new connections
    pub default_baud: u32,
    /// Data bits (7 or 8)
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    pub parity: Parity,
    pub flow_control: FlowControl,
    /// Text encoding label, e.g. "utf-8" or "windows-1252"
    pub encoding: String,
    /// Device list polling interval in milliseconds
    pub discovery_interval_ms: u64,
    /// Port aliases for convenience
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            default_baud: 115200,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            flow_control: FlowControl::None,
            encoding: "utf-8".to_string(),
            discovery_interval_ms: 2000,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    /// Get the discovery interval as Duration
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn port_configuration(&self) -> ConfigResult<PortConfiguration> {
        let data_bits = DataBits::try_from(self.data_bits)
            .map_err(|e| ConfigError::validation("serial.data_bits", e.to_string()))?;
        let stop_bits = StopBits::try_from(self.stop_bits)
            .map_err(|e| ConfigError::validation("serial.stop_bits", e.to_string()))?;
        Ok(PortConfiguration {
            baud_rate: self.default_baud,
            data_bits,
            flow_control: self.flow_control,
            parity: self.parity,
            stop_bits,
        })
    }

    pub fn text_encoding(&self) -> ConfigResult<TextEncoding> {
        self.encoding
            .parse()
            .map_err(|e: crate::decode::UnknownEncoding| {
                ConfigError::validation("serial.encoding", e.to_string())
            })
    }
}

/// Output rendering section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Bytes per row in the hex view
    pub hex_row_width: usize,
    /// Finalized lines kept per view
    pub scrollback_lines: usize,
    /// Characters after which a line without a break is wrapped
    pub max_line_chars: usize,
    /// Show control characters as control pictures
    pub show_non_printable: bool,
    /// Severity keyword lists
    pub severity: SeverityKeywords,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            hex_row_width: DEFAULT_ROW_WIDTH,
            scrollback_lines: DEFAULT_SCROLLBACK_LINES,
            max_line_chars: DEFAULT_MAX_LINE_CHARS,
            show_non_printable: false,
            severity: SeverityKeywords::default(),
        }
    }
}

/// Session engine section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Largest single read from the device
    pub read_chunk_size: usize,
    /// Transient read errors in a row before the session ends
    pub max_consecutive_read_errors: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let tee = TeeOptions::default();
        Self {
            read_chunk_size: tee.chunk_size,
            max_consecutive_read_errors: tee.max_consecutive_errors,
        }
    }
}

/// TUI configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuiConfig {
    /// Theme name: "dark", "light", "solarized", "dracula", "nord"
    pub theme: String,
    /// Refresh rate in Hz
    pub refresh_rate_hz: u32,
    /// Show timestamps in terminal output
    pub show_timestamps: bool,
    /// Command history size
    pub history_size: usize,
    /// Line ending appended to sent text
    pub line_ending: LineEnding,
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            refresh_rate_hz: 30,
            show_timestamps: false,
            history_size: 100,
            line_ending: LineEnding::CrLf,
        }
    }
}

impl TuiConfig {
    /// Get refresh interval as Duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.refresh_rate_hz.max(1) as u64)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. "info" or
    /// "serial_console=debug"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
    /// Log file path (optional); stderr otherwise
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}
