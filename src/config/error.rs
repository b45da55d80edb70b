//! Errors raised while loading, validating and saving configuration and
//! the persisted settings store.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which side of a file operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Read,
    Write,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly named config file does not exist.
    #[error("no configuration file at {}", .0.display())]
    NotFound(PathBuf),

    /// Reading or writing a config or settings file failed.
    #[error("cannot {action} {}: {source}", .path.display())]
    Io {
        action: FileAction,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot encode configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value was rejected. `section` is the TOML table (`serial`,
    /// `render`, `session`, `tui`, `logging`) and `field` the key inside it.
    #[error("invalid [{section}] {field}: {message}")]
    Invalid {
        section: String,
        field: String,
        message: String,
    },

    /// A `SERIAL_CONSOLE_*` override could not be parsed.
    #[error("{var} is not usable: {message}")]
    Env { var: String, message: String },

    /// No path was given and the platform has no config directory.
    #[error("no location for the {0}")]
    NoLocation(&'static str),
}

impl ConfigError {
    /// Reject the value at a dotted `section.field` key.
    pub fn validation(key: &str, message: impl Into<String>) -> Self {
        let (section, field) = key.split_once('.').unwrap_or(("config", key));
        Self::Invalid {
            section: section.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn env_parse(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Env {
            var: var.into(),
            message: message.into(),
        }
    }

    pub fn read(path: &Path, source: io::Error) -> Self {
        Self::Io {
            action: FileAction::Read,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn write(path: &Path, source: io::Error) -> Self {
        Self::Io {
            action: FileAction::Write,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Dotted key of a rejected value, as written in the config file.
    pub fn key(&self) -> Option<String> {
        match self {
            Self::Invalid { section, field, .. } => Some(format!("{section}.{field}")),
            _ => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
