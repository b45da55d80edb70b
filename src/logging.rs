//! Logging configuration using tracing.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from
//! `logging.level`. Output goes to `logging.file` when configured.

use crate::config::{LogFormat, LoggingConfig};
use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::EnvFilter;

/// Where log lines may go when no file is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Fall back to stderr.
    Stderr,
    /// Log only to a file; without one, logging stays off. Used while the
    /// terminal is owned by the TUI.
    FileOnly,
}

/// Initialize the global subscriber.
///
/// Returns `Ok(false)` when nothing was installed.
pub fn init(config: &LoggingConfig, target: LogTarget) -> io::Result<bool> {
    let writer = match (&config.file, target) {
        (Some(path), _) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Arc::new(file))
        }
        (None, LogTarget::Stderr) => BoxMakeWriter::new(io::stderr),
        (None, LogTarget::FileOnly) => return Ok(false),
    };
    let ansi = config.file.is_none();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let timer = fmt::time::ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_timer(timer);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    result.map_err(io::Error::other)?;

    tracing::debug!(
        level = %config.level,
        format = ?config.format,
        file = ?config.file,
        "logging initialized"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_only_without_file_installs_nothing() {
        let config = LoggingConfig::default();
        assert!(!init(&config, LogTarget::FileOnly).unwrap());
    }

    // The global subscriber can be installed once per process, so this is
    // the only test that installs one.
    #[test]
    fn test_file_logging_creates_directories_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("serial-console.log");
        let config = LoggingConfig {
            level: "debug".into(),
            format: LogFormat::Compact,
            file: Some(path.clone()),
        };

        assert!(init(&config, LogTarget::FileOnly).unwrap());
        tracing::info!(port = "/dev/ttyUSB0", "file logging works");

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("file logging works"));
        assert!(written.contains("/dev/ttyUSB0"));

        let err = init(&config, LogTarget::Stderr).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
