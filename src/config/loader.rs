//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_CONSOLE";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_CONSOLE_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_CONSOLE_CONFIG` environment variable (explicit path)
    /// 2. `./config.toml` (current directory)
    /// 3. `config.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override any file values, and the result is
    /// validated before it is returned.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        if apply_env_overrides(&mut config).is_err() || config.validate().is_err() {
            config = Config::default();
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to file.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or(ConfigError::NoLocation("config file"))?;

        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    get_default_config_path().filter(|path| path.exists())
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
    Ok(toml::from_str(&content)?)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::write(path, e))?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write(path, e))
}

fn env_var(key: &str) -> Option<(String, String)> {
    let name = format!("{}_{}", ENV_PREFIX, key);
    std::env::var(&name).ok().map(|val| (name, val))
}

fn parse_env<T: FromStr>(name: &str, val: &str, message: &str) -> ConfigResult<T> {
    val.trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(name, message))
}

fn parse_bool(name: &str, val: &str) -> ConfigResult<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse(name, "Expected true or false")),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_CONSOLE_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL_CONSOLE_SERIAL_DEFAULT_BAUD=9600`
/// - `SERIAL_CONSOLE_RENDER_HEX_ROW_WIDTH=16`
/// - `SERIAL_CONSOLE_LOGGING_LEVEL=debug`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Serial overrides
    if let Some((name, val)) = env_var("SERIAL_DEFAULT_BAUD") {
        config.serial.default_baud = parse_env(&name, &val, "Invalid baud rate")?;
    }
    if let Some((name, val)) = env_var("SERIAL_DATA_BITS") {
        config.serial.data_bits = parse_env(&name, &val, "Invalid data bits")?;
    }
    if let Some((name, val)) = env_var("SERIAL_STOP_BITS") {
        config.serial.stop_bits = parse_env(&name, &val, "Invalid stop bits")?;
    }
    if let Some((_, val)) = env_var("SERIAL_ENCODING") {
        config.serial.encoding = val;
    }
    if let Some((name, val)) = env_var("SERIAL_DISCOVERY_INTERVAL_MS") {
        config.serial.discovery_interval_ms = parse_env(&name, &val, "Invalid interval")?;
    }

    // Render overrides
    if let Some((name, val)) = env_var("RENDER_HEX_ROW_WIDTH") {
        config.render.hex_row_width = parse_env(&name, &val, "Invalid row width")?;
    }
    if let Some((name, val)) = env_var("RENDER_SCROLLBACK_LINES") {
        config.render.scrollback_lines = parse_env(&name, &val, "Invalid line count")?;
    }
    if let Some((name, val)) = env_var("RENDER_MAX_LINE_CHARS") {
        config.render.max_line_chars = parse_env(&name, &val, "Invalid line length")?;
    }
    if let Some((name, val)) = env_var("RENDER_SHOW_NON_PRINTABLE") {
        config.render.show_non_printable = parse_bool(&name, &val)?;
    }

    // Session overrides
    if let Some((name, val)) = env_var("SESSION_READ_CHUNK_SIZE") {
        config.session.read_chunk_size = parse_env(&name, &val, "Invalid chunk size")?;
    }
    if let Some((name, val)) = env_var("SESSION_MAX_CONSECUTIVE_READ_ERRORS") {
        config.session.max_consecutive_read_errors =
            parse_env(&name, &val, "Invalid error count")?;
    }

    // TUI overrides
    if let Some((_, val)) = env_var("TUI_THEME") {
        config.tui.theme = val;
    }
    if let Some((name, val)) = env_var("TUI_REFRESH_RATE_HZ") {
        config.tui.refresh_rate_hz = parse_env(&name, &val, "Invalid refresh rate")?;
    }

    // Logging overrides
    if let Some((_, val)) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }
    if let Some((name, val)) = env_var("LOGGING_FORMAT") {
        config.logging.format = match val.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => {
                return Err(ConfigError::env_parse(
                    name,
                    "Expected json, pretty or compact",
                ))
            }
        };
    }
    if let Some((_, val)) = env_var("LOGGING_FILE") {
        config.logging.file = Some(PathBuf::from(val));
    }

    Ok(())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "serial-console").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}
