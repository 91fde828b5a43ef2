//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_BRIDGE";

/// Config file name
const CONFIG_FILE_NAME: &str = "serial-bridge.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_BRIDGE_CONFIG";

/// Application directory under the platform config dir
const APP_DIR: &str = "serial-socket-bridge";

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
    /// 1. `SERIAL_BRIDGE_CONFIG` environment variable (explicit path)
    /// 2. `./serial-bridge.toml` (current directory)
    /// 3. `~/.config/serial-socket-bridge/serial-bridge.toml` (XDG on Linux/macOS)
    /// 4. `%APPDATA%\serial-socket-bridge\serial-bridge.toml` (Windows)
    /// 5. Built-in defaults (no file required)
    ///
    /// Environment variables override file values; the result is validated.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
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
        // Malformed overrides are ignored here; `load` reports them.
        let _ = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(&self.config)?)
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Get the platform-specific config directory.
fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}

/// Get the default config file path.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Parse `SERIAL_BRIDGE_<suffix>` if it is set.
fn env_value<T: FromStr>(suffix: &str) -> ConfigResult<Option<T>> {
    let var = format!("{}_{}", ENV_PREFIX, suffix);
    match std::env::var(&var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::env_parse(var, format!("cannot parse '{}'", raw))),
        Err(_) => Ok(None),
    }
}

fn env_flag(suffix: &str) -> Option<bool> {
    std::env::var(format!("{}_{}", ENV_PREFIX, suffix))
        .ok()
        .map(|val| val.eq_ignore_ascii_case("true") || val == "1")
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_BRIDGE_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL_BRIDGE_TCP_PORT=2323`
/// - `SERIAL_BRIDGE_BUFFERS_FLUSH_TIMEOUT_MS=250`
/// - `SERIAL_BRIDGE_SERIAL_PORT=/dev/ttyUSB0`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Buffers
    if let Some(val) = env_value("BUFFERS_TX_CAPACITY")? {
        config.buffers.tx_capacity = val;
    }
    if let Some(val) = env_value("BUFFERS_RX_CAPACITY")? {
        config.buffers.rx_capacity = val;
    }
    if let Some(val) = env_value("BUFFERS_FLUSH_TIMEOUT_MS")? {
        config.buffers.flush_timeout_ms = val;
    }

    // TCP pool
    if let Some(val) = env_flag("TCP_ENABLED") {
        config.tcp.enabled = val;
    }
    if let Some(val) = env_value("TCP_HOST")? {
        config.tcp.host = val;
    }
    if let Some(val) = env_value("TCP_PORT")? {
        config.tcp.port = val;
    }
    if let Some(val) = env_value("TCP_MAX_CLIENTS")? {
        config.tcp.max_clients = val;
    }

    // WebSocket
    if let Some(val) = env_flag("WEBSOCKET_ENABLED") {
        config.websocket.enabled = val;
    }
    if let Some(val) = env_value("WEBSOCKET_PORT")? {
        config.websocket.port = val;
    }

    // Serial
    if let Some(val) = env_value::<String>("SERIAL_PORT")? {
        config.serial.port = Some(val);
    }
    if let Some(val) = env_value("SERIAL_BAUD_RATE")? {
        config.serial.baud_rate = val;
    }

    // Logging
    if let Some(val) = env_value("LOGGING_LEVEL")? {
        config.logging.level = val;
    }

    Ok(())
}
