//! Configuration module.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_BRIDGE_CONFIG` environment variable (explicit path)
//! 2. `./serial-bridge.toml` (current directory)
//! 3. `~/.config/serial-socket-bridge/serial-bridge.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\serial-socket-bridge\serial-bridge.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `SERIAL_BRIDGE_<SECTION>_<KEY>`, e.g.
//! `SERIAL_BRIDGE_TCP_PORT=2323` or `SERIAL_BRIDGE_SERIAL_PORT=/dev/ttyUSB0`.
//!
//! # Example
//!
//! ```toml
//! [buffers]
//! tx_capacity = 1200
//! rx_capacity = 256
//! flush_timeout_ms = 500
//!
//! [tcp]
//! port = 8880
//! max_clients = 4
//!
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{
    BufferConfig, Config, LogFormat, LoggingConfig, SerialConfig, TcpConfig, WebSocketConfig,
};
