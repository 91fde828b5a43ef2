//! Configuration schema definitions.
//!
//! Every section is `#[serde(default)]`, so a config file only needs the keys
//! it wants to change.

use super::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TX/RX buffer sizes and flush timing
    pub buffers: BufferConfig,
    /// TCP client pool
    pub tcp: TcpConfig,
    /// WebSocket broadcast server
    pub websocket: WebSocketConfig,
    /// Serial device
    pub serial: SerialConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values the bridge cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.buffers.tx_capacity == 0 {
            return Err(ConfigError::validation(
                "buffers.tx_capacity",
                "must be greater than zero",
            ));
        }
        // One byte of RX headroom is always kept free by the TCP pool.
        if self.buffers.rx_capacity < 2 {
            return Err(ConfigError::validation(
                "buffers.rx_capacity",
                "must be at least 2",
            ));
        }
        if self.tcp.max_clients == 0 {
            return Err(ConfigError::validation(
                "tcp.max_clients",
                "must be greater than zero",
            ));
        }
        if self.tcp.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "tcp.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if !self.websocket.path.starts_with('/') {
            return Err(ConfigError::validation(
                "websocket.path",
                "must start with '/'",
            ));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::validation(
                "serial.baud_rate",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Buffer sizes and the TX flush timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Outbound (serial → network) capacity in bytes
    pub tx_capacity: usize,
    /// Inbound (network → serial) capacity in bytes
    pub rx_capacity: usize,
    /// Longest a partial TX accumulation may wait, in milliseconds
    pub flush_timeout_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            tx_capacity: 1200,
            rx_capacity: 256,
            flush_timeout_ms: 500,
        }
    }
}

impl BufferConfig {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

/// TCP client pool section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub enabled: bool,
    /// Host address to bind to
    pub host: String,
    pub port: u16,
    /// Number of client slots
    pub max_clients: usize,
    /// Delay between polling cycles
    pub poll_interval_ms: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8880,
            max_clients: 4,
            poll_interval_ms: 10,
        }
    }
}

impl TcpConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// WebSocket server section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Route the upgrade is served on
    pub path: String,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8282,
            path: "/ws".to_string(),
        }
    }
}

impl WebSocketConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Serial device section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path; when unset the bridge runs network-only
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115200,
            timeout_ms: 10,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}
