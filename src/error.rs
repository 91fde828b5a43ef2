//! Setup-time errors for the service and binary.
//!
//! The data path itself never fails loudly: writes, pushes and reads report
//! their outcome as counts, booleans or `Option`s. What can fail is wiring the
//! bridge up, which is what [`BridgeError`] covers.

use crate::config::ConfigError;
use crate::port::PortError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serial port error: {0}")]
    Port(#[from] PortError),

    /// A listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }
}

/// Result type for service setup.
pub type BridgeResult<T> = Result<T, BridgeError>;
