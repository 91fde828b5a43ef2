//! Serial Socket Bridge Library
//!
//! Buffers traffic between one serial device and any number of network
//! clients. Serial output is accumulated in a TX ring and flushed to the
//! attached transports in line-sized batches; network input is queued in an
//! RX ring until the serial side reads it.
//!
//! # Modules
//!
//! - `buffer`: Fixed-capacity byte ring
//! - `flush`: When accumulated serial output is released
//! - `bridge`: The serial ↔ network facade
//! - `tcp`: Multi-client TCP pool and socket abstractions
//! - `websocket`: WebSocket transport (when `websocket` feature is enabled)
//! - `port`: Serial device access and the pump feeding the bridge
//! - `service`: Wiring and the polling loop
//! - `config`: Configuration management with TOML support
//! - `clock`: Millisecond time sources
//! - `error`: Setup errors

pub mod bridge;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod error;
pub mod flush;
pub mod port;
pub mod service;
pub mod tcp;

#[cfg(feature = "websocket")]
pub mod websocket;

// Re-export commonly used types for convenience
pub use bridge::{Bridge, BroadcastSink, SinkKind};
pub use buffer::RingBuffer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BridgeError, BridgeResult};
pub use flush::{FlushPolicy, FlushReason};
pub use port::{MockSerialPort, PortError, SerialPortAdapter, SerialPump, SyncSerialPort};
pub use service::BridgeService;
pub use tcp::{ClientPool, Connection, Listener, NetConnection, NetListener, SlotState};

#[cfg(feature = "websocket")]
pub use websocket::{WsBroadcaster, WsContext};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
