//! Moves bytes between a serial device and the [`Bridge`].
//!
//! One [`SerialPump::pump_once`] call reads whatever the device has produced
//! and hands it to [`Bridge::write`], then drains the bridge's RX side back
//! to the device. Reads are skipped when the backend reports an empty input
//! queue, so a tick never waits for the port's read timeout.
//!
//! Bytes taken from the RX side stay with the pump until the device has
//! accepted them. A short write or a write timeout leaves the remainder for
//! the next tick, and nothing more is taken from the bridge until it drains.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use crate::bridge::Bridge;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Largest chunk read from the device per tick.
const SERIAL_CHUNK: usize = 512;

/// What one pump tick moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Bytes read from the device.
    pub from_serial: usize,
    /// Of those, bytes the bridge accepted (0 when no sink is attached).
    pub queued: usize,
    /// Bytes written back to the device.
    pub to_serial: usize,
}

pub struct SerialPump {
    port: Box<dyn SerialPortAdapter>,
    bridge: Arc<Bridge>,
    scratch: Vec<u8>,
    /// RX bytes taken from the bridge but not yet accepted by the device.
    outbound: Vec<u8>,
}

impl SerialPump {
    /// Wrap `port`, discarding anything already queued on it.
    pub fn new(mut port: Box<dyn SerialPortAdapter>, bridge: Arc<Bridge>) -> Result<Self, PortError> {
        port.clear_buffers()?;
        info!(port = port.name(), "serial pump ready");
        Ok(Self {
            port,
            bridge,
            scratch: vec![0u8; SERIAL_CHUNK],
            outbound: Vec::new(),
        })
    }

    pub fn port_name(&self) -> &str {
        self.port.name()
    }

    /// Network bytes still waiting for the device to accept them.
    pub fn pending(&self) -> usize {
        self.outbound.len()
    }

    /// Run one read → bridge → write cycle.
    pub fn pump_once(&mut self) -> Result<PumpStats, PortError> {
        let mut stats = PumpStats::default();

        if self.port.bytes_to_read() != Some(0) {
            match self.port.read_bytes(&mut self.scratch) {
                Ok(n) => {
                    stats.from_serial = n;
                    stats.queued = self.bridge.write(&self.scratch[..n]);
                    if stats.queued < n {
                        trace!(len = n, "serial data dropped, no sink attached");
                    }
                }
                Err(e) if e.is_idle() => {}
                Err(e) => return Err(e),
            }
        }

        stats.to_serial = self.drain_outbound()?;
        Ok(stats)
    }

    fn drain_outbound(&mut self) -> Result<usize, PortError> {
        if self.outbound.is_empty() {
            let bridge = &self.bridge;
            self.outbound.extend(std::iter::from_fn(|| bridge.read()));
        }

        let mut written = 0;
        while !self.outbound.is_empty() {
            match self.port.write_bytes(&self.outbound) {
                Ok(0) => break,
                Ok(n) => {
                    let n = n.min(self.outbound.len());
                    self.outbound.drain(..n);
                    written += n;
                }
                Err(e) if e.is_idle() => break,
                Err(e) => return Err(e),
            }
        }

        if written > 0 {
            debug!(len = written, "network data written to serial");
        }
        if !self.outbound.is_empty() {
            trace!(pending = self.outbound.len(), "serial write incomplete, retrying next tick");
        }
        Ok(written)
    }
}

impl std::fmt::Debug for SerialPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPump")
            .field("port", &self.port)
            .field("pending", &self.outbound.len())
            .finish()
    }
}
