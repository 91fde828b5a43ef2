//! Serial ↔ network facade.
//!
//! The [`Bridge`] sits between a serial-side caller and whatever network
//! transports are attached to it:
//!
//! ```text
//! serial ──write()──> TX ring ──flush──> BroadcastSink (WebSocket, TCP pool)
//! serial <──read()─── RX ring <──push()── TCP pool / WebSocket clients
//! ```
//!
//! # Locking
//!
//! The TX ring, the RX ring and the sink registry each have their own lock.
//! A flush drains the TX ring under its lock and releases it before calling
//! any sink, so producers appending to TX are never stalled by a slow sink.
//!
//! Flushes themselves are serialized by a separate dispatch lock held from
//! the drain until the last sink returns. Payloads therefore reach every sink
//! in the order they left the TX ring, even when several threads flush at
//! once. The dispatch lock is reentrant, so a sink may call back into the
//! bridge (including `write`) from inside `broadcast`. The TX, RX and sink
//! registry locks are never held while calling out.

use crate::buffer::RingBuffer;
use crate::clock::{Clock, SystemClock};
use crate::config::BufferConfig;
use crate::flush::{FlushPolicy, FlushReason};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// A transport able to deliver one payload to all of its peers at once.
///
/// Delivery failures are the transport's business; the bridge never inspects
/// an outcome.
#[cfg_attr(test, mockall::automock)]
pub trait BroadcastSink: Send + Sync {
    fn broadcast(&self, data: &[u8]);
}

impl fmt::Debug for dyn BroadcastSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BroadcastSink")
    }
}

/// The two kinds of sink the bridge can hold at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    WebSocket,
    Tcp,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebSocket => write!(f, "websocket"),
            Self::Tcp => write!(f, "tcp"),
        }
    }
}

#[derive(Debug)]
struct TxState {
    buffer: RingBuffer,
    /// Set when the buffer goes from empty to non-empty and on every flush.
    last_flush_ms: u64,
}

/// Non-owning handles; a sink whose owner is gone counts as detached.
#[derive(Debug, Default)]
struct Sinks {
    websocket: Option<Weak<dyn BroadcastSink>>,
    tcp: Option<Weak<dyn BroadcastSink>>,
}

impl Sinks {
    fn slot(&mut self, kind: SinkKind) -> &mut Option<Weak<dyn BroadcastSink>> {
        match kind {
            SinkKind::WebSocket => &mut self.websocket,
            SinkKind::Tcp => &mut self.tcp,
        }
    }

    fn live(&self, kind: SinkKind) -> Option<Arc<dyn BroadcastSink>> {
        let handle = match kind {
            SinkKind::WebSocket => &self.websocket,
            SinkKind::Tcp => &self.tcp,
        };
        handle.as_ref().and_then(Weak::upgrade)
    }

    fn any_live(&self) -> bool {
        [SinkKind::WebSocket, SinkKind::Tcp]
            .into_iter()
            .any(|kind| self.live(kind).is_some())
    }
}

/// Bidirectional buffer pair with an attachable broadcast target.
///
/// # Example
/// ```
/// use serial_socket_bridge::bridge::{Bridge, BroadcastSink, SinkKind};
/// use serial_socket_bridge::config::BufferConfig;
/// use std::sync::{Arc, Mutex};
///
/// #[derive(Default)]
/// struct Collect(Mutex<Vec<u8>>);
///
/// impl BroadcastSink for Collect {
///     fn broadcast(&self, data: &[u8]) {
///         self.0.lock().unwrap().extend_from_slice(data);
///     }
/// }
///
/// let bridge = Bridge::new(&BufferConfig::default());
/// let sink = Arc::new(Collect::default());
/// let handle: Arc<dyn BroadcastSink> = sink.clone();
/// assert!(bridge.attach(SinkKind::Tcp, Arc::downgrade(&handle)));
///
/// assert_eq!(bridge.write(b"ok\n"), 3);
/// assert_eq!(sink.0.lock().unwrap().as_slice(), b"ok\n");
/// ```
#[derive(Debug)]
pub struct Bridge {
    tx: Mutex<TxState>,
    /// Held across drain + broadcast so flushes reach sinks in FIFO order.
    dispatch: ReentrantMutex<()>,
    rx: Mutex<RingBuffer>,
    sinks: RwLock<Sinks>,
    policy: FlushPolicy,
    clock: Arc<dyn Clock>,
}

impl Bridge {
    /// Build a bridge timed by the system clock.
    ///
    /// # Panics
    /// Panics if `tx_capacity` or `rx_capacity` is zero. Run
    /// [`Config::validate`](crate::config::Config::validate) first when the
    /// sizes come from user input; [`BridgeService`](crate::BridgeService)
    /// always does.
    pub fn new(config: &BufferConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Build a bridge timed by `clock`.
    ///
    /// # Panics
    /// Same as [`new`](Self::new): both capacities must be non-zero.
    pub fn with_clock(config: &BufferConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_millis();
        Self {
            tx: Mutex::new(TxState {
                buffer: RingBuffer::with_capacity(config.tx_capacity),
                last_flush_ms: now,
            }),
            dispatch: ReentrantMutex::new(()),
            rx: Mutex::new(RingBuffer::with_capacity(config.rx_capacity)),
            sinks: RwLock::new(Sinks::default()),
            policy: FlushPolicy::new(config.tx_capacity, config.flush_timeout()),
            clock,
        }
    }

    /// Reset both directions. Attached sinks are kept.
    pub fn begin(&self) {
        self.reset_buffers();
    }

    /// Same as [`begin`](Self::begin): buffered data in both directions is
    /// dropped without being flushed.
    pub fn end(&self) {
        self.reset_buffers();
    }

    fn reset_buffers(&self) {
        self.tx.lock().buffer.clear();
        self.rx.lock().clear();
    }

    // ---------- sinks ----------

    /// Register `sink` as the target for `kind`, replacing any previous one.
    ///
    /// Fails when the handle no longer points at a live sink. A successful
    /// attach discards whatever partial TX data was left from the previous
    /// session.
    pub fn attach(&self, kind: SinkKind, sink: Weak<dyn BroadcastSink>) -> bool {
        if sink.strong_count() == 0 {
            warn!(%kind, "refusing to attach a dropped sink");
            return false;
        }
        *self.sinks.write().slot(kind) = Some(sink);

        let mut tx = self.tx.lock();
        tx.buffer.clear();
        tx.last_flush_ms = self.clock.now_millis();
        debug!(%kind, "sink attached");
        true
    }

    pub fn detach(&self, kind: SinkKind) -> bool {
        *self.sinks.write().slot(kind) = None;
        debug!(%kind, "sink detached");
        true
    }

    pub fn is_attached(&self, kind: SinkKind) -> bool {
        self.sinks.read().live(kind).is_some()
    }

    // ---------- serial → network ----------

    /// Queue `data` for the network and flush as the policy demands.
    ///
    /// Returns the number of bytes accepted: all of them when at least one
    /// sink is attached, otherwise 0. Inputs larger than the TX capacity go
    /// out in capacity-sized flushes.
    pub fn write(&self, data: &[u8]) -> usize {
        if data.is_empty() {
            debug!("write with empty buffer ignored");
            return 0;
        }
        if !self.sinks.read().any_live() {
            debug!(len = data.len(), "write dropped, no sink attached");
            return 0;
        }

        if self.policy.needs_room(self.tx_len(), data.len()) {
            self.flush_for(FlushReason::Overflow);
        }

        let mut rest = data;
        while !rest.is_empty() {
            let accepted = {
                let mut tx = self.tx.lock();
                if tx.buffer.is_empty() {
                    tx.last_flush_ms = self.clock.now_millis();
                }
                tx.buffer.write(rest)
            };
            rest = &rest[accepted..];
            if !rest.is_empty() {
                self.flush_for(FlushReason::Full);
            }
        }
        trace!(len = data.len(), buffered = self.tx_len(), "tx queued");

        if data.last().copied().is_some_and(FlushPolicy::is_sentinel) {
            self.flush_for(FlushReason::Sentinel);
        }
        self.handle_flush();
        data.len()
    }

    pub fn write_byte(&self, byte: u8) -> usize {
        self.write(&[byte])
    }

    /// Flush if the buffer is full or its oldest byte has timed out.
    ///
    /// Called after every write and by the scheduler on every tick, so a
    /// partial line never waits longer than roughly one timeout.
    pub fn handle_flush(&self) {
        let reason = {
            let tx = self.tx.lock();
            self.policy
                .due(tx.buffer.len(), tx.last_flush_ms, self.clock.now_millis())
        };
        if let Some(reason) = reason {
            self.flush_for(reason);
        }
    }

    /// Send everything buffered to every attached sink.
    pub fn flush(&self) {
        self.flush_for(FlushReason::Explicit);
    }

    fn flush_for(&self, reason: FlushReason) {
        let _dispatch = self.dispatch.lock();
        let payload = {
            let mut tx = self.tx.lock();
            if tx.buffer.is_empty() {
                return;
            }
            tx.last_flush_ms = self.clock.now_millis();
            tx.buffer.drain()
        };

        let (websocket, tcp) = {
            let sinks = self.sinks.read();
            (sinks.live(SinkKind::WebSocket), sinks.live(SinkKind::Tcp))
        };
        debug!(?reason, len = payload.len(), "flushing tx");

        if let Some(sink) = websocket {
            sink.broadcast(&payload);
        }
        if let Some(sink) = tcp {
            sink.broadcast(&payload);
        }
    }

    /// Bytes waiting in the TX ring.
    pub fn tx_len(&self) -> usize {
        self.tx.lock().buffer.len()
    }

    pub fn flush_policy(&self) -> &FlushPolicy {
        &self.policy
    }

    // ---------- network → serial ----------

    /// Append network data for the serial side.
    ///
    /// All or nothing: if `data` does not fit in the remaining RX space the
    /// ring is left untouched and `false` is returned.
    pub fn push(&self, data: &[u8]) -> bool {
        let mut rx = self.rx.lock();
        if data.len() > rx.remaining() {
            warn!(
                len = data.len(),
                remaining = rx.remaining(),
                "rx push rejected, buffer full"
            );
            return false;
        }
        rx.write(data);
        true
    }

    /// Pop the oldest inbound byte.
    pub fn read(&self) -> Option<u8> {
        self.rx.lock().read()
    }

    pub fn peek(&self) -> Option<u8> {
        self.rx.lock().peek()
    }

    /// Inbound bytes waiting for the serial side.
    pub fn available(&self) -> usize {
        self.rx.lock().len()
    }

    pub fn rx_capacity(&self) -> usize {
        self.rx.lock().capacity()
    }

    pub fn rx_remaining(&self) -> usize {
        self.rx.lock().remaining()
    }
}
