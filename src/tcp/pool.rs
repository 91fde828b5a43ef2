//! Fixed-size TCP client pool multiplexed onto one [`Bridge`].
//!
//! Every call to [`ClientPool::handle`] runs one polling cycle:
//!
//! 1. **Admission.** When the listener has connections waiting, slots are
//!    scanned in index order and each empty or stale slot (its client has
//!    gone away) is refilled with the next waiting connection. Occupied
//!    slots are probed first, so a client that hung up since the last cycle
//!    gives its slot to a waiting connection in the same cycle. Whatever is
//!    still waiting afterwards is accepted and closed straight away: the pool
//!    never grows past its size and never evicts a live client to make room.
//! 2. **Inbound.** Each connected slot, slot 0 first, gets one non-blocking
//!    read of at most `min(available, rx_remaining - 1)` bytes which are then
//!    pushed into the bridge. Data from several clients in the same cycle is
//!    therefore interleaved in slot order, not arrival order.
//!
//! Outbound traffic goes the other way through [`BroadcastSink`]: every
//! bridge flush is written to every connected client. Short writes are not
//! retried.
//!
//! All of this happens under one lock around the listener and the slot array.
//! Socket calls made under it are non-blocking, so the lock is only ever held
//! for bounded work.

use super::traits::{Connection, Listener};
use crate::bridge::{Bridge, BroadcastSink, SinkKind};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Externally visible state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Connected,
    /// Holds a connection whose peer is gone; reclaimed on the next cycle.
    Stale,
}

enum Slot<C> {
    Empty,
    Connected(C),
}

impl<C: Connection> Slot<C> {
    fn state(&self) -> SlotState {
        match self {
            Slot::Empty => SlotState::Empty,
            Slot::Connected(conn) if conn.is_connected() => SlotState::Connected,
            Slot::Connected(_) => SlotState::Stale,
        }
    }

    fn is_live(&self) -> bool {
        self.state() == SlotState::Connected
    }

    /// Probe the held connection and report whether it is still live.
    fn poll_live(&mut self) -> bool {
        match self {
            Slot::Empty => false,
            Slot::Connected(conn) => conn.poll_connected(),
        }
    }

    /// Close whatever the slot holds and leave it empty.
    fn release(&mut self) {
        if let Slot::Connected(conn) = self {
            conn.stop();
        }
        *self = Slot::Empty;
    }
}

struct PoolInner<L: Listener> {
    listener: L,
    slots: Vec<Slot<L::Conn>>,
}

/// TCP multiplexer with `N` client slots.
///
/// # Example
/// ```
/// use serial_socket_bridge::bridge::Bridge;
/// use serial_socket_bridge::config::BufferConfig;
/// use serial_socket_bridge::tcp::{ClientPool, MockConnection, MockListener};
/// use std::sync::Arc;
///
/// let bridge = Arc::new(Bridge::new(&BufferConfig::default()));
/// let listener = MockListener::new();
/// let pool = ClientPool::new(listener.clone(), 2, bridge.clone());
/// assert!(pool.attach());
///
/// let client = MockConnection::new();
/// client.feed(b"M114\n");
/// listener.enqueue(client.clone());
///
/// pool.handle();
/// assert_eq!(pool.connected_count(), 1);
/// assert_eq!(bridge.available(), 5);
///
/// bridge.write(b"ok\n");
/// assert_eq!(client.written(), b"ok\n".to_vec());
/// ```
pub struct ClientPool<L: Listener> {
    inner: Mutex<PoolInner<L>>,
    bridge: Arc<Bridge>,
}

impl<L: Listener + 'static> ClientPool<L> {
    /// Create a pool with `max_clients` empty slots feeding `bridge`.
    pub fn new(listener: L, max_clients: usize, bridge: Arc<Bridge>) -> Arc<Self> {
        let slots = (0..max_clients).map(|_| Slot::Empty).collect();
        Arc::new(Self {
            inner: Mutex::new(PoolInner { listener, slots }),
            bridge,
        })
    }

    /// Register this pool as the bridge's TCP sink.
    ///
    /// The bridge only keeps a weak handle, so dropping the pool detaches it
    /// implicitly.
    pub fn attach(self: &Arc<Self>) -> bool {
        let weak: Weak<Self> = Arc::downgrade(self);
        let sink: Weak<dyn BroadcastSink> = weak;
        self.bridge.attach(SinkKind::Tcp, sink)
    }

    /// Run one admission + inbound polling cycle.
    pub fn handle(&self) {
        let mut inner = self.inner.lock();
        let PoolInner { listener, slots } = &mut *inner;

        admit(listener, slots);
        for (index, slot) in slots.iter_mut().enumerate() {
            self.service_slot(index, slot);
        }
    }

    fn service_slot(&self, index: usize, slot: &mut Slot<L::Conn>) {
        let Slot::Connected(conn) = slot else {
            return;
        };
        if !conn.is_connected() {
            info!(slot = index, peer = ?conn.peer_addr(), "client disconnected");
            slot.release();
            return;
        }

        // Keep one byte of RX free so a push never fills it completely.
        let headroom = self.bridge.rx_remaining().saturating_sub(1);
        if headroom == 0 {
            return;
        }
        let available = match conn.available() {
            Ok(n) => n,
            Err(e) => {
                debug!(slot = index, error = %e, "peek failed");
                return;
            }
        };
        let readable = available.min(headroom);
        if readable == 0 {
            return;
        }

        let mut chunk = vec![0u8; readable];
        match conn.read(&mut chunk) {
            Ok(0) => {}
            Ok(n) => {
                if !self.bridge.push(&chunk[..n]) {
                    warn!(slot = index, len = n, "inbound data dropped, rx full");
                }
            }
            Err(e) => debug!(slot = index, error = %e, "read failed"),
        }
    }

    /// Close every client, turn away anything still waiting and detach from
    /// the bridge.
    pub fn end(&self) {
        {
            let mut inner = self.inner.lock();
            let PoolInner { listener, slots } = &mut *inner;
            for slot in slots.iter_mut() {
                slot.release();
            }
            reject_pending(listener);
        }
        self.bridge.detach(SinkKind::Tcp);
        info!("tcp pool stopped");
    }

    /// Number of slots with a live client.
    pub fn connected_count(&self) -> usize {
        self.inner
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.is_live())
            .count()
    }

    pub fn slot_states(&self) -> Vec<SlotState> {
        self.inner.lock().slots.iter().map(Slot::state).collect()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.len()
    }
}

fn admit<L: Listener>(listener: &mut L, slots: &mut [Slot<L::Conn>]) {
    if !listener.has_pending() {
        return;
    }

    for (index, slot) in slots.iter_mut().enumerate() {
        if slot.poll_live() {
            continue;
        }
        if !listener.has_pending() {
            return;
        }
        if let Slot::Connected(conn) = slot {
            info!(slot = index, peer = ?conn.peer_addr(), "client disconnected");
        }
        slot.release();
        match listener.accept_pending() {
            Ok(conn) => {
                info!(slot = index, peer = ?conn.peer_addr(), "client connected");
                *slot = Slot::Connected(conn);
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                return;
            }
        }
    }

    reject_pending(listener);
}

/// Accept and immediately close every connection still waiting.
fn reject_pending<L: Listener>(listener: &mut L) {
    while listener.has_pending() {
        match listener.accept_pending() {
            Ok(mut conn) => {
                warn!(peer = ?conn.peer_addr(), "pool full, rejecting client");
                conn.stop();
            }
            Err(e) => {
                debug!(error = %e, "accept for rejection failed");
                return;
            }
        }
    }
}

impl<L: Listener> BroadcastSink for ClientPool<L> {
    fn broadcast(&self, data: &[u8]) {
        let mut inner = self.inner.lock();
        for (index, slot) in inner.slots.iter_mut().enumerate() {
            let Slot::Connected(conn) = slot else {
                continue;
            };
            if !conn.is_connected() {
                continue;
            }
            match conn.write(data) {
                Ok(n) if n < data.len() => {
                    debug!(slot = index, written = n, len = data.len(), "short write")
                }
                Ok(_) => {}
                Err(e) => debug!(slot = index, error = %e, "write failed"),
            }
        }
    }
}

impl<L: Listener> std::fmt::Debug for ClientPool<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ClientPool")
            .field("slots", &inner.slots.iter().map(Slot::state).collect::<Vec<_>>())
            .finish()
    }
}
