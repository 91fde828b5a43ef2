//! In-memory listener and connection for exercising the pool without sockets.
//!
//! Both types are cheap handles over shared state: hand one clone to the pool
//! and keep another to feed data, drop the peer, or inspect what was written.

use super::traits::{Connection, Listener};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

#[derive(Debug)]
struct MockConnState {
    /// Bytes the peer has sent that the pool has not read yet.
    inbound: VecDeque<u8>,
    /// Everything the pool wrote to the peer, concatenated.
    written: Vec<u8>,
    connected: bool,
    /// The peer closed, but nothing has looked at the socket since.
    hung_up: bool,
    stopped: bool,
    /// Largest write accepted in one call, to simulate short writes.
    write_limit: Option<usize>,
}

/// Scripted client connection.
#[derive(Debug, Clone)]
pub struct MockConnection {
    state: Arc<Mutex<MockConnState>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockConnState {
                inbound: VecDeque::new(),
                written: Vec::new(),
                connected: true,
                hung_up: false,
                stopped: false,
                write_limit: None,
            })),
        }
    }

    /// Queue bytes as if the peer had sent them.
    pub fn feed(&self, data: &[u8]) {
        self.state.lock().inbound.extend(data);
    }

    /// Simulate the peer going away.
    pub fn disconnect(&self) {
        self.state.lock().connected = false;
    }

    /// Close from the peer side; noticed on the next peek, like a real
    /// socket.
    pub fn hang_up(&self) {
        self.state.lock().hung_up = true;
    }

    /// Cap every subsequent write at `limit` bytes.
    pub fn limit_writes(&self, limit: usize) {
        self.state.lock().write_limit = Some(limit);
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    pub fn unread(&self) -> usize {
        self.state.lock().inbound.len()
    }

    /// Whether the pool closed this connection.
    pub fn was_stopped(&self) -> bool {
        self.state.lock().stopped
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for MockConnection {
    fn is_connected(&self) -> bool {
        let state = self.state.lock();
        state.connected && !state.stopped
    }

    fn poll_connected(&mut self) -> bool {
        let _ = self.available();
        self.is_connected()
    }

    fn available(&mut self) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.inbound.is_empty() && state.hung_up {
            state.connected = false;
        }
        Ok(state.inbound.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        let n = buf.len().min(state.inbound.len());
        for (dst, src) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if !state.connected || state.stopped {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        let n = state.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        state.written.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.stopped = true;
        state.connected = false;
    }
}

/// Listener whose pending queue is filled by the test.
#[derive(Debug, Clone, Default)]
pub struct MockListener {
    pending: Arc<Mutex<VecDeque<MockConnection>>>,
}

impl MockListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `conn` the last connection waiting to be accepted.
    pub fn enqueue(&self, conn: MockConnection) {
        self.pending.lock().push_back(conn);
    }

    /// Connections not yet accepted.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Listener for MockListener {
    type Conn = MockConnection;

    fn has_pending(&mut self) -> bool {
        !self.pending.lock().is_empty()
    }

    fn accept_pending(&mut self) -> io::Result<MockConnection> {
        self.pending
            .lock()
            .pop_front()
            .ok_or_else(|| io::Error::from(io::ErrorKind::WouldBlock))
    }
}
