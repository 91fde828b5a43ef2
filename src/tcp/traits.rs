//! Socket primitives the client pool is written against.
//!
//! Both traits are deliberately small: the pool needs to know whether a
//! connection is waiting, to take it, and to move bytes on an already
//! accepted connection without ever blocking. [`NetListener`] and
//! [`NetConnection`] implement them over `std::net`; the mocks implement them
//! in memory.
//!
//! [`NetListener`]: super::net::NetListener
//! [`NetConnection`]: super::net::NetConnection

use std::io;
use std::net::SocketAddr;

/// One accepted client.
pub trait Connection: Send {
    /// Whether the peer is still believed to be reachable.
    ///
    /// Implementations flip this to `false` lazily, when a read, peek or
    /// write observes the disconnect.
    fn is_connected(&self) -> bool;

    /// Check the socket without blocking and report whether the peer is
    /// still there.
    ///
    /// Unlike [`is_connected`](Self::is_connected) this may touch the
    /// socket, so a peer that left since the last read is noticed now.
    fn poll_connected(&mut self) -> bool {
        self.is_connected()
    }

    /// Bytes that can be read right now without blocking.
    fn available(&mut self) -> io::Result<usize>;

    /// Read into `buf`, returning how many bytes were copied.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write as much of `data` as the socket takes without blocking.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Close the connection. Idempotent.
    fn stop(&mut self);

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Source of inbound connections.
pub trait Listener: Send {
    type Conn: Connection;

    /// Whether a connection is waiting to be accepted.
    fn has_pending(&mut self) -> bool;

    /// Take the next waiting connection.
    ///
    /// Returns [`io::ErrorKind::WouldBlock`] when nothing is pending.
    fn accept_pending(&mut self) -> io::Result<Self::Conn>;
}
