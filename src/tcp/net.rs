//! `std::net` implementations of the pool's socket traits.
//!
//! Everything is non-blocking. The standard library has no "bytes
//! available" query, so [`NetConnection::available`] peeks into a scratch
//! window and reports at most [`PEEK_WINDOW`] bytes per call.

use super::traits::{Connection, Listener};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

/// Upper bound on what one `available()` call can report.
pub const PEEK_WINDOW: usize = 1024;

/// Non-blocking TCP listener with a one-connection lookahead.
#[derive(Debug)]
pub struct NetListener {
    listener: TcpListener,
    /// Connection accepted by `has_pending` but not yet handed out.
    lookahead: Option<(TcpStream, SocketAddr)>,
}

impl NetListener {
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        info!(addr = ?listener.local_addr().ok(), "tcp listener bound");
        Ok(Self {
            listener,
            lookahead: None,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    fn poll_accept(&mut self) -> io::Result<Option<(TcpStream, SocketAddr)>> {
        match self.listener.accept() {
            Ok(pair) => Ok(Some(pair)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Listener for NetListener {
    type Conn = NetConnection;

    fn has_pending(&mut self) -> bool {
        if self.lookahead.is_some() {
            return true;
        }
        match self.poll_accept() {
            Ok(next) => {
                self.lookahead = next;
                self.lookahead.is_some()
            }
            Err(e) => {
                warn!(error = %e, "accept poll failed");
                false
            }
        }
    }

    fn accept_pending(&mut self) -> io::Result<NetConnection> {
        let (stream, peer) = match self.lookahead.take() {
            Some(pair) => pair,
            None => self
                .poll_accept()?
                .ok_or_else(|| io::Error::from(io::ErrorKind::WouldBlock))?,
        };
        NetConnection::from_stream(stream, peer)
    }
}

/// Accepted TCP client in non-blocking mode.
#[derive(Debug)]
pub struct NetConnection {
    stream: TcpStream,
    peer: SocketAddr,
    connected: bool,
    scratch: Box<[u8]>,
}

impl NetConnection {
    pub fn from_stream(stream: TcpStream, peer: SocketAddr) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            peer,
            connected: true,
            scratch: vec![0u8; PEEK_WINDOW].into_boxed_slice(),
        })
    }

    fn lost(&mut self, error: &io::Error) {
        debug!(peer = %self.peer, error = %error, "connection lost");
        self.connected = false;
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

impl Connection for NetConnection {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn poll_connected(&mut self) -> bool {
        // A peek observes a FIN or reset that nothing has read yet.
        let _ = self.available();
        self.connected
    }

    fn available(&mut self) -> io::Result<usize> {
        if !self.connected {
            return Ok(0);
        }
        match self.stream.peek(&mut self.scratch) {
            Ok(0) => {
                // Orderly shutdown from the peer.
                self.connected = false;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if is_transient(&e) => Ok(0),
            Err(e) => {
                self.lost(&e);
                Err(e)
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || !self.connected {
            return Ok(0);
        }
        match self.stream.read(buf) {
            Ok(0) => {
                self.connected = false;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if is_transient(&e) => Ok(0),
            Err(e) => {
                self.lost(&e);
                Err(e)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if !self.connected {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        match self.stream.write(data) {
            Ok(n) => Ok(n),
            Err(e) if is_transient(&e) => Ok(0),
            Err(e) => {
                self.lost(&e);
                Err(e)
            }
        }
    }

    fn stop(&mut self) {
        if self.connected {
            let _ = self.stream.shutdown(Shutdown::Both);
        }
        self.connected = false;
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}
