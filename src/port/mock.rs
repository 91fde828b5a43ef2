//! In-memory serial port for tests.
//!
//! Clones share state, so a test can hand one clone to the
//! [`SerialPump`](super::SerialPump) and keep another to script the device.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes the "device" will produce on subsequent reads.
    read_queue: VecDeque<u8>,
    /// One entry per `write_bytes` call.
    write_log: Vec<Vec<u8>>,
    /// Fail the next read or write with this error kind.
    fail_next: Option<std::io::ErrorKind>,
    /// Most bytes one `write_bytes` call accepts; `None` takes everything.
    write_limit: Option<usize>,
    buffers_cleared: bool,
}

/// Scripted serial device.
///
/// # Example
/// ```
/// use serial_socket_bridge::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"ok\n");
///
/// let mut buffer = [0u8; 8];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"ok\n");
///
/// port.write_bytes(b"M105\n").unwrap();
/// assert_eq!(port.written(), b"M105\n".to_vec());
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState::default())),
        }
    }

    /// Queue bytes the device will "send".
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Every write, one entry per call.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// All written bytes concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().write_log.concat()
    }

    /// Fail the next read or write with a broken pipe.
    pub fn fail_next(&self) {
        self.state.lock().fail_next = Some(std::io::ErrorKind::BrokenPipe);
    }

    /// Time out the next read or write, as a stalled device would.
    pub fn time_out_next(&self) {
        self.state.lock().fail_next = Some(std::io::ErrorKind::TimedOut);
    }

    /// Cap how many bytes each write accepts.
    pub fn limit_writes(&self, limit: Option<usize>) {
        self.state.lock().write_limit = limit;
    }

    pub fn was_cleared(&self) -> bool {
        self.state.lock().buffers_cleared
    }

    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    fn take_failure(state: &mut MockPortState) -> Result<(), PortError> {
        match state.fail_next.take() {
            Some(kind) => Err(PortError::Io(std::io::Error::from(kind))),
            None => Ok(()),
        }
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        Self::take_failure(&mut state)?;
        let n = state.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        if n > 0 {
            state.write_log.push(data[..n].to_vec());
        }
        Ok(n)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        Self::take_failure(&mut state)?;

        let n = buffer.len().min(state.read_queue.len());
        if n == 0 {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "No data available",
            )));
        }
        for (dst, src) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.read_queue.clear();
        state.buffers_cleared = true;
        Ok(())
    }

    fn bytes_to_read(&self) -> Option<usize> {
        Some(self.state.lock().read_queue.len())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
