//! Core trait for the serial transport.
//!
//! The bridge core never touches a serial device itself; the
//! [`SerialPump`](super::SerialPump) drives whatever implements
//! [`SerialPortAdapter`], a real port or the in-memory mock.

use super::error::PortError;

/// Byte-level access to a serial device.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the device.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the device into `buffer`.
    ///
    /// Returns the number of bytes actually read. An empty line is reported
    /// as an I/O error of kind `TimedOut` or `WouldBlock`.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Discard anything sitting in the device's input and output queues.
    fn clear_buffers(&mut self) -> Result<(), PortError>;

    /// Bytes waiting in the input queue, if the backend can tell.
    fn bytes_to_read(&self) -> Option<usize> {
        None
    }
}
