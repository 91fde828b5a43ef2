//! Fixed-capacity byte ring used for both directions of the bridge.
//!
//! # Invariants
//! - `len <= capacity` and `head < capacity`.
//! - The byte at `(head + i) % capacity` for `i in 0..len` is live data in
//!   FIFO order.
//!
//! The ring never overwrites live data: `write` accepts only what fits and
//! reports how much that was. Callers decide what to do with the rest (the TX
//! side flushes, the RX side rejects). There is no locking in here; the
//! [`Bridge`](crate::bridge::Bridge) owns the lock around each ring.

/// Bounded FIFO of bytes with wraparound storage.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buf: Box<[u8]>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// Creates an empty ring holding at most `capacity` bytes.
    ///
    /// # Panics
    /// Panics if `capacity == 0`. Configured capacities are validated before
    /// any ring is built.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Free space left before the ring is full.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Appends as much of `data` as fits and returns the accepted count.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let accepted = data.len().min(self.remaining());
        if accepted == 0 {
            return 0;
        }

        let cap = self.buf.len();
        let tail = (self.head + self.len) % cap;
        let first = accepted.min(cap - tail);
        self.buf[tail..tail + first].copy_from_slice(&data[..first]);
        // Wrapped remainder lands at the physical start.
        let second = accepted - first;
        self.buf[..second].copy_from_slice(&data[first..accepted]);

        self.len += accepted;
        accepted
    }

    /// Pops the oldest byte.
    pub fn read(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.head = (self.head + 1) % self.buf.len();
        self.len -= 1;
        if self.len == 0 {
            self.head = 0;
        }
        Some(byte)
    }

    /// Returns the oldest byte without consuming it.
    pub fn peek(&self) -> Option<u8> {
        if self.len == 0 {
            None
        } else {
            Some(self.buf[self.head])
        }
    }

    /// Takes the whole content in FIFO order and leaves the ring empty.
    pub fn drain(&mut self) -> Vec<u8> {
        let (front, back) = self.segments();
        let mut out = Vec::with_capacity(self.len);
        out.extend_from_slice(front);
        out.extend_from_slice(back);
        self.clear();
        out
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Live bytes as up to two slices which, concatenated, are in FIFO order.
    fn segments(&self) -> (&[u8], &[u8]) {
        let cap = self.buf.len();
        if self.len <= cap - self.head {
            (&self.buf[self.head..self.head + self.len], &[])
        } else {
            let first = cap - self.head;
            (&self.buf[self.head..], &self.buf[..self.len - first])
        }
    }
}
