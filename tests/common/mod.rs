//! Shared test utilities for the bridge test suites.
//!
//! This module provides common test infrastructure including:
//! - A recording broadcast sink
//! - Bridge builders driven by a manual clock
//! - Loopback configuration for network tests
//! - Polling helpers for socket timing

#![allow(dead_code)]

use parking_lot::Mutex;
use serial_socket_bridge::bridge::{Bridge, BroadcastSink, SinkKind};
use serial_socket_bridge::clock::ManualClock;
use serial_socket_bridge::config::{BufferConfig, Config};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sink that keeps every payload it is handed, one entry per flush.
#[derive(Debug, Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<Vec<u8>>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().clone()
    }

    /// All received bytes concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.frames.lock().concat()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }
}

impl BroadcastSink for RecordingSink {
    fn broadcast(&self, data: &[u8]) {
        self.frames.lock().push(data.to_vec());
    }
}

/// Attach `sink` to `bridge` as `kind`.
///
/// The bridge holds the sink weakly; the caller's `Arc` keeps it alive.
pub fn attach(bridge: &Bridge, kind: SinkKind, sink: &Arc<RecordingSink>) -> bool {
    let handle: Arc<dyn BroadcastSink> = sink.clone();
    bridge.attach(kind, Arc::downgrade(&handle))
}

pub fn buffer_config(tx: usize, rx: usize, timeout_ms: u64) -> BufferConfig {
    BufferConfig {
        tx_capacity: tx,
        rx_capacity: rx,
        flush_timeout_ms: timeout_ms,
    }
}

/// Bridge on a manual clock starting at zero.
pub fn manual_bridge(config: &BufferConfig) -> (Arc<Bridge>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let bridge = Arc::new(Bridge::with_clock(config, clock.clone()));
    (bridge, clock)
}

/// Manual-clock bridge with a TCP recording sink already attached.
pub fn recording_bridge(config: &BufferConfig) -> (Arc<Bridge>, Arc<ManualClock>, Arc<RecordingSink>) {
    let (bridge, clock) = manual_bridge(config);
    let sink = RecordingSink::new();
    assert!(attach(&bridge, SinkKind::Tcp, &sink));
    (bridge, clock, sink)
}

/// Configuration bound to loopback on OS-assigned ports.
pub fn loopback_config() -> Config {
    let mut config = Config::default();
    config.tcp.host = "127.0.0.1".to_string();
    config.tcp.port = 0;
    config.websocket.host = "127.0.0.1".to_string();
    config.websocket.port = 0;
    config
}

/// Poll `condition` until it holds or two seconds pass.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
