//! Tests requiring actual serial hardware.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=/dev/ttyUSB0          # or COM3 on Windows
//! export TEST_BAUD=115200                # optional
//! export TEST_LOOPBACK=1                 # if the port has TX-RX looped back
//!
//! cargo test --features hardware-tests -- --ignored
//! ```

use super::utils::skip_without_hardware;
use crate::common::{attach, buffer_config, RecordingSink};
use serial_socket_bridge::bridge::{Bridge, SinkKind};
use serial_socket_bridge::port::{SerialPortAdapter, SerialPump, SyncSerialPort};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
#[ignore] // Run with --ignored flag
fn test_real_port_open_close() {
    let Some(test) = skip_without_hardware() else {
        return;
    };

    let port = SyncSerialPort::open(&test.port_name, &test.to_serial_config())
        .expect("Failed to open port");
    assert_eq!(port.name(), test.port_name);
    drop(port);

    // Reopening proves the handle was released.
    SyncSerialPort::open(&test.port_name, &test.to_serial_config()).expect("Failed to reopen port");
}

#[test]
#[ignore]
fn test_loopback_through_bridge() {
    let Some(test) = skip_without_hardware() else {
        return;
    };
    if !test.loopback_enabled {
        println!("Skipping loopback test: TEST_LOOPBACK not set");
        return;
    }

    let bridge = Arc::new(Bridge::new(&buffer_config(1200, 256, 500)));
    let sink = RecordingSink::new();
    assert!(attach(&bridge, SinkKind::Tcp, &sink));

    let port = SyncSerialPort::open(&test.port_name, &test.to_serial_config()).unwrap();
    let mut pump = SerialPump::new(Box::new(port), bridge.clone()).unwrap();

    // Network → serial, looped back, serial → network.
    assert!(bridge.push(b"loopback\n"));
    let deadline = Instant::now() + Duration::from_secs(2);
    while sink.bytes() != b"loopback\n".to_vec() && Instant::now() < deadline {
        pump.pump_once().expect("pump failed");
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(sink.bytes(), b"loopback\n".to_vec());
}
