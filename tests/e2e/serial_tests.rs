//! Serial side of the service: pump, flush timing and failure handling.

use crate::common::{loopback_config, RecordingSink};
use serial_socket_bridge::bridge::{BroadcastSink, SinkKind};
use serial_socket_bridge::port::{MockSerialPort, PumpStats, SerialPump};
use serial_socket_bridge::BridgeService;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Network-free service with a recording WebSocket-kind sink.
fn start(flush_timeout_ms: u64) -> (BridgeService, MockSerialPort, Arc<RecordingSink>) {
    let mut config = loopback_config();
    config.tcp.enabled = false;
    config.websocket.enabled = false;
    config.buffers.flush_timeout_ms = flush_timeout_ms;

    let service = BridgeService::start(&config).unwrap();
    let device = MockSerialPort::new("MOCK0");
    let pump = SerialPump::new(Box::new(device.clone()), service.bridge().clone()).unwrap();
    let mut service = service.with_serial(pump);

    let sink = RecordingSink::new();
    let handle: Arc<dyn BroadcastSink> = sink.clone();
    assert!(service.attach_sink(SinkKind::WebSocket, handle));
    (service, device, sink)
}

#[test]
fn test_partial_line_flushed_by_tick_after_timeout() {
    let (mut service, device, sink) = start(20);

    device.enqueue_read(b"wait");
    service.poll_once();
    assert_eq!(sink.frame_count(), 0);

    std::thread::sleep(Duration::from_millis(40));
    service.poll_once();
    assert_eq!(sink.frames(), vec![b"wait".to_vec()]);
}

#[test]
fn test_line_split_across_reads_is_one_frame() {
    let (mut service, device, sink) = start(500);

    device.enqueue_read(b"ok T:2");
    service.poll_once();
    device.enqueue_read(b"1.0\n");
    service.poll_once();

    assert_eq!(sink.frames(), vec![b"ok T:21.0\n".to_vec()]);
}

#[test]
fn test_network_input_written_to_device() {
    let (mut service, device, _sink) = start(500);

    assert!(service.bridge().push(b"M105\n"));
    service.poll_once();

    assert_eq!(device.written(), b"M105\n".to_vec());
    assert_eq!(service.bridge().available(), 0);
}

#[test]
fn test_serial_bytes_without_sink_are_discarded() {
    let bridge = Arc::new(serial_socket_bridge::Bridge::new(&Default::default()));
    let device = MockSerialPort::new("MOCK0");
    let mut pump = SerialPump::new(Box::new(device.clone()), bridge.clone()).unwrap();

    device.enqueue_read(b"nobody\n");
    let stats = pump.pump_once().unwrap();
    assert_eq!(
        stats,
        PumpStats {
            from_serial: 7,
            queued: 0,
            to_serial: 0
        }
    );
    assert_eq!(bridge.tx_len(), 0);
}

#[test]
fn test_run_stops_when_flag_is_raised() {
    let (service, device, sink) = start(500);
    let stop = Arc::new(AtomicBool::new(true));

    device.enqueue_read(b"never read\n");
    service.run(&stop);

    assert_eq!(sink.frame_count(), 0);
    assert_eq!(device.available_bytes(), "never read\n".len());
}

#[test]
fn test_stalled_device_write_is_retried() {
    let (mut service, device, _sink) = start(500);

    assert!(service.bridge().push(b"G28\n"));
    device.time_out_next();
    service.poll_once();
    assert!(device.written().is_empty());

    service.poll_once();
    assert_eq!(device.written(), b"G28\n".to_vec());
}
