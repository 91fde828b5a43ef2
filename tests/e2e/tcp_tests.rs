//! TCP clients against a running service on loopback.

use crate::common::{loopback_config, wait_for};
use serial_socket_bridge::config::Config;
use serial_socket_bridge::port::{MockSerialPort, SerialPump};
use serial_socket_bridge::BridgeService;
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

fn tcp_only(max_clients: usize) -> Config {
    let mut config = loopback_config();
    config.websocket.enabled = false;
    config.tcp.max_clients = max_clients;
    config
}

/// Service with a mock serial device and the TCP pool on a free port.
fn start(config: &Config) -> (BridgeService, MockSerialPort) {
    let service = BridgeService::start(config).expect("service should start");
    let device = MockSerialPort::new("MOCK0");
    let pump = SerialPump::new(Box::new(device.clone()), service.bridge().clone())
        .expect("mock port clears");
    (service.with_serial(pump), device)
}

fn connect(service: &BridgeService) -> TcpStream {
    let addr = service.tcp_local_addr().expect("tcp enabled");
    let stream = TcpStream::connect(addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    stream
}

fn connected(service: &BridgeService) -> usize {
    service.tcp_pool().map_or(0, |pool| pool.connected_count())
}

fn admit(service: &mut BridgeService, expected: usize) {
    assert!(
        wait_for(|| {
            service.poll_once();
            connected(service) == expected
        }),
        "expected {} connected clients",
        expected
    );
}

/// Whether the server closed or reset `stream`.
fn was_closed(stream: &mut TcpStream) -> bool {
    let mut byte = [0u8; 1];
    match stream.read(&mut byte) {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) => !matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut),
    }
}

#[test]
fn test_serial_line_reaches_tcp_client() {
    let (mut service, device) = start(&tcp_only(4));
    let mut client = connect(&service);
    admit(&mut service, 1);

    device.enqueue_read(b"ok T:21.0\n");
    service.poll_once();

    let mut line = [0u8; 10];
    client.read_exact(&mut line).unwrap();
    assert_eq!(&line, b"ok T:21.0\n");
}

#[test]
fn test_tcp_client_data_reaches_serial() {
    let (mut service, device) = start(&tcp_only(4));
    let mut client = connect(&service);
    admit(&mut service, 1);

    client.write_all(b"G28\n").unwrap();
    assert!(wait_for(|| {
        service.poll_once();
        device.written() == b"G28\n".to_vec()
    }));
}

#[test]
fn test_every_client_gets_each_flush() {
    let (mut service, device) = start(&tcp_only(4));
    let mut first = connect(&service);
    let mut second = connect(&service);
    admit(&mut service, 2);

    device.enqueue_read(b"echo:busy\n");
    service.poll_once();

    for client in [&mut first, &mut second] {
        let mut line = [0u8; 10];
        client.read_exact(&mut line).unwrap();
        assert_eq!(&line, b"echo:busy\n");
    }
}

#[test]
fn test_full_pool_turns_new_clients_away() {
    let (mut service, device) = start(&tcp_only(1));
    let mut first = connect(&service);
    admit(&mut service, 1);

    let mut extra = connect(&service);
    extra
        .set_read_timeout(Some(Duration::from_millis(50)))
        .unwrap();
    assert!(wait_for(|| {
        service.poll_once();
        was_closed(&mut extra)
    }));

    // The resident client is untouched.
    assert_eq!(connected(&service), 1);
    device.enqueue_read(b"ok\n");
    service.poll_once();
    let mut line = [0u8; 3];
    first.read_exact(&mut line).unwrap();
    assert_eq!(&line, b"ok\n");
}

#[test]
fn test_disconnect_frees_the_slot() {
    let (mut service, device) = start(&tcp_only(1));
    let first = connect(&service);
    admit(&mut service, 1);

    drop(first);
    admit(&mut service, 0);

    let mut second = connect(&service);
    admit(&mut service, 1);

    device.enqueue_read(b"start\n");
    service.poll_once();
    let mut line = [0u8; 6];
    second.read_exact(&mut line).unwrap();
    assert_eq!(&line, b"start\n");
}

#[test]
fn test_shutdown_closes_clients() {
    let (mut service, _device) = start(&tcp_only(2));
    let mut client = connect(&service);
    admit(&mut service, 1);

    service.shutdown();
    assert!(was_closed(&mut client));
}

#[test]
fn test_reconnect_into_single_slot_needs_one_cycle() {
    let (mut service, device) = start(&tcp_only(1));
    let first = connect(&service);
    admit(&mut service, 1);

    drop(first);
    let mut second = connect(&service);
    second
        .set_read_timeout(Some(Duration::from_millis(50)))
        .unwrap();
    // Let the FIN and the new handshake both land before the cycle runs.
    std::thread::sleep(Duration::from_millis(100));
    service.poll_once();

    assert_eq!(connected(&service), 1);
    assert!(!was_closed(&mut second));

    device.enqueue_read(b"start\n");
    service.poll_once();
    let mut line = [0u8; 6];
    second
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    second.read_exact(&mut line).unwrap();
    assert_eq!(&line, b"start\n");
}
