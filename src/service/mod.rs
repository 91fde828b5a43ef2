//! Wiring and scheduling for a running bridge.
//!
//! The core types never spawn threads; [`BridgeService`] owns them and is the
//! external scheduler that drives them.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────── BridgeService::poll_once ────────────┐
//! serial device ──┤ SerialPump ──write()──> Bridge ──flush──> sinks  │
//!                 │                            ▲                     │
//! TCP clients ────┤ ClientPool::handle ──push()┘                     │
//!                 │ Bridge::handle_flush (timeout check)             │
//!                 └──────────────────────────────────────────────────┘
//! ```
//!
//! Sinks created outside the service (the WebSocket broadcaster) are handed
//! to [`BridgeService::attach_sink`], which keeps them alive for as long as
//! the service runs since the bridge itself only holds weak handles.

use crate::bridge::{Bridge, BroadcastSink, SinkKind};
use crate::config::Config;
use crate::error::{BridgeError, BridgeResult};
use crate::port::{SerialPump, SyncSerialPort};
use crate::tcp::{ClientPool, NetListener};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Owns the bridge and everything attached to it.
#[derive(Debug)]
pub struct BridgeService {
    bridge: Arc<Bridge>,
    tcp: Option<Arc<ClientPool<NetListener>>>,
    tcp_addr: Option<SocketAddr>,
    serial: Option<SerialPump>,
    /// Strong handles for sinks the bridge only references weakly.
    sinks: Vec<Arc<dyn BroadcastSink>>,
    poll_interval: Duration,
}

impl BridgeService {
    /// Build the bridge, bind the TCP pool and open the serial port as
    /// configured.
    pub fn start(config: &Config) -> BridgeResult<Self> {
        config.validate()?;

        let bridge = Arc::new(Bridge::new(&config.buffers));
        bridge.begin();

        let mut service = Self {
            bridge: bridge.clone(),
            tcp: None,
            tcp_addr: None,
            serial: None,
            sinks: Vec::new(),
            poll_interval: config.tcp.poll_interval(),
        };

        if config.tcp.enabled {
            let addr = config.tcp.bind_addr();
            let listener = NetListener::bind(&addr).map_err(|e| BridgeError::bind(&addr, e))?;
            service.tcp_addr = Some(listener.local_addr()?);
            let pool = ClientPool::new(listener, config.tcp.max_clients, bridge.clone());
            pool.attach();
            service.tcp = Some(pool);
        }

        if let Some(name) = &config.serial.port {
            let port = SyncSerialPort::open(name, &config.serial)?;
            service.serial = Some(SerialPump::new(Box::new(port), bridge)?);
        } else {
            info!("no serial port configured, running network-only");
        }

        Ok(service)
    }

    /// Replace the serial side, e.g. with a pump over a mock device.
    pub fn with_serial(mut self, pump: SerialPump) -> Self {
        self.serial = Some(pump);
        self
    }

    /// Attach a sink and keep it alive for the lifetime of the service.
    pub fn attach_sink(&mut self, kind: SinkKind, sink: Arc<dyn BroadcastSink>) -> bool {
        let attached = self.bridge.attach(kind, Arc::downgrade(&sink));
        if attached {
            self.sinks.push(sink);
        }
        attached
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    pub fn tcp_pool(&self) -> Option<&Arc<ClientPool<NetListener>>> {
        self.tcp.as_ref()
    }

    /// Address the TCP pool actually bound, useful with port 0.
    pub fn tcp_local_addr(&self) -> Option<SocketAddr> {
        self.tcp_addr
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// One scheduler tick.
    pub fn poll_once(&mut self) {
        if let Some(pool) = &self.tcp {
            pool.handle();
        }

        if let Some(pump) = &mut self.serial {
            if let Err(e) = pump.pump_once() {
                error!(port = pump.port_name(), error = %e, "serial port failed, continuing without it");
                self.serial = None;
            }
        }

        self.bridge.handle_flush();
    }

    /// Tick until `stop` is raised, then shut down.
    pub fn run(mut self, stop: &AtomicBool) {
        info!(interval = ?self.poll_interval, "bridge polling loop started");
        while !stop.load(Ordering::Relaxed) {
            self.poll_once();
            std::thread::sleep(self.poll_interval);
        }
        self.shutdown();
    }

    /// Close all clients, detach every sink and drop buffered data.
    pub fn shutdown(&mut self) {
        if let Some(pool) = self.tcp.take() {
            pool.end();
        }
        self.bridge.detach(SinkKind::WebSocket);
        self.sinks.clear();
        self.serial = None;
        self.bridge.end();
        info!("bridge stopped");
    }
}
