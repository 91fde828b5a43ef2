use clap::Parser;
use serial_socket_bridge::config::{Config, ConfigLoader, LogFormat, LoggingConfig};
use serial_socket_bridge::BridgeService;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Bridges one serial device to TCP and WebSocket clients.",
    long_about = "Buffers serial output and flushes it line by line to every connected TCP and WebSocket client, while queueing whatever the clients send for the serial device. Settings come from serial-bridge.toml, SERIAL_BRIDGE_* environment variables and the flags below, in increasing priority."
)]
struct Args {
    /// Configuration file. Defaults to the standard search path.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device, e.g. /dev/ttyUSB0 or COM3.
    #[arg(short, long)]
    serial_port: Option<String>,

    /// Serial baud rate.
    #[arg(short, long)]
    baud: Option<u32>,

    /// TCP listening port.
    #[arg(long)]
    tcp_port: Option<u16>,

    /// WebSocket listening port.
    #[arg(long)]
    ws_port: Option<u16>,

    /// Disable the TCP transport.
    #[arg(long)]
    no_tcp: bool,

    /// Disable the WebSocket transport.
    #[arg(long)]
    no_websocket: bool,

    /// Log filter, e.g. "debug" or "serial_socket_bridge=trace". RUST_LOG wins.
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(port) = &self.serial_port {
            config.serial.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(port) = self.tcp_port {
            config.tcp.port = port;
        }
        if let Some(port) = self.ws_port {
            config.websocket.port = port;
        }
        if self.no_tcp {
            config.tcp.enabled = false;
        }
        if self.no_websocket {
            config.websocket.enabled = false;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A second init (tests) is a no-op.
    let _ = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    args.apply(loader.config_mut());
    loader.config().validate()?;

    if args.print_config {
        print!("{}", loader.to_toml()?);
        return Ok(());
    }

    init_logging(&loader.config().logging);
    match &loader.config_path {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    let config = loader.into_config();
    #[allow(unused_mut)]
    let mut service = BridgeService::start(&config)?;
    if let Some(addr) = service.tcp_local_addr() {
        info!("TCP server listening on {} ({} client slots)", addr, config.tcp.max_clients);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    #[cfg(feature = "websocket")]
    let ws_task = if config.websocket.enabled {
        use serial_socket_bridge::error::BridgeError;
        use serial_socket_bridge::websocket::{build_router, serve, WsBroadcaster, WsContext};
        use serial_socket_bridge::SinkKind;

        let broadcaster = Arc::new(WsBroadcaster::new());
        service.attach_sink(SinkKind::WebSocket, broadcaster.clone());

        let addr = config.websocket.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| BridgeError::bind(&addr, e))?;
        let router = build_router(
            WsContext::new(broadcaster, service.bridge().clone()),
            &config.websocket.path,
        );

        let mut rx = shutdown_rx.clone();
        Some(tokio::spawn(serve(listener, router, async move {
            let _ = rx.changed().await;
        })))
    } else {
        None
    };

    #[cfg(not(feature = "websocket"))]
    if config.websocket.enabled {
        warn!("WebSocket transport requested but this build lacks the `websocket` feature");
    }
    drop(shutdown_rx);

    let poll_stop = stop.clone();
    let poll = tokio::task::spawn_blocking(move || service.run(&poll_stop));

    shutdown_signal().await;
    stop.store(true, Ordering::Relaxed);
    let _ = shutdown_tx.send(true);

    poll.await?;

    #[cfg(feature = "websocket")]
    if let Some(task) = ws_task {
        if let Err(e) = task.await? {
            warn!("WebSocket server exited with error: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown...");
}
