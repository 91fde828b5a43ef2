//! WebSocket transport for the bridge.
//!
//! Every flush of the bridge's TX side is fanned out to all connected
//! WebSocket clients as one binary frame. Frames received from clients, text
//! or binary, are pushed into the bridge's RX side as raw bytes.
//!
//! The broadcaster is a [`tokio::sync::broadcast`] channel, so the bridge can
//! flush from the blocking polling thread without touching the runtime. A
//! client that falls more than [`WS_BUFFER_SIZE`] frames behind loses the
//! oldest frames and is told so in the log.

use crate::bridge::{Bridge, BroadcastSink};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State as AxumState, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, error, info, warn};

/// Frames buffered per client before the oldest are dropped.
pub const WS_BUFFER_SIZE: usize = 100;

/// [`BroadcastSink`] that forwards each flushed payload to every subscriber.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    tx: broadcast::Sender<Vec<u8>>,
}

impl WsBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(WS_BUFFER_SIZE);
        Self { tx }
    }

    pub fn subscribe(&self) -> BroadcastStream<Vec<u8>> {
        BroadcastStream::new(self.tx.subscribe())
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastSink for WsBroadcaster {
    fn broadcast(&self, data: &[u8]) {
        // A send error only means nobody is listening.
        let _ = self.tx.send(data.to_vec());
    }
}

/// Shared state handed to every connection.
#[derive(Debug, Clone)]
pub struct WsContext {
    pub broadcaster: Arc<WsBroadcaster>,
    pub bridge: Arc<Bridge>,
}

impl WsContext {
    pub fn new(broadcaster: Arc<WsBroadcaster>, bridge: Arc<Bridge>) -> Self {
        Self { broadcaster, bridge }
    }
}

/// Router exposing the bridge at `path`.
pub fn build_router(ctx: WsContext, path: &str) -> Router {
    Router::new()
        .route(path, get(ws_handler))
        .with_state(ctx)
}

/// Serve `router` until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("WebSocket server listening on ws://{}", addr);
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    AxumState(ctx): AxumState<WsContext>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

async fn handle_socket(socket: WebSocket, ctx: WsContext) {
    let (mut sender, mut receiver) = socket.split();
    let client_id = uuid::Uuid::new_v4();

    let mut broadcast_stream = ctx.broadcaster.subscribe();
    info!("WebSocket client connected: {}", client_id);

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        push_inbound(&ctx.bridge, &data, client_id);
                    }
                    Some(Ok(Message::Text(text))) => {
                        push_inbound(&ctx.bridge, text.as_str().as_bytes(), client_id);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            error!("Failed to send pong to {}: {}", client_id, e);
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket client {} disconnected", client_id);
                        break;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error for {}: {}", client_id, e);
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended for {}", client_id);
                        break;
                    }
                }
            }

            msg = broadcast_stream.next() => {
                match msg {
                    Some(Ok(data)) => {
                        if let Err(e) = sender.send(Message::Binary(data.into())).await {
                            error!("Failed to send broadcast to {}: {}", client_id, e);
                            break;
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        warn!("Client {} lagged, skipped {} frames", client_id, skipped);
                    }
                    None => {
                        debug!("Broadcast stream ended for {}", client_id);
                        break;
                    }
                }
            }
        }
    }

    info!("WebSocket handler finished for {}", client_id);
}

fn push_inbound(bridge: &Bridge, data: &[u8], client_id: uuid::Uuid) {
    if data.is_empty() {
        return;
    }
    // Rejections are logged by the bridge.
    if bridge.push(data) {
        debug!(len = data.len(), "queued frame from {}", client_id);
    }
}
