//! WebSocket client.

use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::{Error, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{info, trace, warn};

use guild_core::{
    ConnectionHandle, ConnectionHandler, ConnectionInfo, TransportError, TransportResult,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// WebSocket client configuration.
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    /// Server URL (`ws://` or `wss://`).
    pub url: String,
    /// Identifier given to the resulting [`ConnectionHandle`].
    pub connection_id: String,
    /// Capacity of the outgoing frame queue.
    pub buffer: usize,
}

impl WsClientConfig {
    /// Creates a configuration with a 256 frame outgoing queue.
    pub fn new(url: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection_id: connection_id.into(),
            buffer: 256,
        }
    }
}

/// State owned by the background connection loop.
struct ClientLoopState {
    handler: Arc<dyn ConnectionHandler>,
    handle: ConnectionHandle,
    ws_tx: WsSink,
    ws_rx: WsSource,
}

impl ClientLoopState {
    /// Handles one incoming WebSocket item.
    /// Returns false once the connection is gone.
    async fn handle_message(&mut self, msg: Option<Result<Message, Error>>) -> bool {
        let id = self.handle.id.clone();
        match msg {
            Some(Ok(Message::Text(text))) => {
                trace!(connection_id = %id, len = text.len(), "Received text frame");
                self.handler.on_message(&self.handle, text.as_bytes()).await;
                true
            }
            Some(Ok(Message::Binary(data))) => {
                trace!(connection_id = %id, len = data.len(), "Received binary frame");
                self.handler.on_message(&self.handle, &data).await;
                true
            }
            Some(Ok(Message::Ping(data))) => {
                trace!(connection_id = %id, "Received ping, sending pong");
                let _ = self.ws_tx.send(Message::Pong(data)).await;
                true
            }
            Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => true,
            Some(Ok(Message::Close(frame))) => {
                info!(connection_id = %id, frame = ?frame, "Server closed connection");
                false
            }
            Some(Err(e)) => {
                warn!(connection_id = %id, error = %e, "WebSocket error");
                self.handler.on_error(&id, &e.to_string()).await;
                false
            }
            None => {
                info!(connection_id = %id, "WebSocket stream ended");
                false
            }
        }
    }
}

/// Connects to a WebSocket server.
///
/// Performs the initial connection, notifies the handler, then spawns a
/// background loop that writes queued frames and forwards received ones.
/// The connection is not re-established once lost; the handler's
/// `on_disconnect` is called exactly once when the loop ends.
pub async fn ws_connect(
    config: WsClientConfig,
    handler: Arc<dyn ConnectionHandler>,
) -> TransportResult<ConnectionHandle> {
    let (message_tx, mut message_rx) = mpsc::channel::<Vec<u8>>(config.buffer.max(1));
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    info!(url = %config.url, "Connecting to WebSocket server");

    let (ws_stream, _response) =
        connect_async(&config.url)
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                url: config.url.clone(),
                reason: format!("WebSocket connection failed: {e}"),
            })?;

    info!(connection_id = %config.connection_id, url = %config.url, "WebSocket client connected");

    let handle = ConnectionHandle::new(config.connection_id.clone(), message_tx, shutdown_tx);
    let info = ConnectionInfo::new("websocket").with_metadata("url", &config.url);
    handler.on_connect(info, handle.clone()).await;

    let (ws_tx, ws_rx) = ws_stream.split();
    let mut state = ClientLoopState {
        handler,
        handle: handle.clone(),
        ws_tx,
        ws_rx,
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(connection_id = %state.handle.id, "WebSocket client shutting down");
                        let _ = state.ws_tx.close().await;
                        break;
                    }
                }

                Some(data) = message_rx.recv() => {
                    let msg = Message::Text(String::from_utf8_lossy(&data).into_owned().into());
                    if let Err(e) = state.ws_tx.send(msg).await {
                        warn!(connection_id = %state.handle.id, error = %e, "Failed to send frame");
                    }
                }

                msg = state.ws_rx.next() => {
                    if !state.handle_message(msg).await {
                        break;
                    }
                }
            }
        }
        state.handler.on_disconnect(&state.handle.id).await;
    });

    Ok(handle)
}
