//! Connection handling and lifecycle types.
//!
//! The transport layer owns sockets; adapters implement [`ConnectionHandler`]
//! to receive frames and use the [`ConnectionHandle`] to write back.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::error::{TransportError, TransportResult};

/// A handler for connection lifecycle events.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// Called once the socket is open, before any frame is received.
    async fn on_connect(&self, _info: ConnectionInfo, _connection: ConnectionHandle) {}

    /// Called for every text or binary frame received.
    async fn on_message(&self, connection: &ConnectionHandle, data: &[u8]);

    /// Called when the connection is closed.
    async fn on_disconnect(&self, connection_id: &str);

    /// Called when a connection error occurs.
    async fn on_error(&self, connection_id: &str, error: &str);
}

/// Information about a connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Connection protocol (ws, http, etc.).
    pub protocol: String,
    /// Additional metadata.
    pub metadata: HashMap<String, String>,
}

impl ConnectionInfo {
    /// Creates new connection info.
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            metadata: HashMap::new(),
        }
    }

    /// Adds metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Handle to a client connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Identifier for this connection.
    pub id: String,
    /// Sender for outgoing frames.
    message_tx: mpsc::Sender<Vec<u8>>,
    /// Shutdown signal sender.
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    /// Creates a new connection handle.
    pub fn new(
        id: impl Into<String>,
        message_tx: mpsc::Sender<Vec<u8>>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            id: id.into(),
            message_tx,
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Sends a frame through this connection.
    pub async fn send(&self, data: Vec<u8>) -> TransportResult<()> {
        self.message_tx
            .send(data)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    /// Sends a JSON frame.
    pub async fn send_json(&self, value: &Value) -> TransportResult<()> {
        let data = serde_json::to_vec(value)
            .map_err(|e| TransportError::SendFailed(format!("JSON serialization failed: {e}")))?;
        self.send(data).await
    }

    /// Returns true once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Closes this connection.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
