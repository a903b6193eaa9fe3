//! Gateway session.
//!
//! [`GatewaySession`] speaks the gateway protocol over a connection opened by
//! the transport layer:
//!
//! ```text
//! Hello (op 10) ──▶ Identify (op 2) ──▶ READY ──▶ Dispatch (op 0) ...
//!                   └─ heartbeat every heartbeat_interval (op 1, ack op 11)
//! ```
//!
//! `READY` is delivered once through a oneshot channel; every other dispatch
//! is queued for the account's dispatch loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use guild_core::{ConnectionHandle, ConnectionHandler, ConnectionInfo};

use crate::config::AccountToken;
use crate::model::gateway::{DispatchKind, Hello, Payload, Ready, opcode};

/// Capacity of the dispatch queue.
const DISPATCH_BUFFER: usize = 256;

/// A dispatch (op 0) other than `READY`.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub kind: DispatchKind,
    pub seq: Option<u64>,
    pub data: Value,
}

/// Receivers handed to the adapter when a session is created.
pub struct SessionChannels {
    pub ready: oneshot::Receiver<Ready>,
    pub dispatches: mpsc::Receiver<Dispatch>,
}

/// Gateway protocol state of one account.
pub struct GatewaySession {
    app_id: String,
    authorization: String,
    intents: u32,
    last_seq: Arc<Mutex<Option<u64>>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    ready_tx: Mutex<Option<oneshot::Sender<Ready>>>,
    dispatch_tx: mpsc::Sender<Dispatch>,
}

impl GatewaySession {
    /// Creates a session identifying with `token`.
    pub fn new(token: &AccountToken) -> (Self, SessionChannels) {
        let (ready_tx, ready) = oneshot::channel();
        let (dispatch_tx, dispatches) = mpsc::channel(DISPATCH_BUFFER);
        let session = Self {
            app_id: token.app_id.clone(),
            authorization: token.authorization(),
            intents: token.intents(),
            last_seq: Arc::new(Mutex::new(None)),
            heartbeat: Mutex::new(None),
            ready_tx: Mutex::new(Some(ready_tx)),
            dispatch_tx,
        };
        (session, SessionChannels { ready, dispatches })
    }

    /// Returns the last dispatch sequence number seen.
    pub fn last_seq(&self) -> Option<u64> {
        *self.last_seq.lock()
    }

    async fn on_hello(&self, connection: &ConnectionHandle, hello: Hello) {
        let identify = Payload::identify(&self.authorization, self.intents);
        if let Err(e) = send_payload(connection, &identify).await {
            warn!(app_id = %self.app_id, error = %e, "Failed to send identify");
            return;
        }
        debug!(app_id = %self.app_id, intents = self.intents, "Sent identify");

        let interval = Duration::from_millis(hello.heartbeat_interval.max(1));
        let connection = connection.clone();
        let app_id = self.app_id.clone();
        let last_seq = Arc::clone(&self.last_seq);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if connection.is_closed() {
                    break;
                }
                let frame = Payload::heartbeat(*last_seq.lock());
                if let Err(e) = send_payload(&connection, &frame).await {
                    warn!(app_id = %app_id, error = %e, "Heartbeat failed, stopping");
                    break;
                }
                trace!(app_id = %app_id, "Sent heartbeat");
            }
        });
        if let Some(previous) = self.heartbeat.lock().replace(task) {
            previous.abort();
        }
    }

    async fn on_dispatch(&self, payload: Payload) {
        if let Some(seq) = payload.s {
            *self.last_seq.lock() = Some(seq);
        }
        let Some(t) = payload.t.as_deref() else {
            warn!(app_id = %self.app_id, "Dispatch without event type");
            return;
        };
        let kind = DispatchKind::parse(t);
        if kind == DispatchKind::Ready {
            match serde_json::from_value::<Ready>(payload.d) {
                Ok(ready) => {
                    info!(
                        app_id = %self.app_id,
                        bot_id = %ready.user.id,
                        session_id = %ready.session_id,
                        "Gateway ready"
                    );
                    if let Some(tx) = self.ready_tx.lock().take() {
                        let _ = tx.send(ready);
                    }
                }
                Err(e) => warn!(app_id = %self.app_id, error = %e, "Malformed READY payload"),
            }
            return;
        }

        let dispatch = Dispatch {
            kind,
            seq: payload.s,
            data: payload.d,
        };
        if self.dispatch_tx.send(dispatch).await.is_err() {
            debug!(app_id = %self.app_id, event = t, "Dispatch loop gone, dropping event");
        }
    }
}

async fn send_payload(connection: &ConnectionHandle, payload: &Payload) -> anyhow::Result<()> {
    let value = serde_json::to_value(payload)?;
    connection.send_json(&value).await?;
    Ok(())
}

#[async_trait]
impl ConnectionHandler for GatewaySession {
    async fn on_connect(&self, info: ConnectionInfo, connection: ConnectionHandle) {
        info!(
            app_id = %self.app_id,
            connection_id = %connection.id,
            url = ?info.metadata.get("url"),
            "Gateway connected"
        );
    }

    async fn on_message(&self, connection: &ConnectionHandle, data: &[u8]) {
        let payload: Payload = match serde_json::from_slice(data) {
            Ok(p) => p,
            Err(e) => {
                warn!(app_id = %self.app_id, error = %e, "Invalid gateway frame");
                return;
            }
        };

        match payload.op {
            opcode::HELLO => match serde_json::from_value::<Hello>(payload.d) {
                Ok(hello) => self.on_hello(connection, hello).await,
                Err(e) => warn!(app_id = %self.app_id, error = %e, "Malformed hello"),
            },
            opcode::DISPATCH => self.on_dispatch(payload).await,
            opcode::HEARTBEAT_ACK => trace!(app_id = %self.app_id, "Heartbeat acknowledged"),
            opcode::RECONNECT => {
                warn!(app_id = %self.app_id, "Gateway requested reconnect");
            }
            opcode::INVALID_SESSION => {
                warn!(app_id = %self.app_id, "Gateway rejected the session");
                connection.close();
            }
            op => debug!(app_id = %self.app_id, op, "Ignoring gateway opcode"),
        }
    }

    async fn on_disconnect(&self, connection_id: &str) {
        if let Some(task) = self.heartbeat.lock().take() {
            task.abort();
        }
        self.ready_tx.lock().take();
        warn!(app_id = %self.app_id, connection_id, "Gateway disconnected");
    }

    async fn on_error(&self, connection_id: &str, error: &str) {
        warn!(app_id = %self.app_id, connection_id, error, "Gateway connection error");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::watch;

    use super::*;

    fn connection() -> (ConnectionHandle, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(16);
        let (shutdown_tx, _) = watch::channel(false);
        (ConnectionHandle::new("test", tx, shutdown_tx), rx)
    }

    fn frame(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[tokio::test]
    async fn test_hello_sends_identify() {
        let token: AccountToken = "0:0:42:secret".parse().unwrap();
        let (session, _channels) = GatewaySession::new(&token);
        let (conn, mut sent) = connection();

        session
            .on_message(&conn, &frame(json!({"op": 10, "d": {"heartbeat_interval": 45000}})))
            .await;

        let identify: Value = serde_json::from_slice(&sent.recv().await.unwrap()).unwrap();
        assert_eq!(identify["op"], 2);
        assert_eq!(identify["d"]["token"], "Bot 42.secret");
        assert_eq!(identify["d"]["intents"], token.intents());
        session.on_disconnect("test").await;
    }

    #[tokio::test]
    async fn test_ready_and_dispatch_routing() {
        let token: AccountToken = "0:1:42:secret".parse().unwrap();
        let (session, mut channels) = GatewaySession::new(&token);
        let (conn, _sent) = connection();

        let ready = json!({
            "op": 0, "s": 1, "t": "READY",
            "d": {"version": 1, "session_id": "s1", "user": {"id": "b1", "username": "bot", "bot": true}, "shard": [0, 1]}
        });
        session.on_message(&conn, &frame(ready)).await;
        let ready = channels.ready.await.unwrap();
        assert_eq!(ready.user.id, "b1");

        let message = json!({"op": 0, "s": 2, "t": "AT_MESSAGE_CREATE", "d": {"id": "m1"}});
        session.on_message(&conn, &frame(message)).await;
        let dispatch = channels.dispatches.recv().await.unwrap();
        assert_eq!(dispatch.kind, DispatchKind::AtMessageCreate);
        assert_eq!(dispatch.data["id"], "m1");
        assert_eq!(session.last_seq(), Some(2));
    }

    #[tokio::test]
    async fn test_disconnect_before_ready_drops_sender() {
        let token: AccountToken = "0:1:42:secret".parse().unwrap();
        let (session, channels) = GatewaySession::new(&token);
        session.on_disconnect("test").await;
        assert!(channels.ready.await.is_err());
    }

    #[tokio::test]
    async fn test_garbage_frame_is_ignored() {
        let token: AccountToken = "0:1:42:secret".parse().unwrap();
        let (session, _channels) = GatewaySession::new(&token);
        let (conn, mut sent) = connection();
        session.on_message(&conn, b"not json").await;
        session.on_message(&conn, &frame(json!({"op": 11}))).await;
        assert!(sent.try_recv().is_err());
    }
}
