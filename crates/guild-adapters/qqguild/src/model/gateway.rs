//! Gateway wire frames.
//!
//! Every frame is `{"op": .., "d": .., "s": .., "t": ..}`; `s` and `t` are only
//! present on dispatches (`op = 0`).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::model::api::User;

/// Gateway opcodes.
pub mod opcode {
    /// Server pushes an event.
    pub const DISPATCH: u8 = 0;
    /// Client heartbeat.
    pub const HEARTBEAT: u8 = 1;
    /// Client authentication.
    pub const IDENTIFY: u8 = 2;
    /// Client session resume.
    pub const RESUME: u8 = 6;
    /// Server asks the client to reconnect.
    pub const RECONNECT: u8 = 7;
    /// Identify or resume was rejected.
    pub const INVALID_SESSION: u8 = 9;
    /// First frame after connecting.
    pub const HELLO: u8 = 10;
    /// Heartbeat acknowledged.
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Intent bits requested at identify time.
pub mod intents {
    pub const GUILDS: u32 = 1 << 0;
    pub const GUILD_MEMBERS: u32 = 1 << 1;
    pub const GUILD_MESSAGES: u32 = 1 << 9;
    pub const GUILD_MESSAGE_REACTIONS: u32 = 1 << 10;
    pub const DIRECT_MESSAGE: u32 = 1 << 12;
    pub const OPEN_FORUMS_EVENT: u32 = 1 << 18;
    pub const INTERACTION: u32 = 1 << 26;
    pub const MESSAGE_AUDIT: u32 = 1 << 27;
    pub const FORUMS_EVENT: u32 = 1 << 28;
    pub const PUBLIC_GUILD_MESSAGES: u32 = 1 << 30;
}

/// A raw gateway frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl Payload {
    /// Builds the identify frame.
    pub fn identify(authorization: &str, intents: u32) -> Self {
        Self {
            op: opcode::IDENTIFY,
            d: json!({
                "token": authorization,
                "intents": intents,
                "shard": [0, 1],
                "properties": {
                    "$os": std::env::consts::OS,
                    "$browser": env!("CARGO_PKG_NAME"),
                    "$device": env!("CARGO_PKG_NAME"),
                },
            }),
            s: None,
            t: None,
        }
    }

    /// Builds a heartbeat frame carrying the last received sequence number.
    pub fn heartbeat(last_seq: Option<u64>) -> Self {
        Self {
            op: opcode::HEARTBEAT,
            d: last_seq.map_or(Value::Null, Value::from),
            s: None,
            t: None,
        }
    }
}

/// `d` of the hello frame.
#[derive(Debug, Clone, Deserialize)]
pub struct Hello {
    /// Milliseconds between heartbeats.
    pub heartbeat_interval: u64,
}

/// `d` of the `READY` dispatch.
#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub session_id: String,
    pub user: User,
    #[serde(default)]
    pub shard: Vec<u32>,
}

/// Dispatch event types the adapter reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchKind {
    Ready,
    MessageCreate,
    AtMessageCreate,
    DirectMessageCreate,
    MessageDelete,
    PublicMessageDelete,
    DirectMessageDelete,
    Other(String),
}

impl DispatchKind {
    /// Parses the `t` field of a dispatch.
    pub fn parse(t: &str) -> Self {
        match t {
            "READY" => Self::Ready,
            "MESSAGE_CREATE" => Self::MessageCreate,
            "AT_MESSAGE_CREATE" => Self::AtMessageCreate,
            "DIRECT_MESSAGE_CREATE" => Self::DirectMessageCreate,
            "MESSAGE_DELETE" => Self::MessageDelete,
            "PUBLIC_MESSAGE_DELETE" => Self::PublicMessageDelete,
            "DIRECT_MESSAGE_DELETE" => Self::DirectMessageDelete,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true for the deletion notifications.
    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            Self::MessageDelete | Self::PublicMessageDelete | Self::DirectMessageDelete
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dispatch_frame() {
        let raw = r#"{"op":0,"s":42,"t":"AT_MESSAGE_CREATE","d":{"id":"m1"}}"#;
        let payload: Payload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.op, opcode::DISPATCH);
        assert_eq!(payload.s, Some(42));
        assert_eq!(
            DispatchKind::parse(payload.t.as_deref().unwrap()),
            DispatchKind::AtMessageCreate
        );
    }

    #[test]
    fn test_heartbeat_frame() {
        let frame = serde_json::to_value(Payload::heartbeat(Some(7))).unwrap();
        assert_eq!(frame, json!({"op": 1, "d": 7}));
        let frame = serde_json::to_value(Payload::heartbeat(None)).unwrap();
        assert_eq!(frame, json!({"op": 1, "d": null}));
    }

    #[test]
    fn test_identify_frame() {
        let frame = Payload::identify("Bot 1.secret", 513);
        assert_eq!(frame.op, opcode::IDENTIFY);
        assert_eq!(frame.d["token"], "Bot 1.secret");
        assert_eq!(frame.d["intents"], 513);
        assert_eq!(frame.d["shard"], json!([0, 1]));
    }
}
