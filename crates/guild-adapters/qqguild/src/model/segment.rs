//! Canonical message segments.
//!
//! A segment is a single unit of content. Segments serialize as
//! `{"type": .., "data": {..}}`:
//!
//! - `text` → `{"text": "..."}`
//! - `image` → `{"file": "base64://...", "url": "..."}`
//! - `face` → `{"id": "..."}`
//! - `at` → `{"qq": "..."}` (`"all"` mentions everyone)
//! - `reply` → `{"id": "..."}`
//! - `node` → `[{"message": .., "user_id": .., "nickname": ..}]`
//! - `attachment` → `{"kind": "video", "url": "...", ...}` (inbound only)
//! - `button` → opaque, never sent
//!
//! # Example
//!
//! ```rust,ignore
//! use guild_adapter_qqguild::Segment;
//!
//! let message = vec![
//!     Segment::reply("08e0b5d1..."),
//!     Segment::at("123"),
//!     Segment::text(" hello"),
//!     Segment::image("https://example.com/a.png"),
//! ];
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use guild_core::MessageSegment;

use crate::model::message::OutboundMessage;

// ============================================================================
// Segment Enum
// ============================================================================

/// A canonical message segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text.
    Text(TextData),
    /// Image by reference.
    Image(ImageData),
    /// Platform emoji.
    Face(FaceData),
    /// Mention.
    At(AtData),
    /// Reference to the message being replied to.
    Reply(ReplyData),
    /// Forwarded batch, sent as one message per node.
    Node(Vec<ForwardNode>),
    /// Non-image attachment of an inbound message.
    Attachment(AttachmentData),
    /// Interactive button, unsupported on this platform.
    Button(Value),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Text(data) => f.write_str(&data.text),
            Segment::Image(data) => {
                write!(f, "[图片：{}]", data.url.as_deref().unwrap_or(abbreviate(&data.file)))
            }
            Segment::Face(data) => write!(f, "[表情：{}]", data.id),
            Segment::At(data) if data.is_all() => f.write_str("[提及：全体成员]"),
            Segment::At(data) => write!(f, "[提及：{}]", data.qq),
            Segment::Reply(data) => write!(f, "[回复：{}]", data.id),
            Segment::Node(nodes) => write!(f, "[转发消息：{}条]", nodes.len()),
            Segment::Attachment(data) => match data.kind {
                AttachmentKind::Video => write!(f, "[视频：{}]", data.url),
                AttachmentKind::Audio => write!(f, "[语音：{}]", data.url),
                AttachmentKind::File => {
                    write!(f, "[文件：{}]", data.filename.as_deref().unwrap_or(&data.url))
                }
            },
            Segment::Button(_) => f.write_str("[按钮]"),
        }
    }
}

/// Shortens inline base64 payloads for display and logging.
pub fn abbreviate(file: &str) -> &str {
    if file.starts_with("base64://") {
        "base64://..."
    } else {
        file
    }
}

impl MessageSegment for Segment {
    fn segment_type(&self) -> &str {
        match self {
            Segment::Text(_) => "text",
            Segment::Image(_) => "image",
            Segment::Face(_) => "face",
            Segment::At(_) => "at",
            Segment::Reply(_) => "reply",
            Segment::Node(_) => "node",
            Segment::Attachment(_) => "attachment",
            Segment::Button(_) => "button",
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Segment::Text(data) => Some(&data.text),
            _ => None,
        }
    }
}

// ============================================================================
// Segment Builder Methods
// ============================================================================

impl Segment {
    /// Creates a text segment.
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text(TextData { text: text.into() })
    }

    /// Creates an image segment from a `base64://` payload, a local path or a URL.
    pub fn image(file: impl Into<String>) -> Self {
        Segment::Image(ImageData {
            file: file.into(),
            url: None,
        })
    }

    /// Creates an image segment from raw bytes.
    pub fn image_bytes(bytes: &[u8]) -> Self {
        use base64::Engine;
        Self::image(format!(
            "base64://{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        ))
    }

    /// Creates an emoji segment.
    pub fn face(id: impl Into<String>) -> Self {
        Segment::Face(FaceData { id: id.into() })
    }

    /// Creates a mention segment.
    pub fn at(qq: impl Into<String>) -> Self {
        Segment::At(AtData { qq: qq.into() })
    }

    /// Creates a mention of everyone.
    pub fn at_all() -> Self {
        Self::at(AtData::ALL)
    }

    /// Creates a reply segment.
    pub fn reply(id: impl Into<String>) -> Self {
        Segment::Reply(ReplyData { id: id.into() })
    }

    /// Creates a forwarded batch.
    pub fn node(nodes: Vec<ForwardNode>) -> Self {
        Segment::Node(nodes)
    }
}

// ============================================================================
// Segment Data Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    /// `base64://<data>`, `file://<path>`, an absolute path or a URL.
    pub file: String,
    /// Resolved URL of an inbound image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceData {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtData {
    #[serde(deserialize_with = "id_string")]
    pub qq: String,
}

impl AtData {
    /// Sentinel target mentioning everyone.
    pub const ALL: &'static str = "all";

    /// Returns true if this mentions everyone.
    pub fn is_all(&self) -> bool {
        self.qq == Self::ALL
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyData {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
}

/// One message of a forwarded batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardNode {
    pub message: OutboundMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl ForwardNode {
    /// Creates an anonymous node.
    pub fn new(message: impl Into<OutboundMessage>) -> Self {
        Self {
            message: message.into(),
            user_id: None,
            nickname: None,
        }
    }
}

/// Coarse type of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Video,
    Audio,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentData {
    pub kind: AttachmentKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Accepts ids given either as strings or as numbers.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
