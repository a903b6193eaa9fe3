//! REST API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use guild_transport::MultipartForm;

// ============================================================================
// Response Types
// ============================================================================

/// A platform user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub union_openid: Option<String>,
}

impl User {
    /// Overlays the non-empty fields of `other` onto `self`.
    pub fn merge(&mut self, other: User) {
        if !other.id.is_empty() {
            self.id = other.id;
        }
        if !other.username.is_empty() {
            self.username = other.username;
        }
        if other.avatar.is_some() {
            self.avatar = other.avatar;
        }
        self.bot |= other.bot;
        if other.union_openid.is_some() {
            self.union_openid = other.union_openid;
        }
    }
}

/// A guild ("频道").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub owner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_members: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<String>,
}

/// A sub-channel ("子频道") of a guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub guild_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

/// A guild member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<String>,
}

/// A direct message session opened through `POST /users/@me/dms`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmsSession {
    pub guild_id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
}

/// Response of `GET /gateway`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayInfo {
    pub url: String,
}

/// Response of a message post.
///
/// Only `id` is interpreted; every other field is kept as returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SentMessage {
    /// Creates a record for a message with the given id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            extra: Map::new(),
        }
    }
}

// ============================================================================
// Message Body
// ============================================================================

/// An uploaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Body of one message post.
///
/// Serialized as JSON unless it carries `file_image`, in which case it is sent
/// as `multipart/form-data`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    #[serde(skip)]
    pub file_image: Option<FileImage>,
}

impl MessageBody {
    /// Returns true if the body must be sent as multipart.
    pub fn is_multipart(&self) -> bool {
        self.file_image.is_some()
    }

    /// Converts the body into a multipart form.
    pub fn into_multipart(self) -> MultipartForm {
        let mut form = MultipartForm::new();
        if let Some(content) = self.content {
            form = form.text("content", content);
        }
        if let Some(image) = self.image {
            form = form.text("image", image);
        }
        if let Some(msg_id) = self.msg_id {
            form = form.text("msg_id", msg_id);
        }
        if let Some(file) = self.file_image {
            form = form.file("file_image", file.filename, file.bytes);
        }
        form
    }

    /// Short description used in log lines; image bytes are never printed.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(content) = &self.content {
            parts.push(format!("content={content:?}"));
        }
        if let Some(image) = &self.image {
            parts.push(format!("image={image}"));
        }
        if let Some(file) = &self.file_image {
            parts.push(format!("file_image=<{} bytes>", file.bytes.len()));
        }
        if let Some(msg_id) = &self.msg_id {
            parts.push(format!("msg_id={msg_id}"));
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body_json_skips_empty_fields() {
        let body = MessageBody {
            content: Some("hi".into()),
            msg_id: Some("m1".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"content": "hi", "msg_id": "m1"}));
        assert!(!body.is_multipart());
    }

    #[test]
    fn test_message_body_multipart() {
        let body = MessageBody {
            content: Some("caption".into()),
            msg_id: Some("m1".into()),
            file_image: Some(FileImage {
                filename: "image.png".into(),
                bytes: vec![1, 2, 3],
            }),
            ..Default::default()
        };
        assert!(body.is_multipart());
        let form = body.into_multipart();
        assert_eq!(form.field("content"), Some("caption"));
        assert_eq!(form.field("msg_id"), Some("m1"));
        assert_eq!(form.files.len(), 1);
        assert_eq!(form.files[0].name, "file_image");
    }

    #[test]
    fn test_sent_message_keeps_extra_fields() {
        let raw = r#"{"id":"abc","channel_id":"c1","seq":3}"#;
        let sent: SentMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(sent.id.as_deref(), Some("abc"));
        assert_eq!(sent.extra["channel_id"], "c1");
    }

    #[test]
    fn test_user_merge() {
        let mut user = User {
            id: "1".into(),
            username: "ready-name".into(),
            ..Default::default()
        };
        user.merge(User {
            username: "me-name".into(),
            avatar: Some("https://a".into()),
            ..Default::default()
        });
        assert_eq!(user.id, "1");
        assert_eq!(user.username, "me-name");
        assert_eq!(user.avatar.as_deref(), Some("https://a"));
    }
}
