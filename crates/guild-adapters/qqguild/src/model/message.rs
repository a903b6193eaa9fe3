//! Outbound and canonical message types.
//!
//! [`OutboundMessage`] is what callers hand to `send_msg`. It is parsed once,
//! at the API boundary, from whatever JSON shape the caller produced;
//! [`CanonicalMessage`] is what inbound events are normalized into.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use guild_core::Message;

use crate::model::segment::Segment;

// ============================================================================
// OutboundMessage
// ============================================================================

/// An ordered list of segments to send.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundMessage(Vec<Segment>);

impl OutboundMessage {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an outbound message from any JSON shape.
    ///
    /// - a string is one text segment
    /// - an array contributes one segment per element
    /// - `{"type": .., "data": {..}}` is taken as is
    /// - `{"type": .., <flat fields>}` is folded into `data`
    ///
    /// Everything else, including segments with an unknown type or invalid
    /// data, becomes a text segment holding the element's JSON serialization.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Self(items.into_iter().map(parse_segment).collect()),
            other => Self(vec![parse_segment(other)]),
        }
    }

    /// Appends a segment.
    pub fn push(&mut self, segment: Segment) {
        self.0.push(segment);
    }

    /// Appends a segment, builder style.
    pub fn with(mut self, segment: Segment) -> Self {
        self.0.push(segment);
        self
    }

    /// Returns the segments.
    pub fn into_segments(self) -> Vec<Segment> {
        self.0
    }
}

fn parse_segment(value: Value) -> Segment {
    match value {
        Value::String(text) => Segment::text(text),
        Value::Object(map) => coerce_object(&map).unwrap_or_else(|| {
            Segment::text(Value::Object(map).to_string())
        }),
        other => Segment::text(other.to_string()),
    }
}

fn coerce_object(map: &Map<String, Value>) -> Option<Segment> {
    let kind = map.get("type")?.as_str()?;
    let data = match map.get("data") {
        Some(data) => data.clone(),
        None => Value::Object(
            map.iter()
                .filter(|(key, _)| key.as_str() != "type")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
    };
    let mut tagged = Map::new();
    tagged.insert("type".to_string(), Value::String(kind.to_string()));
    tagged.insert("data".to_string(), data);
    serde_json::from_value(Value::Object(tagged)).ok()
}

impl Message for OutboundMessage {
    type Segment = Segment;

    fn segments(&self) -> &[Segment] {
        &self.0
    }
}

impl Serialize for OutboundMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OutboundMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

impl From<Segment> for OutboundMessage {
    fn from(segment: Segment) -> Self {
        Self(vec![segment])
    }
}

impl From<Vec<Segment>> for OutboundMessage {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl From<&str> for OutboundMessage {
    fn from(text: &str) -> Self {
        Self(vec![Segment::text(text)])
    }
}

impl From<String> for OutboundMessage {
    fn from(text: String) -> Self {
        Self(vec![Segment::text(text)])
    }
}

impl From<Value> for OutboundMessage {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl FromIterator<Segment> for OutboundMessage {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// CanonicalMessage
// ============================================================================

/// Whether a message came from a channel or a direct message session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Group,
    Private,
}

impl MessageType {
    /// Returns the name used in event names (`message.<type>`).
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Group => "group",
            MessageType::Private => "private",
        }
    }
}

/// Sender of a canonical message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Namespaced user id.
    pub user_id: String,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
    /// Guild nickname, when the message carried member info.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
    /// Guild role ids of the sender.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

/// An inbound message normalized into segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    /// Receiving account id.
    pub self_id: String,
    pub message_type: MessageType,
    pub message_id: String,
    /// Namespaced sender id.
    pub user_id: String,
    pub sender: Sender,
    pub guild_id: String,
    pub channel_id: String,
    /// `<guild>-<channel>`.
    pub group_id: String,
    /// Guild the direct message session was opened from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_guild_id: Option<String>,
    pub timestamp: String,
    pub message: Vec<Segment>,
    /// Flattened display string.
    pub raw_message: String,
}

impl Message for CanonicalMessage {
    type Segment = Segment;

    fn segments(&self) -> &[Segment] {
        &self.message
    }
}
