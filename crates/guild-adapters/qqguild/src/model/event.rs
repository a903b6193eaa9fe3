//! Inbound message payloads and the events published to the framework.
//!
//! ```text
//! MessageEvent (message, message.group | message.private)
//! ConnectEvent (connect, connect.<id>)
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use guild_core::{ApiResult, Event, Message};

use crate::bot::GuildBot;
use crate::composer::SendResult;
use crate::handle::{FriendHandle, GroupHandle, MemberHandle};
use crate::model::api::User;
use crate::model::message::{CanonicalMessage, MessageType, OutboundMessage};
use crate::registry::FriendEntry;

/// Platform name reported by every event of this adapter.
pub const PLATFORM: &str = "qqguild";

// ============================================================================
// Wire payloads
// ============================================================================

/// `d` of a message dispatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub author: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<PayloadMember>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReference>,
    /// Guild the direct message session was opened from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_guild_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

/// Member info embedded in a message payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayloadMember {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<String>,
}

/// A file attached to a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// The message a payload replies to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageReference {
    pub message_id: String,
    #[serde(default)]
    pub ignore_get_message_error: bool,
}

// ============================================================================
// MessageEvent
// ============================================================================

/// A normalized inbound message, published as `message.<type>` and `message`.
#[derive(Clone)]
pub struct MessageEvent {
    bot: Arc<GuildBot>,
    message: CanonicalMessage,
}

impl fmt::Debug for MessageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEvent")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl MessageEvent {
    pub(crate) fn new(bot: Arc<GuildBot>, message: CanonicalMessage) -> Self {
        Self { bot, message }
    }

    /// Returns the receiving account.
    pub fn bot(&self) -> &Arc<GuildBot> {
        &self.bot
    }

    /// Returns the normalized message.
    pub fn message(&self) -> &CanonicalMessage {
        &self.message
    }

    pub fn message_type(&self) -> MessageType {
        self.message.message_type
    }

    pub fn is_group(&self) -> bool {
        self.message.message_type == MessageType::Group
    }

    /// Concatenated text segments.
    pub fn plain_text(&self) -> String {
        self.message.extract_plain_text()
    }

    pub fn raw_message(&self) -> &str {
        &self.message.raw_message
    }

    /// Replies in the same channel or direct message session.
    ///
    /// The reply references the triggering message unless the outbound
    /// message carries its own `reply` segment. Returns `None` when a direct
    /// reply cannot be routed.
    pub async fn reply(&self, message: impl Into<OutboundMessage>) -> ApiResult<Option<SendResult>> {
        let msg = &self.message;
        let reference = Some(msg.message_id.clone());
        match msg.message_type {
            MessageType::Group => self
                .bot
                .send_group_msg(&msg.channel_id, reference, message.into())
                .await
                .map(Some),
            MessageType::Private => {
                let friend = FriendEntry {
                    guild_id: Some(msg.guild_id.clone()),
                    channel_id: Some(msg.channel_id.clone()),
                    ..FriendEntry::new(&msg.user_id)
                };
                self.bot
                    .send_friend_msg(&friend, reference, message.into())
                    .await
            }
        }
    }

    /// Handle of the sender.
    pub fn friend(&self) -> FriendHandle {
        self.bot.pick_friend(&self.message.user_id)
    }

    /// Handle of the channel, for group messages.
    pub fn group(&self) -> Option<GroupHandle> {
        self.is_group()
            .then(|| self.bot.pick_group(&self.message.group_id))
    }

    /// Handle of the sender as a channel member, for group messages.
    pub fn member(&self) -> Option<MemberHandle> {
        self.is_group()
            .then(|| self.bot.pick_member(&self.message.group_id, &self.message.user_id))
    }
}

impl Event for MessageEvent {
    fn event_name(&self) -> &'static str {
        match self.message.message_type {
            MessageType::Group => "message.group",
            MessageType::Private => "message.private",
        }
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn bot_id(&self) -> Option<&str> {
        Some(&self.message.self_id)
    }
}

// ============================================================================
// ConnectEvent
// ============================================================================

/// Published as `connect.<id>` and `connect` once an account is live.
#[derive(Clone)]
pub struct ConnectEvent {
    bot: Arc<GuildBot>,
}

impl fmt::Debug for ConnectEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectEvent")
            .field("bot_id", &self.bot.id())
            .finish()
    }
}

impl ConnectEvent {
    pub(crate) fn new(bot: Arc<GuildBot>) -> Self {
        Self { bot }
    }

    /// Returns the connected account.
    pub fn bot(&self) -> &Arc<GuildBot> {
        &self.bot
    }
}

impl Event for ConnectEvent {
    fn event_name(&self) -> &'static str {
        "connect"
    }

    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn bot_id(&self) -> Option<&str> {
        Some(self.bot.id())
    }
}
