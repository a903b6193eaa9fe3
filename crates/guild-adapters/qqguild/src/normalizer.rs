//! Inbound normalizer.
//!
//! Converts a raw message payload into a [`CanonicalMessage`] and records the
//! sender in the entity registry.

use guild_core::Message;

use crate::codec::{decode_content, make_group_id, namespace_user};
use crate::model::event::{Attachment, MessagePayload};
use crate::model::message::{CanonicalMessage, MessageType, Sender};
use crate::model::segment::{AttachmentData, AttachmentKind, ImageData, Segment};
use crate::registry::{EntityRegistry, FriendEntry};

/// Account-level inputs of normalization.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// Receiving account id.
    pub self_id: &'a str,
    /// Namespace prefix for user ids.
    pub id_prefix: &'a str,
}

/// Normalizes a message payload.
pub fn normalize(
    raw: &MessagePayload,
    message_type: MessageType,
    ctx: NormalizeContext<'_>,
) -> CanonicalMessage {
    let user_id = namespace_user(ctx.id_prefix, &raw.author.id);

    let mut segments = Vec::new();
    if let Some(reference) = &raw.message_reference {
        segments.push(Segment::reply(&reference.message_id));
    }
    segments.extend(decode_content(&raw.content, ctx.id_prefix));
    segments.extend(raw.attachments.iter().map(attachment_segment));

    let sender = Sender {
        user_id: user_id.clone(),
        nickname: raw.author.username.clone(),
        avatar: raw.author.avatar.clone(),
        bot: raw.author.bot,
        card: raw.member.as_ref().and_then(|m| m.nick.clone()),
        roles: raw
            .member
            .as_ref()
            .map(|m| m.roles.clone())
            .unwrap_or_default(),
    };

    let mut message = CanonicalMessage {
        self_id: ctx.self_id.to_string(),
        message_type,
        message_id: raw.id.clone(),
        user_id,
        sender,
        guild_id: raw.guild_id.clone(),
        channel_id: raw.channel_id.clone(),
        group_id: make_group_id(&raw.guild_id, &raw.channel_id),
        src_guild_id: match message_type {
            MessageType::Private => raw.src_guild_id.clone(),
            MessageType::Group => None,
        },
        timestamp: raw.timestamp.clone(),
        message: segments,
        raw_message: String::new(),
    };
    message.raw_message = message.display();
    message
}

/// Maps an attachment to a segment by its declared content type.
pub fn attachment_segment(attachment: &Attachment) -> Segment {
    let url = normalize_url(&attachment.url);
    let content_type = attachment.content_type.as_deref().unwrap_or_default();
    let kind = match content_type.split('/').next().unwrap_or_default() {
        "image" => {
            return Segment::Image(ImageData {
                file: attachment.filename.clone().unwrap_or_else(|| url.clone()),
                url: Some(url),
            });
        }
        "video" => AttachmentKind::Video,
        "audio" | "voice" => AttachmentKind::Audio,
        _ => AttachmentKind::File,
    };
    Segment::Attachment(AttachmentData {
        kind,
        url,
        filename: attachment.filename.clone(),
        size: attachment.size,
    })
}

/// Prefixes scheme-less attachment URLs with `https://`.
pub fn normalize_url(url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!("https://{url}")
    }
}

/// Records the sender of a normalized message.
///
/// Group messages remember where the user was seen; direct messages remember
/// the session to answer in.
pub fn remember_sender(registry: &EntityRegistry, message: &CanonicalMessage) -> FriendEntry {
    let mut entry = FriendEntry {
        user_id: message.user_id.clone(),
        nickname: message.sender.nickname.clone(),
        avatar: message.sender.avatar.clone(),
        bot: message.sender.bot,
        ..Default::default()
    };
    match message.message_type {
        MessageType::Group => {
            entry.source_guild_id = Some(message.guild_id.clone());
            entry.source_channel_id = Some(message.channel_id.clone());
        }
        MessageType::Private => {
            entry.guild_id = Some(message.guild_id.clone());
            entry.channel_id = Some(message.channel_id.clone());
            entry.source_guild_id = message.src_guild_id.clone();
        }
    }
    registry.upsert_friend(entry)
}
