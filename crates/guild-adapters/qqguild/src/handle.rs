//! Per-entity handles.
//!
//! Handles are short-lived views over a bot and one registry entry; creating
//! one never talks to the network.

use std::sync::Arc;

use guild_core::ApiResult;

use crate::bot::GuildBot;
use crate::composer::SendResult;
use crate::model::message::OutboundMessage;
use crate::model::segment::ForwardNode;
use crate::registry::{FriendEntry, GroupEntry};

/// A user reachable through direct messages.
#[derive(Debug, Clone)]
pub struct FriendHandle {
    bot: Arc<GuildBot>,
    entry: FriendEntry,
}

impl FriendHandle {
    pub(crate) fn new(bot: Arc<GuildBot>, entry: FriendEntry) -> Self {
        Self { bot, entry }
    }

    pub fn user_id(&self) -> &str {
        &self.entry.user_id
    }

    /// The registry entry this handle was created from.
    pub fn entry(&self) -> &FriendEntry {
        &self.entry
    }

    /// Sends a direct message. Returns `None` if the user cannot be reached.
    pub async fn send_msg(&self, message: impl Into<OutboundMessage>) -> ApiResult<Option<SendResult>> {
        self.bot
            .send_friend_msg(&self.entry, None, message.into())
            .await
    }

    pub async fn recall_msg(&self, message_ids: &[String]) -> ApiResult<Vec<String>> {
        self.bot
            .recall_friend_msg(&self.entry, message_ids, None)
            .await
    }

    /// Sends each node's message on its own, returning one result per node.
    pub async fn send_forward_msg(&self, nodes: Vec<ForwardNode>) -> ApiResult<Vec<Option<SendResult>>> {
        let mut results = Vec::with_capacity(nodes.len());
        for node in nodes {
            results.push(self.send_msg(node.message).await?);
        }
        Ok(results)
    }

    /// Returns the user's profile, refreshed from the guild they were seen in.
    pub async fn get_info(&self) -> ApiResult<FriendEntry> {
        match &self.entry.source_guild_id {
            Some(guild_id) => self.bot.get_member_info(guild_id, &self.entry.user_id).await,
            None => Ok(self
                .bot
                .registry()
                .lookup_friend(&self.entry.user_id)
                .unwrap_or_else(|| self.entry.clone())),
        }
    }

    /// Returns the avatar from [`get_info`](Self::get_info), which asks the
    /// platform when a source guild is known.
    pub async fn get_avatar_url(&self) -> ApiResult<Option<String>> {
        let info = self.get_info().await?;
        Ok(info.avatar.or_else(|| self.entry.avatar.clone()))
    }
}

/// A guild channel.
#[derive(Debug, Clone)]
pub struct GroupHandle {
    bot: Arc<GuildBot>,
    entry: GroupEntry,
}

impl GroupHandle {
    pub(crate) fn new(bot: Arc<GuildBot>, entry: GroupEntry) -> Self {
        Self { bot, entry }
    }

    pub fn group_id(&self) -> &str {
        &self.entry.group_id
    }

    pub fn guild_id(&self) -> &str {
        &self.entry.guild_id
    }

    pub fn channel_id(&self) -> &str {
        &self.entry.channel_id
    }

    pub fn entry(&self) -> &GroupEntry {
        &self.entry
    }

    pub async fn send_msg(&self, message: impl Into<OutboundMessage>) -> ApiResult<SendResult> {
        self.bot
            .send_group_msg(&self.entry.channel_id, None, message.into())
            .await
    }

    pub async fn recall_msg(&self, message_ids: &[String]) -> ApiResult<Vec<String>> {
        self.bot
            .recall_group_msg(&self.entry.channel_id, message_ids, None)
            .await
    }

    /// Sends each node's message on its own, returning one result per node.
    pub async fn send_forward_msg(&self, nodes: Vec<ForwardNode>) -> ApiResult<Vec<SendResult>> {
        let mut results = Vec::with_capacity(nodes.len());
        for node in nodes {
            results.push(self.send_msg(node.message).await?);
        }
        Ok(results)
    }

    pub fn pick_member(&self, user_id: &str) -> MemberHandle {
        self.bot.pick_member(&self.entry.group_id, user_id)
    }

    pub async fn get_info(&self) -> ApiResult<GroupEntry> {
        self.bot
            .get_group_info(&self.entry.guild_id, &self.entry.channel_id)
            .await
    }

    /// Lists the members of the channel's guild.
    pub async fn get_member_list(&self) -> ApiResult<Vec<FriendEntry>> {
        self.bot.get_member_list(&self.entry.guild_id).await
    }
}

/// A user in the context of a channel.
#[derive(Debug, Clone)]
pub struct MemberHandle {
    friend: FriendHandle,
    group_id: String,
}

impl MemberHandle {
    pub(crate) fn new(bot: Arc<GuildBot>, group_id: String, entry: FriendEntry) -> Self {
        Self {
            friend: FriendHandle::new(bot, entry),
            group_id,
        }
    }

    pub fn user_id(&self) -> &str {
        self.friend.user_id()
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn as_friend(&self) -> &FriendHandle {
        &self.friend
    }

    /// Sends a direct message, opening a session from this channel's guild.
    pub async fn send_msg(&self, message: impl Into<OutboundMessage>) -> ApiResult<Option<SendResult>> {
        self.friend.send_msg(message).await
    }

    pub async fn recall_msg(&self, message_ids: &[String]) -> ApiResult<Vec<String>> {
        self.friend.recall_msg(message_ids).await
    }

    /// Returns the member profile in this channel's guild.
    pub async fn get_info(&self) -> ApiResult<FriendEntry> {
        self.friend.get_info().await
    }

    pub async fn get_avatar_url(&self) -> ApiResult<Option<String>> {
        self.friend.get_avatar_url().await
    }
}
