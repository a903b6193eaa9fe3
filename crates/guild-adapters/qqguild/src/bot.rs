//! QQ guild bot implementation.
//!
//! [`GuildBot`] is one connected account. It owns the account's REST client
//! and entity registry and exposes the send, recall and lookup operations the
//! per-entity handles are built on.
//!
//! # Usage
//!
//! ```rust,ignore
//! use guild_adapter_qqguild::{GuildBot, Segment};
//!
//! async fn greet(bot: Arc<GuildBot>) -> anyhow::Result<()> {
//!     let group = bot.pick_group("1234-5678");
//!     group.send_msg(vec![Segment::at_all(), Segment::text(" hello")]).await?;
//!     Ok(())
//! }
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use guild_core::{ApiError, ApiResult, Bot, ConnectionHandle, EventBus, Message};
use tracing::{error, info, warn};

use crate::api::GuildApi;
use crate::codec::{split_group_id, strip_namespace};
use crate::composer::{self, ChannelSink, DirectSink, SendContext, SendResult};
use crate::config::{AccountToken, QQGuildConfig};
use crate::handle::{FriendHandle, GroupHandle, MemberHandle};
use crate::model::api::User;
use crate::model::message::OutboundMessage;
use crate::registry::{EntityRegistry, FriendEntry, GroupEntry};

/// Adapter id reported in [`VersionInfo`].
pub const ADAPTER_ID: &str = "QQGuild";

/// Adapter display name reported in [`VersionInfo`].
pub const ADAPTER_NAME: &str = "QQ频道Bot";

/// Settings shared by every account of one adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotSettings {
    /// Namespace prefix of user ids.
    pub id_prefix: String,
    /// Default `hide` flag of recalls.
    pub hide_recall_tip: bool,
}

impl From<&QQGuildConfig> for BotSettings {
    fn from(config: &QQGuildConfig) -> Self {
        Self {
            id_prefix: config.id_prefix.clone(),
            hide_recall_tip: config.hide_recall_tip,
        }
    }
}

/// Adapter identification of a bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

// =============================================================================
// GuildBot
// =============================================================================

/// A connected QQ guild account.
pub struct GuildBot {
    info: User,
    token: AccountToken,
    api: Arc<dyn GuildApi>,
    registry: EntityRegistry,
    settings: BotSettings,
    events: EventBus,
    start_time: u64,
    connection: Option<ConnectionHandle>,
}

impl fmt::Debug for GuildBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuildBot")
            .field("id", &self.info.id)
            .field("nickname", &self.info.username)
            .field("app_id", &self.token.app_id)
            .finish_non_exhaustive()
    }
}

impl GuildBot {
    pub(crate) fn new(
        info: User,
        token: AccountToken,
        api: Arc<dyn GuildApi>,
        settings: BotSettings,
        events: EventBus,
        connection: Option<ConnectionHandle>,
    ) -> Self {
        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            info,
            token,
            api,
            registry: EntityRegistry::new(),
            settings,
            events,
            start_time,
            connection,
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn nickname(&self) -> &str {
        &self.info.username
    }

    pub fn avatar(&self) -> Option<&str> {
        self.info.avatar.as_deref()
    }

    /// Profile merged from `READY` and `GET /users/@me`.
    pub fn info(&self) -> &User {
        &self.info
    }

    pub fn token(&self) -> &AccountToken {
        &self.token
    }

    pub fn version(&self) -> VersionInfo {
        VersionInfo {
            id: ADAPTER_ID,
            name: ADAPTER_NAME,
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Unix time the account connected at.
    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn api(&self) -> &dyn GuildApi {
        self.api.as_ref()
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    /// The bus this account publishes on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Closes the gateway connection, if any.
    pub fn close(&self) {
        if let Some(connection) = &self.connection {
            connection.close();
        }
    }

    fn platform_user_id<'a>(&self, user_id: &'a str) -> &'a str {
        strip_namespace(&self.settings.id_prefix, user_id)
    }

    // -------------------------------------------------------------------------
    // Handles
    // -------------------------------------------------------------------------

    /// Returns a handle for a user, seeded from the registry.
    pub fn pick_friend(self: &Arc<Self>, user_id: &str) -> FriendHandle {
        let entry = self
            .registry
            .lookup_friend(user_id)
            .unwrap_or_else(|| FriendEntry::new(user_id));
        FriendHandle::new(Arc::clone(self), entry)
    }

    /// Alias of [`pick_friend`](Self::pick_friend).
    pub fn pick_user(self: &Arc<Self>, user_id: &str) -> FriendHandle {
        self.pick_friend(user_id)
    }

    /// Returns a handle for a channel, seeded from the registry.
    pub fn pick_group(self: &Arc<Self>, group_id: &str) -> GroupHandle {
        let entry = self.registry.lookup_group(group_id).unwrap_or_else(|| {
            match split_group_id(group_id) {
                Some((guild_id, channel_id)) => GroupEntry::new(guild_id, channel_id),
                None => {
                    warn!(bot_id = %self.id(), group_id, "Group id has no channel part");
                    GroupEntry {
                        group_id: group_id.to_string(),
                        guild_id: group_id.to_string(),
                        ..Default::default()
                    }
                }
            }
        });
        GroupHandle::new(Arc::clone(self), entry)
    }

    /// Returns a handle for a user in the context of a channel.
    pub fn pick_member(self: &Arc<Self>, group_id: &str, user_id: &str) -> MemberHandle {
        let mut entry = self
            .registry
            .lookup_friend(user_id)
            .unwrap_or_else(|| FriendEntry::new(user_id));
        let (guild_id, channel_id) = split_group_id(group_id).unwrap_or((group_id, ""));
        entry.source_guild_id = Some(guild_id.to_string());
        entry.source_channel_id = Some(channel_id.to_string());
        MemberHandle::new(Arc::clone(self), group_id.to_string(), entry)
    }

    // -------------------------------------------------------------------------
    // Listing and info
    // -------------------------------------------------------------------------

    /// Lists every channel of every joined guild and refreshes the registry.
    pub async fn get_group_array(&self) -> ApiResult<Vec<GroupEntry>> {
        self.registry.fetch_group_list(self.api()).await
    }

    /// Lists every group id.
    pub async fn get_group_list(&self) -> ApiResult<Vec<String>> {
        Ok(self
            .get_group_array()
            .await?
            .into_iter()
            .map(|g| g.group_id)
            .collect())
    }

    /// Lists every group keyed by id.
    pub async fn get_group_map(&self) -> ApiResult<HashMap<String, GroupEntry>> {
        Ok(self
            .get_group_array()
            .await?
            .into_iter()
            .map(|g| (g.group_id.clone(), g))
            .collect())
    }

    /// Lists the members of a guild and refreshes the registry.
    pub async fn get_member_list(&self, guild_id: &str) -> ApiResult<Vec<FriendEntry>> {
        self.registry
            .fetch_member_list(self.api(), guild_id, &self.settings.id_prefix)
            .await
    }

    /// Fetches guild and channel metadata of a group.
    pub async fn get_group_info(&self, guild_id: &str, channel_id: &str) -> ApiResult<GroupEntry> {
        let guild = self.api.guild(guild_id).await?;
        let channel = self.api.channel(channel_id).await?;
        Ok(self
            .registry
            .upsert_group(GroupEntry::from_parts(&guild, &channel)))
    }

    /// Fetches a user's profile as a member of `guild_id`.
    pub async fn get_member_info(&self, guild_id: &str, user_id: &str) -> ApiResult<FriendEntry> {
        let member = self
            .api
            .guild_member(guild_id, self.platform_user_id(user_id))
            .await?;
        let entry = FriendEntry::from_member(&member, guild_id, &self.settings.id_prefix)
            .ok_or_else(|| ApiError::Other(format!("member {user_id} has no user info")))?;
        Ok(self.registry.upsert_friend(entry))
    }

    /// Returns a user's profile, refreshed through member info when the
    /// user was seen in a guild.
    pub async fn get_friend_info(self: &Arc<Self>, user_id: &str) -> ApiResult<FriendEntry> {
        self.pick_friend(user_id).get_info().await
    }

    // -------------------------------------------------------------------------
    // Sending
    // -------------------------------------------------------------------------

    /// Sends a message into a channel.
    pub async fn send_group_msg(
        &self,
        channel_id: &str,
        reference: Option<String>,
        message: OutboundMessage,
    ) -> ApiResult<SendResult> {
        let sink = ChannelSink {
            api: self.api(),
            bot_id: self.id(),
            channel_id,
        };
        let mut ctx = SendContext::new(reference, self.settings.id_prefix.as_str());
        composer::send(&sink, &mut ctx, message.segments()).await
    }

    /// Sends a direct message.
    ///
    /// A user without a direct message session gets one opened from the
    /// guild they were last seen in. Returns `None` when neither is known.
    pub async fn send_friend_msg(
        &self,
        friend: &FriendEntry,
        reference: Option<String>,
        message: OutboundMessage,
    ) -> ApiResult<Option<SendResult>> {
        let Some(guild_id) = self.direct_session(friend).await? else {
            return Ok(None);
        };
        let sink = DirectSink {
            api: self.api(),
            bot_id: self.id(),
            guild_id: &guild_id,
            user_id: &friend.user_id,
        };
        let mut ctx = SendContext::new(reference, self.settings.id_prefix.as_str());
        composer::send(&sink, &mut ctx, message.segments())
            .await
            .map(Some)
    }

    /// Resolves the direct message guild of `friend`, opening a session if needed.
    async fn direct_session(&self, friend: &FriendEntry) -> ApiResult<Option<String>> {
        let mut known = friend.clone();
        if let Some(cached) = self.registry.lookup_friend(&friend.user_id) {
            known.guild_id = known.guild_id.or(cached.guild_id);
            known.source_guild_id = known.source_guild_id.or(cached.source_guild_id);
        }
        if let Some(guild_id) = known.guild_id {
            return Ok(Some(guild_id));
        }
        let Some(source_guild_id) = known.source_guild_id else {
            error!(
                bot_id = %self.id(),
                user_id = %friend.user_id,
                "Cannot send friend message: no source guild known"
            );
            return Ok(None);
        };

        let session = self
            .api
            .create_direct_message(self.platform_user_id(&friend.user_id), &source_guild_id)
            .await?;
        info!(
            bot_id = %self.id(),
            user_id = %friend.user_id,
            guild_id = %session.guild_id,
            "Opened direct message session"
        );
        self.registry.upsert_friend(FriendEntry {
            guild_id: Some(session.guild_id.clone()),
            channel_id: Some(session.channel_id),
            ..FriendEntry::new(&friend.user_id)
        });
        Ok(Some(session.guild_id))
    }

    // -------------------------------------------------------------------------
    // Recall
    // -------------------------------------------------------------------------

    /// Deletes channel messages one after another and returns the deleted ids.
    pub async fn recall_group_msg(
        &self,
        channel_id: &str,
        message_ids: &[String],
        hide: Option<bool>,
    ) -> ApiResult<Vec<String>> {
        let hide = hide.unwrap_or(self.settings.hide_recall_tip);
        info!(bot_id = %self.id(), channel_id, ids = ?message_ids, hide, "Recalling messages");
        for id in message_ids {
            self.api.delete_message(channel_id, id, hide).await?;
        }
        Ok(message_ids.to_vec())
    }

    /// Deletes direct messages one after another and returns the deleted ids.
    ///
    /// Nothing is deleted when no direct message session is known.
    pub async fn recall_friend_msg(
        &self,
        friend: &FriendEntry,
        message_ids: &[String],
        hide: Option<bool>,
    ) -> ApiResult<Vec<String>> {
        let guild_id = friend.guild_id.clone().or_else(|| {
            self.registry
                .lookup_friend(&friend.user_id)
                .and_then(|cached| cached.guild_id)
        });
        let Some(guild_id) = guild_id else {
            error!(
                bot_id = %self.id(),
                user_id = %friend.user_id,
                "Cannot recall friend message: no direct message session"
            );
            return Ok(Vec::new());
        };
        let hide = hide.unwrap_or(self.settings.hide_recall_tip);
        info!(bot_id = %self.id(), guild_id = %guild_id, ids = ?message_ids, hide, "Recalling direct messages");
        for id in message_ids {
            self.api.delete_direct_message(&guild_id, id, hide).await?;
        }
        Ok(message_ids.to_vec())
    }
}

impl Bot for GuildBot {
    fn id(&self) -> &str {
        &self.info.id
    }

    fn adapter_name(&self) -> &str {
        ADAPTER_ID
    }

    fn nickname(&self) -> &str {
        &self.info.username
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
