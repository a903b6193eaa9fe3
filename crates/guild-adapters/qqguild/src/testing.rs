//! In-memory [`GuildApi`] used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use guild_core::{ApiError, ApiResult, EventBus};

use crate::api::GuildApi;
use crate::bot::{BotSettings, GuildBot};
use crate::model::api::{Channel, DmsSession, Guild, Member, MessageBody, SentMessage, User};

#[derive(Default)]
pub struct MockApi {
    guilds: Vec<Guild>,
    channels: HashMap<String, Vec<Channel>>,
    members: HashMap<String, Vec<Member>>,
    failing: HashSet<String>,
    posts: Mutex<Vec<(String, MessageBody)>>,
    dms: Mutex<Vec<(String, String)>>,
    deleted: Mutex<Vec<(String, String, bool)>>,
}

fn not_found(what: &str) -> ApiError {
    ApiError::Status {
        status: 404,
        code: 0,
        message: format!("{what} not found"),
    }
}

impl MockApi {
    pub fn with_guild(mut self, id: &str, name: &str, channels: &[(&str, &str)]) -> Self {
        self.guilds.push(Guild {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        });
        self.channels.insert(
            id.into(),
            channels
                .iter()
                .map(|(cid, cname)| Channel {
                    id: (*cid).into(),
                    guild_id: id.into(),
                    name: (*cname).into(),
                    ..Default::default()
                })
                .collect(),
        );
        self
    }

    pub fn failing_channels(mut self, guild_id: &str) -> Self {
        self.failing.insert(guild_id.into());
        self
    }

    pub fn with_member(mut self, guild_id: &str, user_id: &str, username: &str, nick: Option<&str>) -> Self {
        self.members.entry(guild_id.into()).or_default().push(Member {
            user: Some(User {
                id: user_id.into(),
                username: username.into(),
                ..Default::default()
            }),
            nick: nick.map(Into::into),
            ..Default::default()
        });
        self
    }

    /// Sets the avatar of a member added with [`with_member`](Self::with_member).
    pub fn with_member_avatar(mut self, guild_id: &str, user_id: &str, avatar: &str) -> Self {
        if let Some(user) = self
            .members
            .get_mut(guild_id)
            .into_iter()
            .flatten()
            .filter_map(|m| m.user.as_mut())
            .find(|u| u.id == user_id)
        {
            user.avatar = Some(avatar.into());
        }
        self
    }

    /// `(target, body)` of every post; target is `channel:<id>` or `dms:<guild>`.
    pub fn posts(&self) -> Vec<(String, MessageBody)> {
        self.posts.lock().clone()
    }

    /// `(recipient, source guild)` of every opened session.
    pub fn dms_created(&self) -> Vec<(String, String)> {
        self.dms.lock().clone()
    }

    /// `(target, message id, hide)` of every delete.
    pub fn deleted(&self) -> Vec<(String, String, bool)> {
        self.deleted.lock().clone()
    }

    fn record_post(&self, target: String, body: MessageBody) -> SentMessage {
        let mut posts = self.posts.lock();
        posts.push((target, body));
        SentMessage::with_id(format!("sent{}", posts.len()))
    }
}

#[async_trait]
impl GuildApi for MockApi {
    async fn gateway_url(&self) -> ApiResult<String> {
        Ok("wss://gateway.invalid/websocket".into())
    }

    async fn me(&self) -> ApiResult<User> {
        Ok(User {
            id: "bot1".into(),
            username: "tester".into(),
            bot: true,
            ..Default::default()
        })
    }

    async fn me_guilds(&self, after: Option<&str>, limit: u32) -> ApiResult<Vec<Guild>> {
        let start = match after {
            Some(after) => self
                .guilds
                .iter()
                .position(|g| g.id == after)
                .map_or(self.guilds.len(), |i| i + 1),
            None => 0,
        };
        Ok(self.guilds.iter().skip(start).take(limit as usize).cloned().collect())
    }

    async fn guild(&self, guild_id: &str) -> ApiResult<Guild> {
        self.guilds
            .iter()
            .find(|g| g.id == guild_id)
            .cloned()
            .ok_or_else(|| not_found("guild"))
    }

    async fn channels(&self, guild_id: &str) -> ApiResult<Vec<Channel>> {
        if self.failing.contains(guild_id) {
            return Err(ApiError::Status {
                status: 403,
                code: 11264,
                message: "no permission".into(),
            });
        }
        Ok(self.channels.get(guild_id).cloned().unwrap_or_default())
    }

    async fn channel(&self, channel_id: &str) -> ApiResult<Channel> {
        self.channels
            .values()
            .flatten()
            .find(|c| c.id == channel_id)
            .cloned()
            .ok_or_else(|| not_found("channel"))
    }

    async fn guild_members(&self, guild_id: &str, after: Option<&str>, limit: u32) -> ApiResult<Vec<Member>> {
        let members = self.members.get(guild_id).cloned().unwrap_or_default();
        let start = match after {
            Some(after) => members
                .iter()
                .position(|m| m.user.as_ref().is_some_and(|u| u.id == after))
                .map_or(0, |i| i + 1),
            None => 0,
        };
        Ok(members.into_iter().skip(start).take(limit as usize).collect())
    }

    async fn guild_member(&self, guild_id: &str, user_id: &str) -> ApiResult<Member> {
        self.members
            .get(guild_id)
            .and_then(|ms| {
                ms.iter()
                    .find(|m| m.user.as_ref().is_some_and(|u| u.id == user_id))
            })
            .cloned()
            .ok_or_else(|| not_found("member"))
    }

    async fn post_message(&self, channel_id: &str, body: MessageBody) -> ApiResult<SentMessage> {
        Ok(self.record_post(format!("channel:{channel_id}"), body))
    }

    async fn post_direct_message(&self, guild_id: &str, body: MessageBody) -> ApiResult<SentMessage> {
        Ok(self.record_post(format!("dms:{guild_id}"), body))
    }

    async fn create_direct_message(&self, recipient_id: &str, source_guild_id: &str) -> ApiResult<DmsSession> {
        self.dms
            .lock()
            .push((recipient_id.into(), source_guild_id.into()));
        Ok(DmsSession {
            guild_id: format!("dm-{recipient_id}"),
            channel_id: format!("dmc-{recipient_id}"),
            create_time: None,
        })
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str, hide_tip: bool) -> ApiResult<()> {
        self.deleted
            .lock()
            .push((format!("channel:{channel_id}"), message_id.into(), hide_tip));
        Ok(())
    }

    async fn delete_direct_message(&self, guild_id: &str, message_id: &str, hide_tip: bool) -> ApiResult<()> {
        self.deleted
            .lock()
            .push((format!("dms:{guild_id}"), message_id.into(), hide_tip));
        Ok(())
    }
}

/// Builds a bot over `api` with no gateway connection.
pub fn test_bot(api: Arc<MockApi>, settings: BotSettings) -> Arc<GuildBot> {
    test_bot_on(api, settings, EventBus::new(64))
}

pub fn test_bot_on(api: Arc<MockApi>, settings: BotSettings, events: EventBus) -> Arc<GuildBot> {
    let info = User {
        id: "bot1".into(),
        username: "tester".into(),
        bot: true,
        ..Default::default()
    };
    let token = "0:1:1000:secret".parse().expect("valid token");
    Arc::new(GuildBot::new(info, token, api, settings, events, None))
}
