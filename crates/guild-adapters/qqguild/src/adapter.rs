//! QQ guild adapter.
//!
//! The adapter owns the configured account tokens and turns each into a
//! connected [`GuildBot`]:
//!
//! ```text
//! GET /gateway ─▶ ws connect ─▶ READY ─▶ GET /users/@me ─▶ load groups
//!   ─▶ register account ─▶ spawn dispatch loop ─▶ emit connect.<id>, connect
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use guild_adapter_qqguild::{QQGuildAdapter, QQGuildConfig};
//! use guild_core::EventBus;
//!
//! let events = EventBus::default();
//! let adapter = QQGuildAdapter::new(&config, events.clone());
//! let bots = adapter.load().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use guild_core::{AdapterResult, BoxedEvent, ConnectionHandle, Event, EventBus, accounts};
use guild_transport::{WsClientConfig, ws_connect};

use crate::api::{GuildApi, RestApi};
use crate::bot::{BotSettings, GuildBot};
use crate::commands::AccountConnector;
use crate::config::{AccountToken, QQGuildConfig};
use crate::gateway::{Dispatch, GatewaySession};
use crate::model::api::User;
use crate::model::event::{ConnectEvent, MessageEvent, MessagePayload};
use crate::model::gateway::DispatchKind;
use crate::model::message::MessageType;
use crate::normalizer::{NormalizeContext, normalize, remember_sender};

/// How long to wait for `READY` after connecting.
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// The QQ guild adapter.
pub struct QQGuildAdapter {
    tokens: Vec<String>,
    settings: BotSettings,
    events: EventBus,
}

impl QQGuildAdapter {
    /// Adapter id.
    pub const ID: &'static str = crate::bot::ADAPTER_ID;

    /// Adapter display name.
    pub const NAME: &'static str = crate::bot::ADAPTER_NAME;

    /// Creates an adapter publishing on `events`.
    pub fn new(config: &QQGuildConfig, events: EventBus) -> Self {
        Self {
            tokens: config.token.clone(),
            settings: BotSettings::from(config),
            events,
        }
    }

    /// The bus every account of this adapter publishes on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Connects every configured token one after another.
    ///
    /// Tokens that fail to parse or connect are logged and skipped.
    pub async fn load(&self) -> Vec<Arc<GuildBot>> {
        if self.tokens.is_empty() {
            warn!("No QQ guild account configured");
        }
        let mut bots = Vec::with_capacity(self.tokens.len());
        for token in &self.tokens {
            match self.connect(token).await {
                Ok(Some(bot)) => bots.push(bot),
                Ok(None) => {}
                Err(e) => error!(error = %e, "Failed to connect account"),
            }
        }
        info!(connected = bots.len(), configured = self.tokens.len(), "QQ guild accounts loaded");
        bots
    }

    /// Connects one account.
    ///
    /// Returns `Ok(None)` when the handshake fails; nothing is registered in
    /// that case. Malformed tokens are an error.
    pub async fn connect(&self, token: &str) -> AdapterResult<Option<Arc<GuildBot>>> {
        let token: AccountToken = token.parse()?;
        let api: Arc<dyn GuildApi> = Arc::new(RestApi::new(&token)?);

        let Some((info, connection, dispatches)) = self.handshake(&token, api.as_ref()).await
        else {
            return Ok(None);
        };

        let bot = self
            .establish(info, token, api, Some(connection), dispatches)
            .await;
        Ok(Some(bot))
    }

    /// Opens the gateway and confirms the account identity.
    async fn handshake(
        &self,
        token: &AccountToken,
        api: &dyn GuildApi,
    ) -> Option<(User, ConnectionHandle, mpsc::Receiver<Dispatch>)> {
        let app_id = token.app_id.as_str();
        let url = match api.gateway_url().await {
            Ok(url) => url,
            Err(e) => {
                error!(app_id, error = %e, "Failed to resolve gateway");
                return None;
            }
        };

        let (session, channels) = GatewaySession::new(token);
        let ws_config = WsClientConfig::new(url, format!("qqguild-{app_id}"));
        let connection = match ws_connect(ws_config, Arc::new(session)).await {
            Ok(connection) => connection,
            Err(e) => {
                error!(app_id, error = %e, "Failed to connect gateway");
                return None;
            }
        };

        let mut info = match tokio::time::timeout(READY_TIMEOUT, channels.ready).await {
            Ok(Ok(ready)) => ready.user,
            Ok(Err(_)) => {
                error!(app_id, "Gateway closed before READY");
                return None;
            }
            Err(_) => {
                error!(app_id, "Timed out waiting for READY");
                connection.close();
                return None;
            }
        };

        match api.me().await {
            Ok(me) => info.merge(me),
            Err(e) => warn!(app_id, error = %e, "Failed to fetch bot profile"),
        }
        if info.id.is_empty() {
            error!(app_id, "Bot profile has no id");
            connection.close();
            return None;
        }
        Some((info, connection, channels.dispatches))
    }

    /// Turns a confirmed identity into a live account.
    pub(crate) async fn establish(
        &self,
        info: User,
        token: AccountToken,
        api: Arc<dyn GuildApi>,
        connection: Option<ConnectionHandle>,
        dispatches: mpsc::Receiver<Dispatch>,
    ) -> Arc<GuildBot> {
        let bot = Arc::new(GuildBot::new(
            info,
            token,
            api,
            self.settings.clone(),
            self.events.clone(),
            connection,
        ));

        match bot.get_group_array().await {
            Ok(groups) => debug!(bot_id = %bot.id(), groups = groups.len(), "Loaded groups"),
            Err(e) => warn!(bot_id = %bot.id(), error = %e, "Failed to load groups"),
        }

        accounts().register(Arc::clone(&bot) as guild_core::BoxedBot);
        tokio::spawn(run_dispatch(Arc::clone(&bot), dispatches));

        let version = bot.version();
        info!(
            bot_id = %bot.id(),
            nickname = %bot.nickname(),
            adapter = version.name,
            version = version.version,
            "Account connected"
        );

        let event = BoxedEvent::new(ConnectEvent::new(Arc::clone(&bot)));
        self.events.emit(format!("connect.{}", bot.id()), event.clone());
        self.events.emit("connect", event);
        bot
    }
}

#[async_trait]
impl AccountConnector for QQGuildAdapter {
    async fn connect_account(&self, token: &str) -> AdapterResult<Option<Arc<GuildBot>>> {
        self.connect(token).await
    }
}

async fn run_dispatch(bot: Arc<GuildBot>, mut dispatches: mpsc::Receiver<Dispatch>) {
    while let Some(dispatch) = dispatches.recv().await {
        handle_dispatch(&bot, dispatch);
    }
    debug!(bot_id = %bot.id(), "Dispatch loop ended");
}

/// Normalizes and publishes one dispatch.
pub(crate) fn handle_dispatch(bot: &Arc<GuildBot>, dispatch: Dispatch) -> Option<MessageEvent> {
    let message_type = match &dispatch.kind {
        DispatchKind::MessageCreate | DispatchKind::AtMessageCreate => MessageType::Group,
        DispatchKind::DirectMessageCreate => MessageType::Private,
        kind if kind.is_delete() => {
            debug!(bot_id = %bot.id(), kind = ?kind, data = %dispatch.data, "Message deleted");
            return None;
        }
        kind => {
            debug!(bot_id = %bot.id(), kind = ?kind, "Ignoring dispatch");
            return None;
        }
    };

    let payload: MessagePayload = match serde_json::from_value(dispatch.data) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(bot_id = %bot.id(), error = %e, "Malformed message payload");
            return None;
        }
    };

    let ctx = NormalizeContext {
        self_id: bot.id(),
        id_prefix: &bot.settings().id_prefix,
    };
    let message = normalize(&payload, message_type, ctx);
    remember_sender(bot.registry(), &message);

    match message_type {
        MessageType::Group => info!(
            bot_id = %bot.id(),
            group_id = %message.group_id,
            user_id = %message.user_id,
            "Group message: {}",
            message.raw_message
        ),
        MessageType::Private => info!(
            bot_id = %bot.id(),
            user_id = %message.user_id,
            "Private message: {}",
            message.raw_message
        ),
    }

    let event = MessageEvent::new(Arc::clone(bot), message);
    let boxed = BoxedEvent::new(event.clone());
    bot.events().emit(event.event_name(), boxed.clone());
    bot.events().emit("message", boxed);
    Some(event)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{MockApi, test_bot_on};

    fn dispatch(kind: DispatchKind, data: serde_json::Value) -> Dispatch {
        Dispatch {
            kind,
            seq: Some(1),
            data,
        }
    }

    fn message_data() -> serde_json::Value {
        json!({
            "id": "m1",
            "channel_id": "c1",
            "guild_id": "g1",
            "content": "<@!bot1> ping",
            "timestamp": "2024-01-01T00:00:00+08:00",
            "author": {"id": "u1", "username": "alice", "avatar": "https://a"},
            "member": {"roles": ["1"], "nick": "Alice"}
        })
    }

    #[tokio::test]
    async fn test_group_message_is_published_twice() {
        let events = EventBus::new(16);
        let mut stream = events.subscribe();
        let bot = test_bot_on(Arc::new(MockApi::default()), BotSettings::default(), events);

        let event = handle_dispatch(&bot, dispatch(DispatchKind::AtMessageCreate, message_data()))
            .unwrap();
        assert!(event.is_group());
        assert_eq!(event.plain_text(), " ping");

        let first = stream.recv().await.unwrap();
        assert_eq!(first.name(), "message.group");
        assert!(first.event.is::<MessageEvent>());
        assert_eq!(stream.recv().await.unwrap().name(), "message");

        let friend = bot.registry().lookup_friend("u1").unwrap();
        assert_eq!(friend.source_guild_id.as_deref(), Some("g1"));
    }

    #[tokio::test]
    async fn test_direct_message_is_private() {
        let events = EventBus::new(16);
        let mut stream = events.subscribe();
        let bot = test_bot_on(Arc::new(MockApi::default()), BotSettings::default(), events);

        let mut data = message_data();
        data["guild_id"] = json!("dm-g");
        data["src_guild_id"] = json!("g1");
        let event = handle_dispatch(&bot, dispatch(DispatchKind::DirectMessageCreate, data)).unwrap();

        assert_eq!(event.message_type(), MessageType::Private);
        assert_eq!(stream.recv().await.unwrap().name(), "message.private");
        let friend = bot.registry().lookup_friend("u1").unwrap();
        assert_eq!(friend.guild_id.as_deref(), Some("dm-g"));
        assert_eq!(friend.source_guild_id.as_deref(), Some("g1"));
    }

    #[tokio::test]
    async fn test_reply_goes_to_channel() {
        let api = Arc::new(MockApi::default());
        let bot = test_bot_on(api.clone(), BotSettings::default(), EventBus::new(4));
        let event = handle_dispatch(&bot, dispatch(DispatchKind::MessageCreate, message_data()))
            .unwrap();

        event.reply("pong").await.unwrap();
        let posts = api.posts();
        assert_eq!(posts[0].0, "channel:c1");
        assert_eq!(posts[0].1.msg_id.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn test_delete_and_unknown_dispatches_publish_nothing() {
        let events = EventBus::new(16);
        let mut stream = events.subscribe();
        let bot = test_bot_on(Arc::new(MockApi::default()), BotSettings::default(), events.clone());

        assert!(handle_dispatch(&bot, dispatch(DispatchKind::MessageDelete, json!({}))).is_none());
        assert!(
            handle_dispatch(&bot, dispatch(DispatchKind::Other("GUILD_CREATE".into()), json!({})))
                .is_none()
        );
        assert!(
            handle_dispatch(&bot, dispatch(DispatchKind::MessageCreate, json!("garbage"))).is_none()
        );

        events.emit("marker", BoxedEvent::new(ConnectEvent::new(Arc::clone(&bot))));
        assert_eq!(stream.recv().await.unwrap().name(), "marker");
    }

    #[tokio::test]
    async fn test_establish_registers_and_announces() {
        let events = EventBus::new(16);
        let mut stream = events.subscribe();
        let config = QQGuildConfig::default();
        let adapter = QQGuildAdapter::new(&config, events);
        let api = Arc::new(MockApi::default().with_guild("g1", "Guild", &[("c1", "main")]));

        let info = User {
            id: "establish-bot".into(),
            username: "bot".into(),
            ..Default::default()
        };
        let token: AccountToken = "0:1:7:secret".parse().unwrap();
        let (_tx, rx) = mpsc::channel(1);
        let bot = adapter.establish(info, token, api, None, rx).await;

        assert_eq!(stream.recv().await.unwrap().name(), "connect.establish-bot");
        assert_eq!(stream.recv().await.unwrap().name(), "connect");
        assert!(accounts().contains("establish-bot"));
        assert!(bot.registry().lookup_group("g1-c1").is_some());
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_token() {
        let adapter = QQGuildAdapter::new(&QQGuildConfig::default(), EventBus::new(4));
        assert!(adapter.connect("not-a-token").await.is_err());
    }
}
