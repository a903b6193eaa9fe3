//! # QQ Guild Adapter
//!
//! Connects QQ guild ("QQ频道") bot accounts to the guild event bus.
//!
//! ## Overview
//!
//! Every configured token becomes one [`GuildBot`]. Inbound gateway messages
//! are normalized into [`CanonicalMessage`]s and published as
//! [`MessageEvent`]s; outbound segment lists are composed into the REST posts
//! the platform accepts.
//!
//! ```text
//! gateway dispatch ─▶ normalizer ─▶ registry upsert ─▶ message.group | message.private ─▶ message
//! send_msg(segments) ─▶ composer ─▶ codec ─▶ POST /channels/{id}/messages | /dms/{id}/messages
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use guild_adapter_qqguild::{MessageEvent, QQGuildAdapter, QQGuildConfig};
//! use guild_core::EventBus;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config: QQGuildConfig = serde_yaml::from_str(&std::fs::read_to_string("config/QQGuild.yaml")?)?;
//!     let events = EventBus::default();
//!     let mut stream = events.subscribe();
//!     QQGuildAdapter::new(&config, events).load().await;
//!
//!     while let Some(emitted) = stream.recv().await {
//!         if emitted.name() != "message" {
//!             continue;
//!         }
//!         if let Some(msg) = emitted.event.downcast_ref::<MessageEvent>() {
//!             msg.reply(format!("echo: {}", msg.plain_text())).await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Segments
//!
//! | type | outbound | inbound display |
//! |---|---|---|
//! | `text` | escaped content | the text |
//! | `image` | `image` URL or multipart upload | `[图片：url]` |
//! | `face` | `<emoji:ID>` | `[表情：ID]` |
//! | `at` | `<@ID>` / `@everyone` | `[提及：ID]` |
//! | `reply` | `msg_id` | `[回复：ID]` |
//! | `node` | one send per nested message | `[转发消息：N条]` |
//! | `attachment` | skipped | `[视频：url]`, `[语音：url]`, `[文件：name]` |
//! | `button` | skipped | `[按钮]` |

mod adapter;
pub mod api;
pub mod bot;
pub mod codec;
pub mod commands;
pub mod composer;
pub mod config;
pub mod gateway;
pub mod handle;
pub mod model;
pub mod normalizer;
pub mod registry;

#[cfg(test)]
mod testing;

pub use adapter::QQGuildAdapter;
pub use api::{GuildApi, RestApi};
pub use bot::{BotSettings, GuildBot, VersionInfo};
pub use commands::{AccountCommands, AccountConnector, Command, ConfigStore};
pub use composer::{MessageSink, SendContext, SendResult};
pub use config::{AccountToken, Permission, QQGuildConfig, Role};
pub use handle::{FriendHandle, GroupHandle, MemberHandle};
pub use registry::{EntityRegistry, FriendEntry, GroupEntry};

pub use model::{
    AtData, AttachmentData, AttachmentKind, CanonicalMessage, ConnectEvent, FaceData, ForwardNode,
    ImageData, MessageEvent, MessageType, OutboundMessage, ReplyData, Segment, Sender, TextData,
};
