//! # Guild Core
//!
//! Shared building blocks for the guild adapter workspace.
//!
//! The core crate knows nothing about a specific chat platform. It provides
//! the seams the adapter and the runtime meet at:
//!
//! - **Events**: type-erased events ([`Event`], [`BoxedEvent`]) published on a
//!   named [`EventBus`] (`message`, `message.group`, `connect.<id>`, ...)
//! - **Bots**: the [`Bot`] trait and the process-wide [`AccountRegistry`]
//! - **Connections**: [`ConnectionHandler`] / [`ConnectionHandle`] used by the
//!   transport layer to hand raw frames to an adapter
//! - **Messages**: the [`MessageSegment`] / [`Message`] traits
//! - **Errors**: [`TransportError`], [`AdapterError`], [`ApiError`]
//!
//! ```text
//! ┌───────────┐  frames  ┌───────────┐  emit   ┌──────────┐
//! │ Transport │─────────▶│  Adapter  │────────▶│ EventBus │──▶ subscribers
//! └───────────┘          └───────────┘         └──────────┘
//! ```

pub mod accounts;
pub mod connection;
pub mod error;
pub mod event;
pub mod message;

pub use accounts::{AccountRegistry, Bot, BoxedBot, accounts, downcast_bot};
pub use connection::{ConnectionHandle, ConnectionHandler, ConnectionInfo};
pub use error::{
    AdapterError, AdapterResult, ApiError, ApiResult, TransportError, TransportResult,
};
pub use event::{BoxedEvent, Emitted, Event, EventBus, EventStream};
pub use message::{Message, MessageSegment};
