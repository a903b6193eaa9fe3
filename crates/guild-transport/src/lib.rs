//! # Guild Transport
//!
//! Network plumbing for the guild adapters.
//!
//! ## Features
//!
//! - `http-client` (default): authenticated REST client ([`HttpClient`])
//! - `ws-client` (default): WebSocket client ([`ws_connect`])
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Adapter Layer      │  (QQ guild gateway protocol, REST endpoints)
//! ├─────────────────────┤
//! │  guild-core         │  (ConnectionHandler, ConnectionHandle, errors)
//! ├─────────────────────┤
//! │  guild-transport    │  <- This crate
//! ├─────────────────────┤
//! │  Network (TCP/HTTP) │
//! └─────────────────────┘
//! ```
//!
//! The transport knows nothing about the platform protocol: the HTTP client
//! sends and decodes JSON, the WebSocket client hands raw frames to a
//! [`guild_core::ConnectionHandler`].

#[cfg(feature = "http-client")]
pub mod http_client;
pub mod multipart;
#[cfg(feature = "ws-client")]
pub mod ws_client;

#[cfg(feature = "http-client")]
pub use http_client::{HttpClient, HttpClientConfig};
pub use multipart::{FilePart, MultipartForm};
#[cfg(feature = "ws-client")]
pub use ws_client::{WsClientConfig, ws_connect};
