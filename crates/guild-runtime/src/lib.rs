//! Guild Runtime - configuration, logging and lifecycle for the QQ guild adapter.
//!
//! This crate provides:
//! - figment-based configuration loading with YAML files and environment overrides
//! - [`YamlConfigStore`], the persistent store behind the account commands
//! - logging setup on `tracing-subscriber`
//! - [`GuildRuntime`], which connects the configured accounts and waits for shutdown
//!
//! ```ignore
//! use guild_runtime::GuildRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = GuildRuntime::builder().build()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, LoggingConfig, RuntimeConfig, YamlConfigStore};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{GuildRuntime, RuntimeBuilder, RuntimeCommands};

// Re-export tracing for use by other crates
pub use tracing;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
