//! Configuration for the guild runtime.
//!
//! Two YAML files live in the config directory:
//!
//! - `QQGuild.yaml`: the adapter settings and account tokens, also written
//!   back by the account commands through [`YamlConfigStore`].
//! - `runtime.yaml`: process settings such as [`LoggingConfig`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod store;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, migrate_legacy};
pub use schema::{LogFormat, LogLevel, LogOutput, LoggingConfig, RuntimeConfig};
pub use store::YamlConfigStore;
