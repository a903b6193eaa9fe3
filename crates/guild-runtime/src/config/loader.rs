//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults of the target type
//! 2. Programmatic overrides ([`ConfigLoader::merge`])
//! 3. The first YAML file found on the search paths
//! 4. Environment variables with the configured prefix
//!
//! # Environment Variable Mapping
//!
//! Keys are lowercased and nested with `__`:
//!
//! - `QQGUILD_ID_PREFIX=qg_` → `id_prefix = "qg_"`
//! - `QQGUILD_HIDE_RECALL_TIP=true` → `hide_recall_tip = true`
//! - `GUILD_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! # Example
//!
//! ```rust,ignore
//! use guild_adapter_qqguild::QQGuildConfig;
//! use guild_runtime::config::ConfigLoader;
//!
//! let config: QQGuildConfig = ConfigLoader::new("QQGuild.yaml")
//!     .search_path("config")
//!     .with_env("QQGUILD_")
//!     .load()?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic overrides.
    figment: Figment,
    /// File name looked up in each search path.
    file_name: String,
    search_paths: Vec<PathBuf>,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Creates a loader looking for `file_name`, with no search paths yet.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            figment: Figment::new(),
            file_name: file_name.into(),
            search_paths: Vec::new(),
            config_file: None,
            env_prefix: None,
        }
    }

    /// Adds a search path for the configuration file.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds `<user config dir>/qqguild` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.search_path(config_dir.join("qqguild"))
        } else {
            self
        }
    }

    /// Sets a specific configuration file to load. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Reads environment variables starting with `prefix`.
    pub fn with_env(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Merges configuration values programmatically, below file and environment.
    pub fn merge<T: Serialize>(mut self, overrides: T) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(overrides));
        self
    }

    /// Returns the file that [`load`](Self::load) would read, if any.
    pub fn resolve(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_file {
            return Some(path.clone());
        }
        self.search_paths
            .iter()
            .map(|dir| dir.join(&self.file_name))
            .find(|path| path.exists())
    }

    /// Loads and returns the configuration.
    pub fn load<T>(self) -> ConfigResult<T>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        let file_name = self.file_name.clone();
        let figment = self.build_figment::<T>()?;

        let config: T = figment.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract {file_name}: {e}"))
        })?;

        debug!(file = %file_name, "Configuration loaded successfully");
        Ok(config)
    }

    fn build_figment<T: Serialize + Default>(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(T::default()));

        let overrides = std::mem::take(&mut self.figment);
        figment = figment.merge(overrides);

        match self.resolve() {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration file");
                figment = figment.merge(Yaml::file(path));
            }
            Some(path) => return Err(ConfigError::FileNotFound(path)),
            None => warn!(file = %self.file_name, "No configuration file found, using defaults"),
        }

        if let Some(prefix) = &self.env_prefix {
            trace!(prefix = %prefix, "Loading environment variables");
            figment = figment.merge(Env::prefixed(prefix).split("__"));
        }

        Ok(figment)
    }
}

/// Moves a legacy config file to `target` if only the legacy file exists.
///
/// Returns true if a file was moved.
pub fn migrate_legacy(legacy: &Path, target: &Path) -> ConfigResult<bool> {
    if target.exists() || !legacy.exists() {
        return Ok(false);
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(legacy, target)?;
    info!(
        from = %legacy.display(),
        to = %target.display(),
        "Migrated legacy configuration file"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use guild_adapter_qqguild::{Permission, QQGuildConfig};

    use super::*;
    use crate::config::schema::{LogLevel, RuntimeConfig};

    #[test]
    fn test_missing_file_yields_defaults() {
        Jail::expect_with(|_| {
            let config: QQGuildConfig = ConfigLoader::new("QQGuild.yaml")
                .search_path("config")
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config, QQGuildConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_must_exist() {
        Jail::expect_with(|_| {
            let result = ConfigLoader::new("QQGuild.yaml")
                .file("nope.yaml")
                .load::<QQGuildConfig>();
            assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/QQGuild.yaml",
                "permission: admin\ntoken:\n  - \"0:1:1:a\"\nid_prefix: file_\n",
            )?;
            jail.set_env("QQGUILD_ID_PREFIX", "env_");

            let config: QQGuildConfig = ConfigLoader::new("QQGuild.yaml")
                .search_path("config")
                .with_env("QQGUILD_")
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.permission, Permission::Admin);
            assert_eq!(config.token, vec!["0:1:1:a"]);
            assert_eq!(config.id_prefix, "env_");
            assert!(!config.tips.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_nested_env_key() {
        Jail::expect_with(|jail| {
            jail.set_env("GUILD_LOGGING__LEVEL", "debug");
            let config: RuntimeConfig = ConfigLoader::new("runtime.yaml")
                .with_env("GUILD_")
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[test]
    fn test_search_order() {
        Jail::expect_with(|jail| {
            jail.create_dir("a")?;
            jail.create_dir("b")?;
            jail.create_file("b/QQGuild.yaml", "id_prefix: b_\n")?;
            let loader = ConfigLoader::new("QQGuild.yaml").search_path("a").search_path("b");
            assert_eq!(loader.resolve(), Some(PathBuf::from("b/QQGuild.yaml")));
            Ok(())
        });
    }

    #[test]
    fn test_migrate_legacy() {
        Jail::expect_with(|jail| {
            jail.create_dir("plugins")?;
            jail.create_dir("plugins/QQGuild-Plugin")?;
            jail.create_file("plugins/QQGuild-Plugin/config.yaml", "id_prefix: old_\n")?;

            let legacy = Path::new("plugins/QQGuild-Plugin/config.yaml");
            let target = Path::new("config/QQGuild.yaml");
            assert!(migrate_legacy(legacy, target).map_err(|e| e.to_string())?);
            assert!(target.exists());
            assert!(!legacy.exists());

            // Second run is a no-op.
            assert!(!migrate_legacy(legacy, target).map_err(|e| e.to_string())?);
            Ok(())
        });
    }
}
