//! YAML-backed [`ConfigStore`].

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use guild_adapter_qqguild::config::default_tips;
use guild_adapter_qqguild::{ConfigStore, QQGuildConfig};

use super::error::ConfigResult;
use super::loader::{ConfigLoader, migrate_legacy};

/// Default location of the adapter settings.
pub const DEFAULT_CONFIG_PATH: &str = "config/QQGuild.yaml";

/// Location used by older plugin installs, migrated on first load.
pub const LEGACY_CONFIG_PATH: &str = "plugins/QQGuild-Plugin/config.yaml";

/// Environment prefix for adapter settings.
pub const ENV_PREFIX: &str = "QQGUILD_";

/// Reads and writes `QQGuild.yaml`.
#[derive(Debug, Clone)]
pub struct YamlConfigStore {
    path: PathBuf,
    env_prefix: Option<String>,
}

impl Default for YamlConfigStore {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

impl YamlConfigStore {
    /// A store at `path` that also reads `QQGUILD_*` variables.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    /// Ignores environment variables.
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves `legacy` to this store's path if the store has no file yet.
    pub fn migrate_from(&self, legacy: impl AsRef<Path>) -> ConfigResult<bool> {
        migrate_legacy(legacy.as_ref(), &self.path)
    }

    /// Loads the settings; a missing file yields the defaults.
    pub fn read(&self) -> ConfigResult<QQGuildConfig> {
        let mut loader = ConfigLoader::new(
            self.path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )
        .search_path(self.path.parent().unwrap_or_else(|| Path::new(".")));
        if let Some(prefix) = &self.env_prefix {
            loader = loader.with_env(prefix);
        }
        loader.load()
    }

    /// Writes `config`, resetting the tips.
    pub fn write(&self, config: &QQGuildConfig) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let config = QQGuildConfig {
            tips: default_tips(),
            ..config.clone()
        };
        fs::write(&self.path, serde_yaml::to_string(&config)?)?;
        debug!(path = %self.path.display(), accounts = config.token.len(), "Configuration saved");
        Ok(())
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> anyhow::Result<QQGuildConfig> {
        Ok(self.read()?)
    }

    fn save(&self, config: &QQGuildConfig) -> anyhow::Result<()> {
        Ok(self.write(config)?)
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_save_then_load() {
        Jail::expect_with(|_| {
            let store = YamlConfigStore::default().without_env();
            let config = QQGuildConfig {
                tips: vec!["edited".into()],
                token: vec!["1:0:7:s".into()],
                ..Default::default()
            };
            store.save(&config).map_err(|e| e.to_string())?;

            let loaded = store.load().map_err(|e| e.to_string())?;
            assert_eq!(loaded.token, vec!["1:0:7:s"]);
            assert_eq!(loaded.tips, default_tips());
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_is_default() {
        Jail::expect_with(|_| {
            let store = YamlConfigStore::new("config/QQGuild.yaml").without_env();
            assert_eq!(store.read().map_err(|e| e.to_string())?, QQGuildConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_migrates_legacy_file() {
        Jail::expect_with(|jail| {
            jail.create_dir("plugins")?;
            jail.create_dir("plugins/QQGuild-Plugin")?;
            jail.create_file(LEGACY_CONFIG_PATH, "token:\n  - \"0:0:3:x\"\n")?;

            let store = YamlConfigStore::default().without_env();
            assert!(store.migrate_from(LEGACY_CONFIG_PATH).map_err(|e| e.to_string())?);
            assert_eq!(store.read().map_err(|e| e.to_string())?.token, vec!["0:0:3:x"]);
            Ok(())
        });
    }
}
