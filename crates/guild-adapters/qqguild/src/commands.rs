//! Account management commands.
//!
//! Two chat commands manage the configured tokens:
//!
//! | Command | Effect |
//! |---|---|
//! | `#QQ频道账号` | list the configured tokens |
//! | `#QQ频道设置<sandbox>:<guildMessages>:<appId>:<secret>` | remove the token if present, otherwise connect and add it |
//!
//! Both are gated by the configured [`Permission`](crate::config::Permission). `Q` may be repeated or
//! lowercase and `频道` may be spelled `guild`.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{error, info, warn};

use guild_core::AdapterResult;

use crate::bot::GuildBot;
use crate::config::{QQGuildConfig, Role};

static LIST_ACCOUNTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#[Qq]+(?:频道|[Gg]uild)账号$").expect("static regex")
});

static SET_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#[Qq]+(?:频道|[Gg]uild)设置([01]:[01]:[0-9]+:.+)$").expect("static regex")
});

/// Persistence of the adapter configuration.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> anyhow::Result<QQGuildConfig>;
    fn save(&self, config: &QQGuildConfig) -> anyhow::Result<()>;
}

/// Connects an account from a token at runtime.
#[async_trait]
pub trait AccountConnector: Send + Sync {
    /// Returns `None` if the handshake failed.
    async fn connect_account(&self, token: &str) -> AdapterResult<Option<Arc<GuildBot>>>;
}

#[async_trait]
impl<T: AccountConnector + ?Sized> AccountConnector for Arc<T> {
    async fn connect_account(&self, token: &str) -> AdapterResult<Option<Arc<GuildBot>>> {
        (**self).connect_account(token).await
    }
}

/// A parsed account command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ListAccounts,
    SetToken(String),
}

impl Command {
    /// Parses a message text. Returns `None` for anything that is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if LIST_ACCOUNTS.is_match(text) {
            return Some(Self::ListAccounts);
        }
        SET_TOKEN
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|token| Self::SetToken(token.as_str().to_string()))
    }
}

/// Executes account commands against a config store.
pub struct AccountCommands<S, C> {
    store: S,
    connector: C,
}

impl<S: ConfigStore, C: AccountConnector> AccountCommands<S, C> {
    pub fn new(store: S, connector: C) -> Self {
        Self { store, connector }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handles `text` sent by a user with `role`.
    ///
    /// Returns the reply, or `None` if the text is not a command or the user
    /// lacks permission.
    pub async fn handle(&self, text: &str, role: Role) -> anyhow::Result<Option<String>> {
        let Some(command) = Command::parse(text) else {
            return Ok(None);
        };
        let mut config = self.store.load()?;
        if !config.permission.allows(role) {
            warn!(?role, required = ?config.permission, "Account command denied");
            return Ok(None);
        }

        let reply = match command {
            Command::ListAccounts => format!(
                "共{}个账号：\n{}",
                config.token.len(),
                config.token.join("\n")
            ),
            Command::SetToken(token) => self.set_token(&mut config, token).await?,
        };
        Ok(Some(reply))
    }

    async fn set_token(&self, config: &mut QQGuildConfig, token: String) -> anyhow::Result<String> {
        if config.has_token(&token) {
            config.token.retain(|t| t != &token);
            self.store.save(config)?;
            info!(accounts = config.token.len(), "Account token removed");
            return Ok(format!(
                "账号已删除，重启后生效，共{}个账号",
                config.token.len()
            ));
        }

        match self.connector.connect_account(&token).await {
            Ok(Some(bot)) => {
                config.token.push(token);
                self.store.save(config)?;
                info!(bot_id = %bot.id(), accounts = config.token.len(), "Account token added");
                Ok(format!("账号已连接，共{}个账号", config.token.len()))
            }
            Ok(None) => Ok("账号连接失败".to_string()),
            Err(e) => {
                error!(error = %e, "Account connection failed");
                Ok("账号连接失败".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::bot::BotSettings;
    use crate::config::Permission;
    use crate::testing::{MockApi, test_bot};

    #[derive(Default)]
    struct MemoryStore {
        config: Mutex<QQGuildConfig>,
        saves: Mutex<usize>,
    }

    impl ConfigStore for MemoryStore {
        fn load(&self) -> anyhow::Result<QQGuildConfig> {
            Ok(self.config.lock().clone())
        }

        fn save(&self, config: &QQGuildConfig) -> anyhow::Result<()> {
            *self.config.lock() = config.clone();
            *self.saves.lock() += 1;
            Ok(())
        }
    }

    /// Accepts tokens whose secret is `good`.
    struct FakeConnector;

    #[async_trait]
    impl AccountConnector for FakeConnector {
        async fn connect_account(&self, token: &str) -> AdapterResult<Option<Arc<GuildBot>>> {
            let token: crate::config::AccountToken = token.parse()?;
            Ok((token.secret == "good")
                .then(|| test_bot(Arc::new(MockApi::default()), BotSettings::default())))
        }
    }

    fn commands(tokens: &[&str], permission: Permission) -> AccountCommands<MemoryStore, FakeConnector> {
        let store = MemoryStore::default();
        {
            let mut config = store.config.lock();
            config.token = tokens.iter().map(|t| t.to_string()).collect();
            config.permission = permission;
        }
        AccountCommands::new(store, FakeConnector)
    }

    #[test]
    fn test_parse() {
        assert_eq!(Command::parse("#QQ频道账号"), Some(Command::ListAccounts));
        assert_eq!(Command::parse("#qqGuild账号"), Some(Command::ListAccounts));
        assert_eq!(
            Command::parse("#QQ频道设置0:1:123:abc"),
            Some(Command::SetToken("0:1:123:abc".into()))
        );
        assert_eq!(Command::parse("#QQ频道设置2:1:123:abc"), None);
        assert_eq!(Command::parse("#QQ频道设置0:1:app:abc"), None);
        assert_eq!(Command::parse("hello"), None);
    }

    #[tokio::test]
    async fn test_list_accounts() {
        let cmds = commands(&["0:1:1:a", "1:0:2:b"], Permission::Master);
        let reply = cmds.handle("#QQ频道账号", Role::Master).await.unwrap();
        assert_eq!(reply.as_deref(), Some("共2个账号：\n0:1:1:a\n1:0:2:b"));
    }

    #[tokio::test]
    async fn test_permission_gate() {
        let cmds = commands(&[], Permission::Admin);
        assert!(cmds.handle("#QQ频道账号", Role::Member).await.unwrap().is_none());
        assert!(cmds.handle("#QQ频道账号", Role::Owner).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_set_token_removes_existing() {
        let cmds = commands(&["0:1:1:a", "0:1:2:b"], Permission::Master);
        let reply = cmds.handle("#QQ频道设置0:1:1:a", Role::Master).await.unwrap();
        assert_eq!(reply.as_deref(), Some("账号已删除，重启后生效，共1个账号"));
        assert_eq!(cmds.store().load().unwrap().token, vec!["0:1:2:b"]);
    }

    #[tokio::test]
    async fn test_set_token_connects_new() {
        let cmds = commands(&[], Permission::Master);
        let reply = cmds.handle("#QQ频道设置0:1:9:good", Role::Master).await.unwrap();
        assert_eq!(reply.as_deref(), Some("账号已连接，共1个账号"));
        assert_eq!(cmds.store().load().unwrap().token, vec!["0:1:9:good"]);
    }

    #[tokio::test]
    async fn test_failed_connection_is_not_saved() {
        let cmds = commands(&[], Permission::Master);
        let reply = cmds.handle("#QQ频道设置0:1:9:bad", Role::Master).await.unwrap();
        assert_eq!(reply.as_deref(), Some("账号连接失败"));
        assert_eq!(*cmds.store().saves.lock(), 0);
    }
}
