//! Configuration types for the QQ guild adapter.
//!
//! The adapter settings live in `config/QQGuild.yaml`:
//!
//! ```yaml
//! tips:
//!   - "..."
//! permission: master
//! token:
//!   - "0:1:102000000:AbCdEfGhIjKlMnOpQrStUvWxYz123456"
//! hide_recall_tip: false
//! to_qr_code: true
//! id_prefix: ""
//! ```
//!
//! Each token is `sandbox:guildMessages:appId:secret`, both flags being `0`
//! or `1`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use guild_core::AdapterError;

use crate::model::gateway::intents;

/// Production REST host.
pub const API_BASE: &str = "https://api.sgroup.qq.com";

/// Sandbox REST host.
pub const SANDBOX_API_BASE: &str = "https://sandbox.api.sgroup.qq.com";

/// QQ guild adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QQGuildConfig {
    /// Informational lines rewritten on every save.
    pub tips: Vec<String>,

    /// Who may run the account management commands.
    pub permission: Permission,

    /// Account tokens, one per connected account.
    pub token: Vec<String>,

    /// Default for the `hide` flag of message recalls.
    pub hide_recall_tip: bool,

    /// Whether the host should turn URLs in outgoing text into QR codes.
    ///
    /// Stored for the host framework; the adapter does not act on it.
    pub to_qr_code: bool,

    /// Prefix prepended to platform user ids before they reach the framework.
    pub id_prefix: String,
}

impl Default for QQGuildConfig {
    fn default() -> Self {
        Self {
            tips: default_tips(),
            permission: Permission::Master,
            token: Vec::new(),
            hide_recall_tip: false,
            to_qr_code: true,
            id_prefix: String::new(),
        }
    }
}

/// The tips written at the top of the config file.
pub fn default_tips() -> Vec<String> {
    vec![
        "欢迎使用 QQ频道 适配器".to_string(),
        "账号格式：沙盒(0/1):私域(0/1):AppID:Token".to_string(),
    ]
}

impl QQGuildConfig {
    /// Returns true if `token` is configured.
    pub fn has_token(&self, token: &str) -> bool {
        self.token.iter().any(|t| t == token)
    }
}

// =============================================================================
// Permission
// =============================================================================

/// Permission level required to run account commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Anyone.
    All,
    /// Guild administrators, owners and masters.
    Admin,
    /// Guild owners and masters.
    Owner,
    /// Bot masters only.
    #[default]
    Master,
}

/// Role of the user invoking a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    /// Regular member.
    Member,
    /// Guild or channel administrator.
    Admin,
    /// Guild owner.
    Owner,
    /// Bot master, configured by the host.
    Master,
}

impl Role {
    /// Derives a role from QQ guild role ids.
    ///
    /// `4` is the guild owner, `2` a guild admin and `5` a sub-channel admin.
    pub fn from_member_roles<S: AsRef<str>>(roles: &[S], is_master: bool) -> Self {
        if is_master {
            return Role::Master;
        }
        let has = |id: &str| roles.iter().any(|r| r.as_ref() == id);
        if has("4") {
            Role::Owner
        } else if has("2") || has("5") {
            Role::Admin
        } else {
            Role::Member
        }
    }
}

impl Permission {
    /// Returns true if `role` satisfies this permission level.
    pub fn allows(self, role: Role) -> bool {
        match self {
            Permission::All => true,
            Permission::Admin => role >= Role::Admin,
            Permission::Owner => role >= Role::Owner,
            Permission::Master => role == Role::Master,
        }
    }
}

// =============================================================================
// Account Token
// =============================================================================

/// A parsed `sandbox:guildMessages:appId:secret` account token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountToken {
    /// Use the sandbox API host.
    pub sandbox: bool,
    /// Private-domain bot receiving every guild message.
    pub guild_messages: bool,
    /// Application id.
    pub app_id: String,
    /// Bot token.
    pub secret: String,
}

impl AccountToken {
    /// Returns the gateway intents requested for this account.
    pub fn intents(&self) -> u32 {
        let base = intents::GUILDS
            | intents::GUILD_MEMBERS
            | intents::GUILD_MESSAGE_REACTIONS
            | intents::DIRECT_MESSAGE
            | intents::INTERACTION
            | intents::MESSAGE_AUDIT;
        if self.guild_messages {
            base | intents::GUILD_MESSAGES | intents::FORUMS_EVENT
        } else {
            base | intents::PUBLIC_GUILD_MESSAGES | intents::OPEN_FORUMS_EVENT
        }
    }

    /// Returns the REST host for this account.
    pub fn api_base(&self) -> &'static str {
        if self.sandbox {
            SANDBOX_API_BASE
        } else {
            API_BASE
        }
    }

    /// Returns the credential used by both REST and gateway.
    pub fn authorization(&self) -> String {
        format!("Bot {}.{}", self.app_id, self.secret)
    }
}

fn parse_flag(value: &str, token: &str) -> Result<bool, AdapterError> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(AdapterError::InvalidToken(format!(
            "flag `{value}` in `{token}` must be 0 or 1"
        ))),
    }
}

impl FromStr for AccountToken {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parts: Vec<&str> = s.splitn(4, ':').collect();
        let [sandbox, guild_messages, app_id, secret] = parts.as_slice() else {
            return Err(AdapterError::InvalidToken(format!(
                "expected 4 colon separated fields, got `{s}`"
            )));
        };
        if app_id.is_empty() || !app_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AdapterError::InvalidToken(format!(
                "app id `{app_id}` must be numeric"
            )));
        }
        if secret.is_empty() {
            return Err(AdapterError::InvalidToken("secret is empty".to_string()));
        }
        Ok(Self {
            sandbox: parse_flag(sandbox, s)?,
            guild_messages: parse_flag(guild_messages, s)?,
            app_id: app_id.to_string(),
            secret: secret.to_string(),
        })
    }
}

impl fmt::Display for AccountToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            u8::from(self.sandbox),
            u8::from(self.guild_messages),
            self.app_id,
            self.secret
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token() {
        let token: AccountToken = "1:0:102000000:abc:def".parse().unwrap();
        assert!(token.sandbox);
        assert!(!token.guild_messages);
        assert_eq!(token.app_id, "102000000");
        assert_eq!(token.secret, "abc:def");
        assert_eq!(token.api_base(), SANDBOX_API_BASE);
        assert_eq!(token.authorization(), "Bot 102000000.abc:def");
        assert_eq!(token.to_string(), "1:0:102000000:abc:def");
    }

    #[test]
    fn test_parse_token_rejects_malformed() {
        assert!("0:1:102000000".parse::<AccountToken>().is_err());
        assert!("2:1:102000000:x".parse::<AccountToken>().is_err());
        assert!("0:1:app:x".parse::<AccountToken>().is_err());
        assert!("0:1:1:".parse::<AccountToken>().is_err());
    }

    #[test]
    fn test_intents_follow_guild_messages_flag() {
        let private: AccountToken = "0:1:1:x".parse().unwrap();
        let public: AccountToken = "0:0:1:x".parse().unwrap();

        assert_ne!(private.intents() & intents::GUILD_MESSAGES, 0);
        assert_ne!(private.intents() & intents::FORUMS_EVENT, 0);
        assert_eq!(private.intents() & intents::PUBLIC_GUILD_MESSAGES, 0);

        assert_ne!(public.intents() & intents::PUBLIC_GUILD_MESSAGES, 0);
        assert_ne!(public.intents() & intents::OPEN_FORUMS_EVENT, 0);
        assert_eq!(public.intents() & intents::GUILD_MESSAGES, 0);
        assert_ne!(public.intents() & intents::DIRECT_MESSAGE, 0);
    }

    #[test]
    fn test_permission_levels() {
        assert!(Permission::All.allows(Role::Member));
        assert!(Permission::Admin.allows(Role::Owner));
        assert!(!Permission::Owner.allows(Role::Admin));
        assert!(!Permission::Master.allows(Role::Owner));
        assert!(Permission::Master.allows(Role::Master));
        assert_eq!(Role::from_member_roles(&["1", "4"], false), Role::Owner);
        assert_eq!(Role::from_member_roles(&["5"], false), Role::Admin);
        assert_eq!(Role::from_member_roles::<&str>(&[], true), Role::Master);
    }

    #[test]
    fn test_config_from_yaml_with_defaults() {
        let yaml = r#"
permission: admin
token:
  - "0:1:102000000:secret"
"#;
        let config: QQGuildConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.permission, Permission::Admin);
        assert!(config.has_token("0:1:102000000:secret"));
        assert!(!config.hide_recall_tip);
        assert!(config.to_qr_code);
        assert_eq!(config.id_prefix, "");
    }
}
