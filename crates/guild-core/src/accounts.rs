//! Bot trait and the process-wide account registry.
//!
//! Every connected account registers itself once its handshake succeeds.
//! The registry is created on first use and lives for the rest of the
//! process: there is no unregister, so removing an account token only takes
//! effect after a restart.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::{debug, info};

/// An active, connected bot account.
pub trait Bot: Send + Sync {
    /// Returns the account's unique identifier.
    fn id(&self) -> &str;

    /// Returns the adapter name this account belongs to.
    fn adapter_name(&self) -> &str;

    /// Returns the account's display name.
    fn nickname(&self) -> &str;

    /// Returns self as an `Arc<dyn Any>` for downcasting.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A shared Bot trait object.
pub type BoxedBot = Arc<dyn Bot>;

/// Attempts to downcast a [`BoxedBot`] to a concrete bot type.
pub fn downcast_bot<T: Bot + 'static>(bot: BoxedBot) -> Option<Arc<T>> {
    Arc::downcast::<T>(bot.as_any()).ok()
}

/// Registry of connected accounts, keyed by account id.
#[derive(Default)]
pub struct AccountRegistry {
    /// Ids in registration order.
    order: RwLock<Vec<String>>,
    bots: RwLock<HashMap<String, BoxedBot>>,
}

impl AccountRegistry {
    /// Creates an empty registry.
    ///
    /// Most code should use the process-wide [`accounts()`] instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a bot.
    ///
    /// Returns true if the id was not registered before.
    pub fn register(&self, bot: BoxedBot) -> bool {
        let id = bot.id().to_string();
        let adapter = bot.adapter_name().to_string();
        let replaced = self.bots.write().insert(id.clone(), bot).is_some();
        if replaced {
            debug!(bot_id = %id, adapter = %adapter, "Replaced registered account");
            return false;
        }
        self.order.write().push(id.clone());
        info!(bot_id = %id, adapter = %adapter, "Registered account");
        true
    }

    /// Returns the bot registered under `id`.
    pub fn get(&self, id: &str) -> Option<BoxedBot> {
        self.bots.read().get(id).cloned()
    }

    /// Returns true if `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.bots.read().contains_key(id)
    }

    /// Returns all registered ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Returns the number of registered accounts.
    pub fn len(&self) -> usize {
        self.order.read().len()
    }

    /// Returns true if no account is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns the process-wide account registry, creating it on first use.
pub fn accounts() -> &'static AccountRegistry {
    static ACCOUNTS: OnceLock<AccountRegistry> = OnceLock::new();
    ACCOUNTS.get_or_init(AccountRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBot(&'static str);

    impl Bot for TestBot {
        fn id(&self) -> &str {
            self.0
        }

        fn adapter_name(&self) -> &str {
            "test"
        }

        fn nickname(&self) -> &str {
            "tester"
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    #[test]
    fn test_register_keeps_order_and_dedups() {
        let registry = AccountRegistry::new();
        assert!(registry.register(Arc::new(TestBot("b"))));
        assert!(registry.register(Arc::new(TestBot("a"))));
        assert!(!registry.register(Arc::new(TestBot("b"))));

        assert_eq!(registry.ids(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_downcast_bot() {
        let registry = AccountRegistry::new();
        registry.register(Arc::new(TestBot("x")));
        let bot = registry.get("x").unwrap();
        let concrete = downcast_bot::<TestBot>(bot).unwrap();
        assert_eq!(concrete.0, "x");
    }
}
