//! Process lifecycle: configuration, logging, the adapter and shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use guild_runtime::GuildRuntime;
//!
//! let runtime = GuildRuntime::builder().config_dir("config").build()?;
//! let mut events = runtime.events().subscribe();
//! tokio::spawn(async move { while let Some(e) = events.recv().await { /* ... */ } });
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::RwLock;
use tracing::{debug, info};

use guild_adapter_qqguild::{AccountCommands, GuildBot, QQGuildAdapter, QQGuildConfig};
use guild_core::{EventBus, accounts, downcast_bot};

use crate::config::store::LEGACY_CONFIG_PATH;
use crate::config::{ConfigLoader, RuntimeConfig, YamlConfigStore};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Environment prefix for `runtime.yaml` keys.
pub const RUNTIME_ENV_PREFIX: &str = "GUILD_";

/// Account commands backed by the runtime's config file.
pub type RuntimeCommands = AccountCommands<YamlConfigStore, Arc<QQGuildAdapter>>;

/// Builder for [`GuildRuntime`].
pub struct RuntimeBuilder {
    config_dir: PathBuf,
    legacy_file: Option<PathBuf>,
    init_logging: bool,
    load_env: bool,
    event_capacity: usize,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config"),
            legacy_file: Some(PathBuf::from(LEGACY_CONFIG_PATH)),
            init_logging: true,
            load_env: true,
            event_capacity: 1024,
        }
    }
}

impl RuntimeBuilder {
    /// Directory holding `QQGuild.yaml` and `runtime.yaml`.
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// Legacy adapter config moved into the config directory on build.
    pub fn legacy_file(mut self, path: Option<PathBuf>) -> Self {
        self.legacy_file = path;
        self
    }

    /// Skip installing the global tracing subscriber.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Ignore `GUILD_*` and `QQGUILD_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn build(self) -> RuntimeResult<GuildRuntime> {
        let mut loader = ConfigLoader::new("runtime.yaml")
            .search_path(&self.config_dir)
            .with_user_config_dir();
        if self.load_env {
            loader = loader.with_env(RUNTIME_ENV_PREFIX);
        }
        let config: RuntimeConfig = loader.load()?;

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let mut store = YamlConfigStore::new(self.config_dir.join("QQGuild.yaml"));
        if !self.load_env {
            store = store.without_env();
        }
        if let Some(legacy) = &self.legacy_file {
            store.migrate_from(legacy)?;
        }
        let adapter_config = store.read()?;

        let events = EventBus::new(self.event_capacity);
        let adapter = Arc::new(QQGuildAdapter::new(&adapter_config, events.clone()));

        debug!(
            config_dir = %self.config_dir.display(),
            accounts = adapter_config.token.len(),
            "Runtime built"
        );

        Ok(GuildRuntime {
            config,
            adapter_config,
            store,
            events,
            adapter,
            bots: RwLock::new(Vec::new()),
        })
    }
}

/// Owns the adapter and the bots it connected.
pub struct GuildRuntime {
    config: RuntimeConfig,
    adapter_config: QQGuildConfig,
    store: YamlConfigStore,
    events: EventBus,
    adapter: Arc<QQGuildAdapter>,
    bots: RwLock<Vec<Arc<GuildBot>>>,
}

impl GuildRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Adapter settings as loaded at build time.
    pub fn adapter_config(&self) -> &QQGuildConfig {
        &self.adapter_config
    }

    pub fn store(&self) -> &YamlConfigStore {
        &self.store
    }

    /// The bus every account publishes on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn adapter(&self) -> &Arc<QQGuildAdapter> {
        &self.adapter
    }

    /// Account commands that persist to this runtime's config file.
    pub fn commands(&self) -> RuntimeCommands {
        AccountCommands::new(self.store.clone(), Arc::clone(&self.adapter))
    }

    /// Bots connected by [`start`](Self::start).
    pub async fn bots(&self) -> Vec<Arc<GuildBot>> {
        self.bots.read().await.clone()
    }

    /// Connects every configured account. Returns the number connected.
    pub async fn start(&self) -> usize {
        let bots = self.adapter.load().await;
        let count = bots.len();
        self.bots.write().await.extend(bots);
        count
    }

    /// Closes every connected account, including ones added by command.
    pub async fn stop(&self) {
        self.bots.write().await.clear();
        let registry = accounts();
        for id in registry.ids() {
            if let Some(bot) = registry.get(&id).and_then(downcast_bot::<GuildBot>) {
                bot.close();
                debug!(bot_id = %id, "Closed account");
            }
        }
        info!("Runtime stopped");
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await;
        info!("QQ guild runtime is now running. Press Ctrl+C to stop.");

        let result = wait_for_shutdown().await;
        self.stop().await;
        result
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await;
        shutdown.await;
        self.stop().await;
        Ok(())
    }
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RuntimeError::Signal)?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(RuntimeError::Signal)?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}
