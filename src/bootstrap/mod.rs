//! Bootstrap orchestrator.
//!
//! Decides at launch which configuration the app runs with and publishes it
//! through a `watch` channel. The sequence is cache, then remote, then cache
//! again, then the hardcoded default. Every failure degrades to the next tier,
//! so [`AppConfigService::initialize`] cannot fail.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::ConfigStore;
use crate::errors::AppError;
use crate::models::ConfigurationDocument;
use crate::network::Connectivity;
use crate::remote::ConfigFetcher;
use crate::sync::{SyncOutcome, SyncService, SyncStatus, DEFAULT_CACHE_MAX_AGE};

/// Default outer deadline for the bootstrap sequence.
pub const DEFAULT_STARTUP_DEADLINE: Duration = Duration::from_secs(15);

/// Where the published configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Cache,
    Remote,
    Default,
}

/// State shared with dependent modules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfigState {
    pub config: Option<Arc<ConfigurationDocument>>,
    pub is_loading: bool,
    /// Set only when a user-initiated refresh fails
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_initialized: bool,
    pub is_onboarding_completed: bool,
    pub source: Option<ConfigSource>,
}

/// Tunables for [`AppConfigService`].
#[derive(Clone)]
pub struct BootstrapOptions {
    pub startup_deadline: Duration,
    pub cache_max_age: Duration,
    pub clock: Arc<dyn Clock>,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            startup_deadline: DEFAULT_STARTUP_DEADLINE,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            clock: Arc::new(SystemClock),
        }
    }
}

impl BootstrapOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            startup_deadline: config.startup_deadline,
            cache_max_age: config.cache_max_age,
            ..Self::default()
        }
    }
}

pub struct AppConfigService {
    store: Arc<dyn ConfigStore>,
    fetcher: Arc<dyn ConfigFetcher>,
    connectivity: Arc<dyn Connectivity>,
    sync: Arc<SyncService>,
    clock: Arc<dyn Clock>,
    startup_deadline: Duration,
    state: watch::Sender<AppConfigState>,
    /// Serializes initialize/reinitialize so only one bootstrap path runs
    bootstrap_lock: Mutex<()>,
}

impl AppConfigService {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        fetcher: Arc<dyn ConfigFetcher>,
        connectivity: Arc<dyn Connectivity>,
        options: BootstrapOptions,
    ) -> Self {
        let sync = Arc::new(SyncService::new(
            store.clone(),
            fetcher.clone(),
            connectivity.clone(),
            options.clock.clone(),
            options.cache_max_age,
        ));
        let (state, _) = watch::channel(AppConfigState::default());

        Self {
            store,
            fetcher,
            connectivity,
            sync,
            clock: options.clock,
            startup_deadline: options.startup_deadline,
            state,
            bootstrap_lock: Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AppConfigState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AppConfigState {
        self.state.borrow().clone()
    }

    pub fn current_config(&self) -> Option<Arc<ConfigurationDocument>> {
        self.state.borrow().config.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().is_initialized
    }

    pub fn sync(&self) -> &Arc<SyncService> {
        &self.sync
    }

    pub async fn sync_status(&self) -> SyncStatus {
        self.sync.sync_status().await
    }

    pub fn set_onboarding_completed(&self, completed: bool) {
        self.state
            .send_modify(|state| state.is_onboarding_completed = completed);
    }

    /// Run the bootstrap sequence once; later calls return the published
    /// configuration.
    pub async fn initialize(&self) -> Arc<ConfigurationDocument> {
        let _lock = self.bootstrap_lock.lock().await;

        let current = {
            let state = self.state.borrow();
            state.is_initialized.then(|| state.config.clone()).flatten()
        };
        if let Some(config) = current {
            return config;
        }

        self.run_bootstrap().await
    }

    /// Drop the in-memory configuration and bootstrap again.
    pub async fn reinitialize(&self) -> Arc<ConfigurationDocument> {
        let _lock = self.bootstrap_lock.lock().await;
        tracing::info!("Force re-initializing configuration");

        self.state.send_modify(|state| {
            state.config = None;
            state.error = None;
            state.last_updated = None;
            state.is_initialized = false;
            state.source = None;
        });

        self.run_bootstrap().await
    }

    /// User-initiated refresh. Failures are surfaced in `error` and returned.
    pub async fn refresh(&self, force_refresh: bool) -> Result<SyncOutcome, AppError> {
        self.state.send_modify(|state| {
            state.is_loading = true;
            state.error = None;
        });

        let result = if force_refresh {
            self.sync.force_sync().await
        } else {
            self.sync.sync_if_needed().await
        };

        match &result {
            Ok(SyncOutcome::Synced(config)) => {
                self.publish(config.clone(), ConfigSource::Remote);
            }
            Ok(outcome) => {
                tracing::debug!("Refresh finished without new config: {:?}", outcome);
                self.state.send_modify(|state| state.is_loading = false);
            }
            Err(e) => {
                tracing::error!("Configuration refresh failed: {}", e);
                let message = e.message();
                self.state.send_modify(|state| {
                    state.error = Some(message);
                    state.is_loading = false;
                });
            }
        }

        result
    }

    /// Resolve once a configuration is initialized or `deadline` elapses,
    /// whichever comes first. The returned state may hold no config.
    pub async fn wait_until_initialized(&self, deadline: Duration) -> AppConfigState {
        let mut rx = self.state.subscribe();
        let waited = tokio::time::timeout(deadline, async {
            rx.wait_for(|state| state.is_initialized)
                .await
                .map(|state| (*state).clone())
        })
        .await;

        match waited {
            Ok(Ok(state)) => state,
            _ => {
                tracing::warn!("Configuration not initialized within {:?}", deadline);
                self.state()
            }
        }
    }

    /// Periodically re-sync when the cached configuration goes stale.
    pub fn spawn_background_sync(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; bootstrap already ran.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match service.sync.sync_if_needed().await {
                    Ok(SyncOutcome::Synced(config)) => {
                        service.publish(config, ConfigSource::Remote)
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Background sync failed: {}", e),
                }
            }
        })
    }

    async fn run_bootstrap(&self) -> Arc<ConfigurationDocument> {
        self.state.send_modify(|state| {
            state.is_loading = true;
            state.error = None;
        });

        let (config, source) = match tokio::time::timeout(self.startup_deadline, self.bootstrap())
            .await
        {
            Ok(resolved) => resolved,
            Err(_) => {
                tracing::warn!(
                    "Bootstrap exceeded {:?}, using default configuration",
                    self.startup_deadline
                );
                (
                    Arc::new(ConfigurationDocument::fallback()),
                    ConfigSource::Default,
                )
            }
        };

        self.publish_bootstrap(config, source)
    }

    /// The bootstrap decision procedure. Publishing is left to the caller so
    /// that it is always the last step.
    async fn bootstrap(&self) -> (Arc<ConfigurationDocument>, ConfigSource) {
        // Fast path
        if let Some(cached) = self.load_cached().await {
            if !cached.is_default() {
                tracing::info!("Using cached configuration {}", cached.version_tag());
                return (Arc::new(cached), ConfigSource::Cache);
            }
        }

        match self.fetch_remote().await {
            Ok(fresh) => {
                if let Err(e) = self.store.save(&fresh).await {
                    tracing::warn!("Fetched config could not be cached: {}", e);
                }
                tracing::info!("Using remote configuration {}", fresh.version_tag());
                return (Arc::new(fresh), ConfigSource::Remote);
            }
            Err(e) => tracing::warn!("Remote configuration unavailable: {}", e),
        }

        if let Some(cached) = self.load_cached().await {
            tracing::info!("Using fallback cached configuration");
            return (Arc::new(cached), ConfigSource::Cache);
        }

        tracing::info!("No remote or cached configuration, using default");
        (
            Arc::new(ConfigurationDocument::fallback()),
            ConfigSource::Default,
        )
    }

    async fn load_cached(&self) -> Option<ConfigurationDocument> {
        match self.store.load().await {
            Ok(Some(config)) => match config.validate() {
                Ok(()) => Some(config),
                Err(e) => {
                    tracing::warn!("Ignoring cached configuration: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Error reading cached configuration: {}", e);
                None
            }
        }
    }

    async fn fetch_remote(&self) -> Result<ConfigurationDocument, AppError> {
        if !self.connectivity.is_online().await {
            return Err(AppError::Network("No internet connection".to_string()));
        }
        self.fetcher.fetch().await
    }

    /// Publish the bootstrap result unless a refresh or background sync
    /// published while bootstrap was running. Bootstrap only runs while
    /// uninitialized, so an initialized state here is always newer; it is
    /// kept and returned instead.
    fn publish_bootstrap(
        &self,
        config: Arc<ConfigurationDocument>,
        source: ConfigSource,
    ) -> Arc<ConfigurationDocument> {
        let now = self.clock.now();
        let mut published = config.clone();
        self.state.send_modify(|state| {
            if state.is_initialized {
                if let Some(newer) = &state.config {
                    tracing::info!(
                        "Configuration {} published during bootstrap, discarding {:?} result",
                        newer.version_tag(),
                        source
                    );
                    published = newer.clone();
                }
                state.is_loading = false;
                return;
            }
            state.config = Some(config);
            state.source = Some(source);
            state.error = None;
            state.last_updated = Some(now);
            state.is_loading = false;
            state.is_initialized = true;
        });
        published
    }

    fn publish(&self, config: Arc<ConfigurationDocument>, source: ConfigSource) {
        let now = self.clock.now();
        self.state.send_modify(|state| {
            state.config = Some(config);
            state.source = Some(source);
            state.error = None;
            state.last_updated = Some(now);
            state.is_loading = false;
            state.is_initialized = true;
        });
    }
}
