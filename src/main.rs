//! NewsApp configuration bootstrap launcher.
//!
//! Boots the configuration the way the client does at startup, then keeps it
//! fresh in the background until interrupted.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use newsapp_config::config::Config;
use newsapp_config::db::{self, SqliteConfigStore};
use newsapp_config::helpers::check_version_compatibility;
use newsapp_config::localization::LocalizationService;
use newsapp_config::network::TcpProbe;
use newsapp_config::remote::HttpConfigFetcher;
use newsapp_config::{AppConfigService, BootstrapOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting NewsApp configuration bootstrap");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("API base URL: {}", config.api_base_url);

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let store = Arc::new(SqliteConfigStore::new(pool));

    let fetcher = Arc::new(HttpConfigFetcher::new(
        &config.api_base_url,
        config.fetch_timeout,
    )?);
    let connectivity = Arc::new(TcpProbe::new(
        config.connectivity_probe.clone(),
        Duration::from_secs(3),
    ));

    let service = Arc::new(AppConfigService::new(
        store,
        fetcher,
        connectivity,
        BootstrapOptions::from_config(&config),
    ));

    let app_config = service.initialize().await;
    let state = service.state();
    tracing::info!(
        "Configuration {} ready (source: {:?}, {} tabs)",
        app_config.version_tag(),
        state.source,
        app_config.tabs().len()
    );

    // Dependents run only on an initialized configuration
    let localization = LocalizationService::default();
    if let Some(language) = localization.apply_config(&app_config) {
        tracing::info!("Active language: {} ({})", language.name, language.code);
    }

    let compatibility = check_version_compatibility(Some(&app_config), &config.app_version);
    if !compatibility.is_compatible {
        tracing::warn!(
            "Client {} is below the minimum supported version {}",
            config.app_version,
            compatibility.minimum_version
        );
    } else if compatibility.needs_update {
        tracing::info!("Update available: {}", compatibility.target_version);
    }

    let status = service.sync_status().await;
    tracing::info!(
        "Sync status: online={}, valid cache={}, sync needed={}",
        status.is_online,
        status.has_valid_cache,
        status.is_sync_needed
    );

    let background = service.spawn_background_sync(config.sync_check_interval);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    background.abort();

    Ok(())
}
