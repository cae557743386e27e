//! Staleness and sync policy.
//!
//! The refresh interval comes from the cached document itself, so the server
//! decides how often clients re-sync. Only one sync runs at a time; a second
//! caller is told it was skipped rather than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::db::ConfigStore;
use crate::errors::AppError;
use crate::models::ConfigurationDocument;
use crate::network::Connectivity;
use crate::remote::ConfigFetcher;

/// Default age after which a cached document is no longer considered valid.
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another sync holds the guard
    InProgress,
    Offline,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// A fresh document was fetched and stored
    Synced(Arc<ConfigurationDocument>),
    /// The cached document is within its refresh interval
    Fresh,
    Skipped(SkipReason),
}

/// Read-only snapshot of the sync state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_online: bool,
    pub has_valid_cache: bool,
    pub is_sync_needed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_sync_time: Option<DateTime<Utc>>,
}

/// Cached sync timestamp paired with the server-declared interval.
struct Schedule {
    last_sync: DateTime<Utc>,
    interval: Option<Duration>,
}

impl Schedule {
    fn next_sync(&self) -> Option<DateTime<Utc>> {
        let interval = chrono::Duration::from_std(self.interval?).ok()?;
        self.last_sync.checked_add_signed(interval)
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_sync().is_some_and(|next| now >= next)
    }
}

/// Releases the in-flight flag on every exit path.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncService {
    store: Arc<dyn ConfigStore>,
    fetcher: Arc<dyn ConfigFetcher>,
    connectivity: Arc<dyn Connectivity>,
    clock: Arc<dyn Clock>,
    cache_max_age: Duration,
    syncing: AtomicBool,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        fetcher: Arc<dyn ConfigFetcher>,
        connectivity: Arc<dyn Connectivity>,
        clock: Arc<dyn Clock>,
        cache_max_age: Duration,
    ) -> Self {
        Self {
            store,
            fetcher,
            connectivity,
            clock,
            cache_max_age,
            syncing: AtomicBool::new(false),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    pub async fn has_valid_cache(&self) -> bool {
        self.store.is_valid_and_fresh(self.cache_max_age).await
    }

    /// Whether the valid cached document has outlived its refresh interval.
    ///
    /// False when offline, and false when there is no valid cache: that case
    /// calls for an initial fetch, not a re-sync.
    pub async fn is_sync_needed(&self) -> bool {
        if !self.connectivity.is_online().await {
            return false;
        }
        if !self.has_valid_cache().await {
            return false;
        }
        self.schedule()
            .await
            .is_some_and(|schedule| schedule.is_due(self.clock.now()))
    }

    pub async fn sync_status(&self) -> SyncStatus {
        let is_online = self.connectivity.is_online().await;
        let has_valid_cache = self.has_valid_cache().await;
        let schedule = if has_valid_cache {
            self.schedule().await
        } else {
            None
        };
        let is_sync_needed = is_online
            && schedule
                .as_ref()
                .is_some_and(|schedule| schedule.is_due(self.clock.now()));

        SyncStatus {
            is_online,
            has_valid_cache,
            is_sync_needed,
            last_sync_time: schedule.as_ref().map(|s| s.last_sync),
            next_sync_time: schedule.as_ref().and_then(Schedule::next_sync),
        }
    }

    /// Fetch when the cache is missing, invalid, or stale.
    pub async fn sync_if_needed(&self) -> Result<SyncOutcome, AppError> {
        let Some(_guard) = self.try_begin() else {
            tracing::info!("Sync already in progress, skipping");
            return Ok(SyncOutcome::Skipped(SkipReason::InProgress));
        };

        if !self.connectivity.is_online().await {
            tracing::info!("Offline, skipping sync");
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }

        if self.has_valid_cache().await {
            let now = self.clock.now();
            let due = self
                .schedule()
                .await
                .is_some_and(|schedule| schedule.is_due(now));
            if !due {
                tracing::debug!("Config is still fresh, no sync needed");
                return Ok(SyncOutcome::Fresh);
            }
        }

        self.fetch_and_store().await.map(SyncOutcome::Synced)
    }

    /// Fetch unconditionally, ignoring staleness.
    pub async fn force_sync(&self) -> Result<SyncOutcome, AppError> {
        let Some(_guard) = self.try_begin() else {
            tracing::info!("Sync already in progress, skipping forced sync");
            return Ok(SyncOutcome::Skipped(SkipReason::InProgress));
        };

        if !self.connectivity.is_online().await {
            return Err(AppError::Network(
                "No internet connection available for force sync".to_string(),
            ));
        }

        tracing::info!("Force syncing app config");
        self.fetch_and_store().await.map(SyncOutcome::Synced)
    }

    fn try_begin(&self) -> Option<SyncGuard<'_>> {
        self.syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SyncGuard(&self.syncing))
    }

    async fn fetch_and_store(&self) -> Result<Arc<ConfigurationDocument>, AppError> {
        let document = self.fetcher.fetch().await.map_err(|e| {
            tracing::error!("App config sync failed: {}", e);
            e
        })?;

        if let Err(e) = self.store.save(&document).await {
            tracing::warn!("Synced config could not be cached: {}", e);
        }

        tracing::info!("App config sync completed");
        Ok(Arc::new(document))
    }

    async fn schedule(&self) -> Option<Schedule> {
        let entry = match self.store.active_entry().await {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!("Error reading sync state: {}", e);
                return None;
            }
        };
        let interval = entry.parsed_config()?.refresh_interval();
        Some(Schedule {
            last_sync: entry.last_sync?,
            interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::{init_database, SqliteConfigStore};
    use crate::network::ConnectivityFlag;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    const REFRESH_SECS: u64 = 300;

    struct CountingFetcher {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConfigFetcher for CountingFetcher {
        async fn fetch(&self) -> Result<ConfigurationDocument, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(AppError::Network("connection reset".to_string()));
            }
            Ok(document("remote"))
        }
    }

    fn document(hash: &str) -> ConfigurationDocument {
        let mut doc = ConfigurationDocument::fallback();
        doc.about.hash = hash.to_string();
        if let Some(app) = doc.application.as_mut() {
            app.refresh_data_time_interval = REFRESH_SECS;
        }
        doc
    }

    struct Harness {
        sync: SyncService,
        store: Arc<SqliteConfigStore>,
        fetcher: Arc<CountingFetcher>,
        network: Arc<ConnectivityFlag>,
        clock: Arc<ManualClock>,
        _dir: TempDir,
    }

    async fn harness(fetcher: CountingFetcher, online: bool) -> Harness {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        let start = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let store = Arc::new(SqliteConfigStore::with_clock(pool, clock.clone()));
        let fetcher = Arc::new(fetcher);
        let network = Arc::new(ConnectivityFlag::new(online));
        let sync = SyncService::new(
            store.clone(),
            fetcher.clone(),
            network.clone(),
            clock.clone(),
            DEFAULT_CACHE_MAX_AGE,
        );
        Harness {
            sync,
            store,
            fetcher,
            network,
            clock,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_staleness_threshold() {
        let h = harness(CountingFetcher::new(), true).await;
        h.store.save(&document("cached")).await.unwrap();

        h.clock
            .advance(chrono::Duration::seconds(REFRESH_SECS as i64) - chrono::Duration::milliseconds(1));
        assert!(!h.sync.is_sync_needed().await);

        h.clock.advance(chrono::Duration::milliseconds(1));
        assert!(h.sync.is_sync_needed().await);

        h.clock.advance(chrono::Duration::seconds(10));
        assert!(h.sync.is_sync_needed().await);
    }

    #[tokio::test]
    async fn test_not_needed_when_offline_or_uncached() {
        let h = harness(CountingFetcher::new(), true).await;
        assert!(!h.sync.is_sync_needed().await);

        h.store.save(&document("cached")).await.unwrap();
        h.clock.advance(chrono::Duration::hours(1));
        assert!(h.sync.is_sync_needed().await);

        h.network.set_online(false);
        assert!(!h.sync.is_sync_needed().await);
    }

    #[tokio::test]
    async fn test_status_reports_schedule() {
        let h = harness(CountingFetcher::new(), true).await;
        let saved = h.store.save(&document("cached")).await.unwrap();
        let last_sync = saved.last_sync.unwrap();

        h.clock
            .advance(chrono::Duration::seconds(2 * REFRESH_SECS as i64));
        let status = h.sync.sync_status().await;

        assert!(status.is_online);
        assert!(status.has_valid_cache);
        assert!(status.is_sync_needed);
        assert_eq!(status.last_sync_time, Some(last_sync));
        assert_eq!(
            status.next_sync_time,
            Some(last_sync + chrono::Duration::seconds(REFRESH_SECS as i64))
        );
    }

    #[tokio::test]
    async fn test_status_without_cache() {
        let h = harness(CountingFetcher::new(), false).await;
        let status = h.sync.sync_status().await;
        assert_eq!(
            status,
            SyncStatus {
                is_online: false,
                has_valid_cache: false,
                is_sync_needed: false,
                last_sync_time: None,
                next_sync_time: None,
            }
        );
    }

    #[tokio::test]
    async fn test_sync_if_needed_respects_freshness() {
        let h = harness(CountingFetcher::new(), true).await;

        // No cache: initial fetch
        let outcome = h.sync.sync_if_needed().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Synced(Arc::new(document("remote"))));
        assert_eq!(h.fetcher.calls(), 1);

        assert_eq!(h.sync.sync_if_needed().await.unwrap(), SyncOutcome::Fresh);
        assert_eq!(h.fetcher.calls(), 1);

        h.clock
            .advance(chrono::Duration::seconds(REFRESH_SECS as i64));
        assert!(matches!(
            h.sync.sync_if_needed().await.unwrap(),
            SyncOutcome::Synced(_)
        ));
        assert_eq!(h.fetcher.calls(), 2);
        assert_eq!(h.store.entry_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sync_if_needed_offline_is_skipped() {
        let h = harness(CountingFetcher::new(), false).await;
        assert_eq!(
            h.sync.sync_if_needed().await.unwrap(),
            SyncOutcome::Skipped(SkipReason::Offline)
        );
        assert_eq!(h.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_force_sync_offline_is_network_error() {
        let h = harness(CountingFetcher::new(), false).await;
        let err = h.sync.force_sync().await.unwrap_err();
        assert!(err.is_network());
        assert_eq!(h.fetcher.calls(), 0);
        assert!(!h.sync.is_syncing());
    }

    #[tokio::test]
    async fn test_force_sync_ignores_freshness() {
        let h = harness(CountingFetcher::new(), true).await;
        h.store.save(&document("cached")).await.unwrap();

        assert!(matches!(
            h.sync.force_sync().await.unwrap(),
            SyncOutcome::Synced(_)
        ));
        assert_eq!(h.fetcher.calls(), 1);
        assert_eq!(h.store.load().await.unwrap(), Some(document("remote")));
    }

    #[tokio::test]
    async fn test_concurrent_syncs_fetch_once() {
        let mut fetcher = CountingFetcher::new();
        fetcher.delay = Duration::from_millis(100);
        let h = harness(fetcher, true).await;

        let (first, second) = tokio::join!(h.sync.force_sync(), h.sync.force_sync());

        assert!(matches!(first.unwrap(), SyncOutcome::Synced(_)));
        assert_eq!(
            second.unwrap(),
            SyncOutcome::Skipped(SkipReason::InProgress)
        );
        assert_eq!(h.fetcher.calls(), 1);
        assert!(!h.sync.is_syncing());
    }

    #[tokio::test]
    async fn test_failed_sync_releases_guard() {
        let mut fetcher = CountingFetcher::new();
        fetcher.fail = true;
        let h = harness(fetcher, true).await;

        assert!(h.sync.force_sync().await.unwrap_err().is_network());
        assert!(!h.sync.is_syncing());
        assert!(h.sync.sync_if_needed().await.is_err());
        assert_eq!(h.fetcher.calls(), 2);
    }
}
