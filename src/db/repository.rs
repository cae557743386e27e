//! Local configuration store and offline article cache.
//!
//! Every successful fetch appends a config row; the previous rows are
//! deactivated in the same transaction so exactly one row is active once a
//! save commits. Articles are upserted by their API identifier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::clock::{Clock, SystemClock};
use crate::errors::AppError;
use crate::models::{Article, CachedConfigEntry, ConfigurationDocument, NewArticle};

/// Persistence seam for configuration snapshots.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Persist `document` as the single active snapshot.
    async fn save(&self, document: &ConfigurationDocument) -> Result<CachedConfigEntry, AppError>;

    /// The active snapshot's document. A malformed payload reads as no cache.
    async fn load(&self) -> Result<Option<ConfigurationDocument>, AppError>;

    async fn active_entry(&self) -> Result<Option<CachedConfigEntry>, AppError>;

    /// True iff an active snapshot parses, has its required sections, and was
    /// synced less than `max_age` ago.
    async fn is_valid_and_fresh(&self, max_age: Duration) -> bool;
}

/// SQLite-backed [`ConfigStore`].
#[derive(Clone)]
pub struct SqliteConfigStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Number of snapshots ever written.
    pub async fn entry_count(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM app_configs")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    /// Number of snapshots currently flagged active.
    pub async fn active_count(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM app_configs WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn save(&self, document: &ConfigurationDocument) -> Result<CachedConfigEntry, AppError> {
        let config_data = serde_json::to_string(document)?;
        let version = document.version_tag().to_string();
        let now = truncate_to_millis(self.clock.now());

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE app_configs SET is_active = 0, updated_at = ? WHERE is_active = 1")
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "INSERT INTO app_configs (config_data, version, is_active, last_sync, created_at, updated_at) VALUES (?, ?, 1, ?, ?, ?)"
        )
        .bind(&config_data)
        .bind(&version)
        .bind(now.timestamp_millis())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("App config {} saved to local database", version);

        Ok(CachedConfigEntry {
            id: result.last_insert_rowid(),
            config_data,
            version,
            is_active: true,
            last_sync: Some(now),
            created_at: now,
            updated_at: now,
        })
    }

    async fn load(&self) -> Result<Option<ConfigurationDocument>, AppError> {
        let Some(entry) = self.active_entry().await? else {
            tracing::debug!("No app config found in local database");
            return Ok(None);
        };
        Ok(entry.parsed_config())
    }

    async fn active_entry(&self) -> Result<Option<CachedConfigEntry>, AppError> {
        let row = sqlx::query(
            "SELECT id, config_data, version, is_active, last_sync, created_at, updated_at FROM app_configs WHERE is_active = 1 ORDER BY id DESC LIMIT 1"
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn is_valid_and_fresh(&self, max_age: Duration) -> bool {
        let entry = match self.active_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!("Error checking cached config: {}", e);
                return false;
            }
        };

        let Some(last_sync) = entry.last_sync else {
            return false;
        };
        let is_valid = entry
            .parsed_config()
            .is_some_and(|config| config.validate().is_ok());

        is_valid && is_younger_than(self.clock.now(), last_sync, max_age)
    }
}

/// SQLite-backed offline article cache.
#[derive(Clone)]
pub struct SqliteArticleStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteArticleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Insert the article, or update the row with the same `external_id`.
    /// Stamps `last_sync`; `created_at` and `is_favorite` survive updates.
    pub async fn save_article(&self, article: &NewArticle) -> Result<Article, AppError> {
        let now = truncate_to_millis(self.clock.now());
        let tags = article
            .tags
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO articles (external_id, title, content, excerpt, author, category, tags, featured_image, is_published, is_favorite, last_sync, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
            ON CONFLICT(external_id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                excerpt = excluded.excerpt,
                author = excluded.author,
                category = excluded.category,
                tags = COALESCE(excluded.tags, articles.tags),
                featured_image = excluded.featured_image,
                is_published = excluded.is_published,
                last_sync = excluded.last_sync,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&article.external_id)
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.excerpt)
        .bind(&article.author)
        .bind(&article.category)
        .bind(&tags)
        .bind(&article.featured_image)
        .bind(article.is_published.unwrap_or(true) as i32)
        .bind(now.timestamp_millis())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!("Article {} saved to local database", article.external_id);

        self.article(&article.external_id).await?.ok_or_else(|| {
            AppError::Persistence(format!(
                "Article {} missing after save",
                article.external_id
            ))
        })
    }

    pub async fn article(&self, external_id: &str) -> Result<Option<Article>, AppError> {
        let row = sqlx::query(
            "SELECT id, external_id, title, content, excerpt, author, category, tags, featured_image, is_published, is_favorite, last_sync, created_at, updated_at FROM articles WHERE external_id = ?"
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(article_from_row).transpose()
    }

    /// One page of cached articles, most recently synced first.
    pub async fn articles(&self, limit: i64, offset: i64) -> Result<Vec<Article>, AppError> {
        let rows = sqlx::query(
            "SELECT id, external_id, title, content, excerpt, author, category, tags, featured_image, is_published, is_favorite, last_sync, created_at, updated_at FROM articles ORDER BY last_sync DESC, id DESC LIMIT ? OFFSET ?"
        )
        .bind(limit.max(0))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;

        let articles = rows
            .iter()
            .map(article_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!("Retrieved {} articles from local database", articles.len());
        Ok(articles)
    }

    pub async fn article_count(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

fn is_younger_than(now: DateTime<Utc>, then: DateTime<Utc>, max_age: Duration) -> bool {
    let age = now.signed_duration_since(then);
    chrono::Duration::from_std(max_age).map_or(true, |max| age < max)
}

/// `last_sync` is stored as epoch millis; keep returned entries at the same
/// precision so they compare equal to what is read back.
fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}

// Helper functions for row conversion

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<CachedConfigEntry, AppError> {
    let is_active: i32 = row.try_get("is_active")?;
    let last_sync: Option<i64> = row.try_get("last_sync")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(CachedConfigEntry {
        id: row.try_get("id")?,
        config_data: row.try_get("config_data")?,
        version: row.try_get("version")?,
        is_active: is_active != 0,
        last_sync: last_sync.and_then(DateTime::from_timestamp_millis),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn article_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Article, AppError> {
    let external_id: String = row.try_get("external_id")?;
    let tags: Option<String> = row.try_get("tags")?;
    let is_published: i32 = row.try_get("is_published")?;
    let is_favorite: i32 = row.try_get("is_favorite")?;
    let last_sync: Option<i64> = row.try_get("last_sync")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let tags = match tags.as_deref() {
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed tags on article {}: {}", external_id, e);
            Vec::new()
        }),
        None => Vec::new(),
    };

    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        excerpt: row.try_get("excerpt")?,
        author: row.try_get("author")?,
        category: row.try_get("category")?,
        tags,
        featured_image: row.try_get("featured_image")?,
        is_published: is_published != 0,
        is_favorite: is_favorite != 0,
        last_sync: last_sync.and_then(DateTime::from_timestamp_millis),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        external_id,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Persistence(format!("Invalid timestamp {:?}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn store() -> (SqliteConfigStore, Arc<ManualClock>, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        // Millisecond precision, matching how last_sync is stored
        let start = DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        (
            SqliteConfigStore::with_clock(pool, clock.clone()),
            clock,
            temp_dir,
        )
    }

    async fn article_store() -> (SqliteArticleStore, Arc<ManualClock>, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        let start = DateTime::from_timestamp_millis(1_717_228_800_000).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        (
            SqliteArticleStore::with_clock(pool, clock.clone()),
            clock,
            temp_dir,
        )
    }

    fn document(hash: &str) -> ConfigurationDocument {
        let mut doc = ConfigurationDocument::fallback();
        doc.about.hash = hash.to_string();
        doc
    }

    #[tokio::test]
    async fn test_empty_store_loads_none() {
        let (store, _clock, _dir) = store().await;
        assert_eq!(store.load().await.unwrap(), None);
        assert!(!store.is_valid_and_fresh(Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (store, clock, _dir) = store().await;
        let doc = document("hash-1");

        let entry = store.save(&doc).await.unwrap();
        assert_eq!(entry.version, "hash-1");
        assert!(entry.is_active);
        assert_eq!(entry.last_sync, Some(clock.now()));

        assert_eq!(store.load().await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn test_missing_hash_is_stored_as_unknown() {
        let (store, _clock, _dir) = store().await;
        let entry = store.save(&document("")).await.unwrap();
        assert_eq!(entry.version, "unknown");
    }

    #[tokio::test]
    async fn test_single_active_entry_after_many_saves() {
        let (store, clock, _dir) = store().await;

        for i in 0..5 {
            clock.advance(chrono::Duration::seconds(1));
            store.save(&document(&format!("hash-{}", i))).await.unwrap();
        }

        assert_eq!(store.entry_count().await.unwrap(), 5);
        assert_eq!(store.active_count().await.unwrap(), 1);
        assert_eq!(store.load().await.unwrap(), Some(document("hash-4")));
        let active = store.active_entry().await.unwrap().unwrap();
        assert_eq!(active.version, "hash-4");
        assert_eq!(active.last_sync, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_malformed_payload_reads_as_no_cache() {
        let (store, _clock, _dir) = store().await;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO app_configs (config_data, version, is_active, last_sync, created_at, updated_at) VALUES ('{broken', 'x', 1, 0, ?, ?)"
        )
        .bind(&now)
        .bind(&now)
        .execute(&store.pool)
        .await
        .unwrap();

        assert_eq!(store.load().await.unwrap(), None);
        assert!(!store.is_valid_and_fresh(Duration::from_secs(3600)).await);
    }

    #[tokio::test]
    async fn test_freshness_window() {
        let (store, clock, _dir) = store().await;
        store.save(&document("hash-1")).await.unwrap();

        let max_age = Duration::from_secs(24 * 60 * 60);
        assert!(store.is_valid_and_fresh(max_age).await);

        clock.advance(chrono::Duration::hours(24) - chrono::Duration::milliseconds(1));
        assert!(store.is_valid_and_fresh(max_age).await);

        clock.advance(chrono::Duration::milliseconds(1));
        assert!(!store.is_valid_and_fresh(max_age).await);
    }

    #[tokio::test]
    async fn test_invalid_document_is_not_fresh() {
        let (store, _clock, _dir) = store().await;
        let mut doc = document("hash-1");
        doc.tabs = None;
        store.save(&doc).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(doc));
        assert!(!store.is_valid_and_fresh(Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_saved_entry_matches_stored_row_with_system_clock() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        let store = SqliteConfigStore::new(pool);

        let saved = store.save(&document("hash-1")).await.unwrap();
        let stored = store.active_entry().await.unwrap().unwrap();

        assert_eq!(saved, stored);
        assert_eq!(saved.last_sync.unwrap().timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[tokio::test]
    async fn test_save_article_inserts_with_defaults() {
        let (store, clock, _dir) = article_store().await;
        let mut input = NewArticle::new("ext-1", "Pole position", "Full race report");
        input.author = Some("Paddock desk".to_string());
        input.tags = Some(vec!["f1".to_string(), "qualifying".to_string()]);

        let article = store.save_article(&input).await.unwrap();

        assert_eq!(article.external_id, "ext-1");
        assert_eq!(article.title, "Pole position");
        assert_eq!(article.author.as_deref(), Some("Paddock desk"));
        assert_eq!(article.excerpt, None);
        assert_eq!(article.tags, vec!["f1", "qualifying"]);
        assert!(article.is_published);
        assert!(!article.is_favorite);
        assert_eq!(article.last_sync, Some(clock.now()));
        assert_eq!(store.article("ext-1").await.unwrap(), Some(article));
    }

    #[tokio::test]
    async fn test_save_article_upserts_by_external_id() {
        let (store, clock, _dir) = article_store().await;
        let mut input = NewArticle::new("ext-1", "Draft title", "Draft body");
        input.tags = Some(vec!["f1".to_string()]);
        let first = store.save_article(&input).await.unwrap();

        clock.advance(chrono::Duration::minutes(5));
        let mut update = NewArticle::new("ext-1", "Final title", "Final body");
        update.is_published = Some(false);
        let second = store.save_article(&update).await.unwrap();

        assert_eq!(store.article_count().await.unwrap(), 1);
        assert_eq!(second.id, first.id);
        assert_eq!(second.title, "Final title");
        assert_eq!(second.content, "Final body");
        assert!(!second.is_published);
        // Tags omitted on update are kept
        assert_eq!(second.tags, vec!["f1"]);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.last_sync, Some(clock.now()));
        assert!(second.updated_at > first.updated_at);
    }

    #[tokio::test]
    async fn test_articles_paginate_latest_first() {
        let (store, clock, _dir) = article_store().await;
        for i in 0..5 {
            clock.advance(chrono::Duration::seconds(1));
            store
                .save_article(&NewArticle::new(format!("ext-{}", i), format!("Article {}", i), "body"))
                .await
                .unwrap();
        }

        let ids = |page: Vec<Article>| page.into_iter().map(|a| a.external_id).collect::<Vec<_>>();

        assert_eq!(ids(store.articles(2, 0).await.unwrap()), vec!["ext-4", "ext-3"]);
        assert_eq!(ids(store.articles(2, 2).await.unwrap()), vec!["ext-2", "ext-1"]);
        assert_eq!(ids(store.articles(2, 4).await.unwrap()), vec!["ext-0"]);
        assert!(store.articles(10, 10).await.unwrap().is_empty());
        assert_eq!(
            store
                .articles(crate::models::DEFAULT_ARTICLE_PAGE_SIZE, 0)
                .await
                .unwrap()
                .len(),
            5
        );
    }
}
