//! Articles kept for offline reading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Page size used when callers do not ask for one.
pub const DEFAULT_ARTICLE_PAGE_SIZE: i64 = 50;

/// A cached article row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    /// Identifier assigned by the news API; unique in the cache
    pub external_id: String,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub featured_image: Option<String>,
    pub is_published: bool,
    pub is_favorite: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`crate::db::SqliteArticleStore::save_article`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArticle {
    pub external_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// `None` keeps the tags of an existing row
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub featured_image: Option<String>,
    /// Defaults to published
    #[serde(default)]
    pub is_published: Option<bool>,
}

impl NewArticle {
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }
}
