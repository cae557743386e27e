//! Persisted configuration snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ConfigurationDocument;

/// One row of the local configuration table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedConfigEntry {
    pub id: i64,
    /// Serialized [`ConfigurationDocument`]
    pub config_data: String,
    pub version: String,
    pub is_active: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CachedConfigEntry {
    /// Parse the stored payload. A malformed payload yields `None`.
    pub fn parsed_config(&self) -> Option<ConfigurationDocument> {
        match serde_json::from_str(&self.config_data) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Cached config {} is not parseable: {}", self.id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(config_data: &str) -> CachedConfigEntry {
        let now = Utc::now();
        CachedConfigEntry {
            id: 1,
            config_data: config_data.to_string(),
            version: "v".to_string(),
            is_active: true,
            last_sync: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_parsed_config_round_trips() {
        let doc = ConfigurationDocument::fallback();
        let entry = entry(&serde_json::to_string(&doc).unwrap());
        assert_eq!(entry.parsed_config(), Some(doc));
    }

    #[test]
    fn test_malformed_payload_is_none() {
        assert_eq!(entry("{\"Tabs\": 12").parsed_config(), None);
    }
}
