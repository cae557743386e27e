//! Language selection for the UI.
//!
//! An explicit instance constructed at startup; the default language is taken
//! from the published configuration once it exists.

use std::sync::RwLock;
use std::time::Duration;

use reqwest::Client;

use crate::models::{ConfigurationDocument, Language};

/// Language used before any configuration is applied.
pub const FALLBACK_LANGUAGE: &str = "en";

/// Upper bound for a single translation download.
pub const DEFAULT_TRANSLATION_TIMEOUT: Duration = Duration::from_secs(10);

pub struct LocalizationService {
    client: Client,
    timeout: Duration,
    current_language: RwLock<String>,
}

impl Default for LocalizationService {
    fn default() -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TRANSLATION_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to a default HTTP client: {}", e);
                Client::new()
            });
        Self::new(client)
    }
}

impl LocalizationService {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TRANSLATION_TIMEOUT,
            current_language: RwLock::new(FALLBACK_LANGUAGE.to_string()),
        }
    }

    /// Bound each translation request by `timeout`, whatever the client's own
    /// settings are.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn current_language(&self) -> String {
        self.current_language
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_current_language(&self, code: &str) {
        *self
            .current_language
            .write()
            .unwrap_or_else(|e| e.into_inner()) = code.to_string();
    }

    /// Switch to the configuration's default language, if it declares any.
    pub fn apply_config(&self, config: &ConfigurationDocument) -> Option<Language> {
        let language = config.default_language()?.clone();
        tracing::info!("Default language set to {}", language.code);
        self.set_current_language(&language.code);
        Some(language)
    }

    /// Fetch a translation resource. Any failure yields `None`.
    pub async fn load_remote(&self, translation_url: &str) -> Option<serde_json::Value> {
        let request = self.client.get(translation_url).timeout(self.timeout);
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Failed to load remote translations: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::error!(
                "Failed to load remote translations: HTTP {}",
                response.status()
            );
            return None;
        }

        match response.json().await {
            Ok(translations) => Some(translations),
            Err(e) => {
                tracing::error!("Translations at {} are not valid JSON: {}", translation_url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_fallback_language() {
        let service = LocalizationService::default();
        assert_eq!(service.current_language(), FALLBACK_LANGUAGE);
    }

    #[test]
    fn test_apply_config_selects_default_language() {
        let service = LocalizationService::default();
        let mut config = ConfigurationDocument::fallback();
        config.languages.insert(
            0,
            Language {
                code: "fr".to_string(),
                translation_file: "fr.json".to_string(),
                name: "Français".to_string(),
                is_default: false,
                icon_url: String::new(),
            },
        );
        config.languages[1].is_default = false;
        config.languages[0].is_default = true;

        let selected = service.apply_config(&config).unwrap();
        assert_eq!(selected.code, "fr");
        assert_eq!(service.current_language(), "fr");
    }

    #[test]
    fn test_apply_config_without_languages_keeps_current() {
        let service = LocalizationService::default();
        service.set_current_language("de");
        let mut config = ConfigurationDocument::fallback();
        config.languages.clear();

        assert!(service.apply_config(&config).is_none());
        assert_eq!(service.current_language(), "de");
    }
}
