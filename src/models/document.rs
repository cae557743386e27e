//! Configuration document model matching the remote configuration API.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Version tag of the hardcoded fallback document.
pub const DEFAULT_VERSION_TAG: &str = "default";

/// Version tag recorded when a document carries no hash.
pub const UNKNOWN_VERSION_TAG: &str = "unknown";

/// The root configuration document served by the remote API.
///
/// Treated as an immutable value: a new fetch produces a new document, never a
/// patch of an existing one. `application` and `Tabs` are the two sections the
/// client cannot run without; they are optional here so that their absence is
/// reported by [`ConfigurationDocument::validate`] instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationDocument {
    #[serde(rename = "apiDebug", default)]
    pub api_debug: serde_json::Value,
    #[serde(default)]
    pub about: About,
    #[serde(default)]
    pub application: Option<ApplicationSettings>,
    #[serde(default)]
    pub subscription: Subscription,
    #[serde(rename = "Ads", default)]
    pub ads: Ads,
    #[serde(rename = "Tabs", default)]
    pub tabs: Option<Vec<Tab>>,
    #[serde(default)]
    pub templates: Templates,
    #[serde(rename = "Languages", default)]
    pub languages: Vec<Language>,
}

/// Metadata block: content hash and last server-side update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct About {
    #[serde(default)]
    pub hash: String,
    #[serde(rename = "LastUpdate", default)]
    pub last_update: String,
}

/// Application URLs, intervals and version requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationSettings {
    pub base_url: String,
    /// Seconds between configuration refreshes, declared by the server
    pub refresh_data_time_interval: u64,
    pub reboot_time_interval: u64,
    pub back_ground_fetch_time_interval: u64,
    #[serde(rename = "UrlPrefetch")]
    pub url_prefetch: String,
    #[serde(rename = "UrlTemplateElement")]
    pub url_template_element: String,
    #[serde(rename = "UrlTemplateRubric")]
    pub url_template_rubric: String,
    #[serde(rename = "UrlTemplateSearch")]
    pub url_template_search: String,
    #[serde(rename = "UrlEmailVerif")]
    pub url_email_verif: String,
    #[serde(rename = "UrlUpdateDevice")]
    pub url_update_device: String,
    #[serde(rename = "UrlSendMAgicLink")]
    pub url_send_magic_link: String,
    #[serde(rename = "UrlAuthByMagicLink")]
    pub url_auth_by_magic_link: String,
    #[serde(rename = "UrlLogOut")]
    pub url_log_out: String,
    #[serde(rename = "UrlDeleteAccount")]
    pub url_delete_account: String,
    #[serde(rename = "UrlLostPassword")]
    pub url_lost_password: String,
    #[serde(rename = "UrlGetProfile")]
    pub url_get_profile: String,
    #[serde(rename = "UrlUpdateProfile")]
    pub url_update_profile: String,
    #[serde(rename = "UrlRegisterStep1")]
    pub url_register_step1: String,
    #[serde(rename = "UrlRegisterStep2")]
    pub url_register_step2: String,
    #[serde(rename = "UrlGetEmissions")]
    pub url_get_emissions: String,
    #[serde(rename = "UrlGetMedias")]
    pub url_get_medias: String,
    #[serde(rename = "UrlGetMediasCategory")]
    pub url_get_medias_category: String,
    #[serde(rename = "UrlGetMediasVideo")]
    pub url_get_medias_video: String,
    #[serde(rename = "UrlAddArticleAsFavorite")]
    pub url_add_article_as_favorite: String,
    #[serde(rename = "UrlRemoveArticleAsFavorite")]
    pub url_remove_article_as_favorite: String,
    #[serde(rename = "UrlSubscribe")]
    pub url_subscribe: String,
    #[serde(rename = "UrlSubscriptionRestore")]
    pub url_subscription_restore: String,
    #[serde(rename = "TargetVersion")]
    pub target_version: String,
    #[serde(rename = "MinumumVersion")]
    pub minimum_version: String,
    #[serde(rename = "MainTopLogo")]
    pub main_top_logo: String,
    #[serde(rename = "CacheDate")]
    pub cache_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subscription {
    pub is_subscription_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ads {
    #[serde(rename = "isSplashEnabled")]
    pub is_splash_enabled: bool,
    #[serde(rename = "SplashId")]
    pub splash_id: i64,
    #[serde(rename = "SplashTimer")]
    pub splash_timer: i64,
    #[serde(rename = "ReviveId")]
    pub revive_id: String,
}

/// How a tab renders its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabKind {
    Pager,
    Rubric,
    VideoSection,
    #[serde(other)]
    Unknown,
}

/// A bottom-navigation tab definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: String,
    #[serde(rename = "tabTitle")]
    pub tab_title: String,
    #[serde(default)]
    pub icon: String,
    #[serde(rename = "type")]
    pub kind: TabKind,
    #[serde(default)]
    pub rubric_id: Option<String>,
    #[serde(default)]
    pub pages: Option<Vec<TabPage>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageKind {
    Rubric,
    RubricWeb,
    #[serde(other)]
    Unknown,
}

/// A page inside a pager tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabPage {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: PageKind,
    #[serde(default)]
    pub rubric_id: Option<String>,
    #[serde(default)]
    pub customizable: bool,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Templates {
    pub article_v2: String,
    pub news_v2: String,
    pub gdpr: String,
}

/// A supported UI language and where its translations live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    #[serde(rename = "LangCode")]
    pub code: String,
    #[serde(rename = "TranslationFile", default)]
    pub translation_file: String,
    #[serde(rename = "LangName", default)]
    pub name: String,
    #[serde(rename = "LangDefault", default)]
    pub is_default: bool,
    #[serde(rename = "IconUrl", default)]
    pub icon_url: String,
}

/// Target and minimum client versions declared by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub target_version: String,
    pub minimum_version: String,
}

impl ConfigurationDocument {
    /// Check that both required sections are present.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.application.is_none() {
            return Err(AppError::Validation(
                "Configuration is missing the application section".to_string(),
            ));
        }
        if self.tabs.is_none() {
            return Err(AppError::Validation(
                "Configuration is missing the Tabs section".to_string(),
            ));
        }
        Ok(())
    }

    /// Version tag derived from the content hash.
    pub fn version_tag(&self) -> &str {
        if self.about.hash.is_empty() {
            UNKNOWN_VERSION_TAG
        } else {
            &self.about.hash
        }
    }

    /// Whether this is the hardcoded fallback rather than a served document.
    pub fn is_default(&self) -> bool {
        self.about.hash == DEFAULT_VERSION_TAG
    }

    /// Server-declared refresh interval; `None` when absent or zero.
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.application
            .as_ref()
            .map(|app| app.refresh_data_time_interval)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn application(&self) -> Option<&ApplicationSettings> {
        self.application.as_ref()
    }

    pub fn tabs(&self) -> &[Tab] {
        self.tabs.as_deref().unwrap_or_default()
    }

    pub fn available_languages(&self) -> &[Language] {
        &self.languages
    }

    /// The language flagged as default, else the first one listed.
    pub fn default_language(&self) -> Option<&Language> {
        self.languages
            .iter()
            .find(|lang| lang.is_default)
            .or_else(|| self.languages.first())
    }

    pub fn is_subscription_enabled(&self) -> bool {
        self.subscription.is_subscription_enabled
    }

    pub fn are_ads_enabled(&self) -> bool {
        self.ads.is_splash_enabled
    }

    pub fn version_info(&self) -> Option<VersionInfo> {
        self.application.as_ref().map(|app| VersionInfo {
            target_version: app.target_version.clone(),
            minimum_version: app.minimum_version.clone(),
        })
    }

    /// Look up a value by dotted path over the wire representation,
    /// e.g. `application.baseUrl` or `Tabs.0.id`.
    pub fn value_at(&self, path: &str) -> Option<serde_json::Value> {
        let root = serde_json::to_value(self).ok()?;
        let mut current = &root;
        for key in path.split('.') {
            current = match current {
                serde_json::Value::Object(map) => map.get(key)?,
                serde_json::Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        if current.is_null() {
            None
        } else {
            Some(current.clone())
        }
    }

    /// Hardcoded configuration used when neither the remote API nor the local
    /// cache can supply one. Deterministic: every call returns an equal value.
    pub fn fallback() -> Self {
        const EPOCH: &str = "1970-01-01T00:00:00.000Z";

        let rubric_page = |id: &str, title: &str, rubric: &str| TabPage {
            id: id.to_string(),
            title: title.to_string(),
            kind: PageKind::Rubric,
            rubric_id: Some(rubric.to_string()),
            customizable: false,
            selected: true,
            url: None,
        };

        Self {
            api_debug: serde_json::Value::Null,
            about: About {
                hash: DEFAULT_VERSION_TAG.to_string(),
                last_update: EPOCH.to_string(),
            },
            application: Some(ApplicationSettings {
                base_url: "https://api.example.com".to_string(),
                refresh_data_time_interval: 300,
                reboot_time_interval: 3600,
                back_ground_fetch_time_interval: 1800,
                target_version: "1.0.0".to_string(),
                minimum_version: "1.0.0".to_string(),
                cache_date: EPOCH.to_string(),
                ..Default::default()
            }),
            subscription: Subscription::default(),
            ads: Ads::default(),
            tabs: Some(vec![
                Tab {
                    id: "tab_home".to_string(),
                    tab_title: "À la Une".to_string(),
                    icon: "icon_home_tab".to_string(),
                    kind: TabKind::Pager,
                    rubric_id: None,
                    pages: Some(vec![
                        rubric_page("rubric-home", "À LA UNE", "home"),
                        rubric_page("rubric-latest-news", "EN CONTINU", "latest-news"),
                    ]),
                },
                Tab {
                    id: "tab_favorite".to_string(),
                    tab_title: "Vos selections".to_string(),
                    icon: "icon_favorites_tab".to_string(),
                    kind: TabKind::Rubric,
                    rubric_id: Some("rubric-favorites".to_string()),
                    pages: None,
                },
                Tab {
                    id: "tab_videos".to_string(),
                    tab_title: "Videos".to_string(),
                    icon: "icon_videos_tab".to_string(),
                    kind: TabKind::VideoSection,
                    rubric_id: None,
                    pages: None,
                },
            ]),
            templates: Templates::default(),
            languages: vec![Language {
                code: "en".to_string(),
                translation_file: "en.json".to_string(),
                name: "English".to_string(),
                is_default: true,
                icon_url: String::new(),
            }],
        }
    }
}
