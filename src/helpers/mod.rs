//! URL templates and version checks over the configuration document.

use std::cmp::Ordering;
use std::fmt::Display;

use crate::models::{ApplicationSettings, ConfigurationDocument};

/// Replace every `{key}` placeholder in `template` with its value.
pub fn resolve_url_template<V: Display>(template: &str, params: &[(&str, V)]) -> String {
    params
        .iter()
        .fold(template.to_string(), |url, (key, value)| {
            url.replace(&format!("{{{}}}", key), &value.to_string())
        })
}

/// URL templates carried in the application section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationUrl {
    Prefetch,
    TemplateElement,
    TemplateRubric,
    TemplateSearch,
    EmailVerif,
    UpdateDevice,
    SendMagicLink,
    AuthByMagicLink,
    LogOut,
    DeleteAccount,
    LostPassword,
    GetProfile,
    UpdateProfile,
    RegisterStep1,
    RegisterStep2,
    GetEmissions,
    GetMedias,
    GetMediasCategory,
    GetMediasVideo,
    AddArticleAsFavorite,
    RemoveArticleAsFavorite,
    Subscribe,
    SubscriptionRestore,
}

impl ApplicationUrl {
    fn template(self, app: &ApplicationSettings) -> &str {
        match self {
            ApplicationUrl::Prefetch => &app.url_prefetch,
            ApplicationUrl::TemplateElement => &app.url_template_element,
            ApplicationUrl::TemplateRubric => &app.url_template_rubric,
            ApplicationUrl::TemplateSearch => &app.url_template_search,
            ApplicationUrl::EmailVerif => &app.url_email_verif,
            ApplicationUrl::UpdateDevice => &app.url_update_device,
            ApplicationUrl::SendMagicLink => &app.url_send_magic_link,
            ApplicationUrl::AuthByMagicLink => &app.url_auth_by_magic_link,
            ApplicationUrl::LogOut => &app.url_log_out,
            ApplicationUrl::DeleteAccount => &app.url_delete_account,
            ApplicationUrl::LostPassword => &app.url_lost_password,
            ApplicationUrl::GetProfile => &app.url_get_profile,
            ApplicationUrl::UpdateProfile => &app.url_update_profile,
            ApplicationUrl::RegisterStep1 => &app.url_register_step1,
            ApplicationUrl::RegisterStep2 => &app.url_register_step2,
            ApplicationUrl::GetEmissions => &app.url_get_emissions,
            ApplicationUrl::GetMedias => &app.url_get_medias,
            ApplicationUrl::GetMediasCategory => &app.url_get_medias_category,
            ApplicationUrl::GetMediasVideo => &app.url_get_medias_video,
            ApplicationUrl::AddArticleAsFavorite => &app.url_add_article_as_favorite,
            ApplicationUrl::RemoveArticleAsFavorite => &app.url_remove_article_as_favorite,
            ApplicationUrl::Subscribe => &app.url_subscribe,
            ApplicationUrl::SubscriptionRestore => &app.url_subscription_restore,
        }
    }
}

/// Resolve one of the application URL templates. `None` when the config, its
/// application section, or the template itself is missing.
pub fn application_url(
    config: Option<&ConfigurationDocument>,
    key: ApplicationUrl,
    params: &[(&str, String)],
) -> Option<String> {
    let template = key.template(config?.application()?);
    if template.is_empty() {
        return None;
    }
    Some(resolve_url_template(template, params))
}

pub fn article_url(config: Option<&ConfigurationDocument>, article_id: &str) -> Option<String> {
    application_url(
        config,
        ApplicationUrl::TemplateElement,
        &[("id", article_id.to_string())],
    )
}

pub fn rubric_url(config: Option<&ConfigurationDocument>, tag: &str) -> Option<String> {
    application_url(
        config,
        ApplicationUrl::TemplateRubric,
        &[("tag", tag.to_string())],
    )
}

pub fn search_url(config: Option<&ConfigurationDocument>, keywords: &str) -> Option<String> {
    application_url(
        config,
        ApplicationUrl::TemplateSearch,
        &[("keywords", keywords.to_string())],
    )
}

pub fn media_url(config: Option<&ConfigurationDocument>, video_id: &str) -> Option<String> {
    application_url(
        config,
        ApplicationUrl::GetMediasVideo,
        &[("VideoId", video_id.to_string())],
    )
}

pub fn emissions_url(config: Option<&ConfigurationDocument>, count: u32, skip: u32) -> Option<String> {
    application_url(
        config,
        ApplicationUrl::GetEmissions,
        &[("count", count.to_string()), ("skip", skip.to_string())],
    )
}

pub fn medias_url(config: Option<&ConfigurationDocument>, count: u32, skip: u32) -> Option<String> {
    application_url(
        config,
        ApplicationUrl::GetMedias,
        &[("count", count.to_string()), ("skip", skip.to_string())],
    )
}

pub fn medias_by_category_url(
    config: Option<&ConfigurationDocument>,
    category_id: &str,
    count: u32,
    skip: u32,
) -> Option<String> {
    application_url(
        config,
        ApplicationUrl::GetMediasCategory,
        &[
            ("categoryid", category_id.to_string()),
            ("count", count.to_string()),
            ("skip", skip.to_string()),
        ],
    )
}

pub fn magic_link_url(
    config: Option<&ConfigurationDocument>,
    email: &str,
    device_type: &str,
) -> Option<String> {
    application_url(
        config,
        ApplicationUrl::SendMagicLink,
        &[
            ("email", email.to_string()),
            ("DeviceType", device_type.to_string()),
        ],
    )
}

pub fn auth_by_magic_link_url(
    config: Option<&ConfigurationDocument>,
    token: &str,
    device_type: &str,
    device_id: &str,
) -> Option<String> {
    application_url(
        config,
        ApplicationUrl::AuthByMagicLink,
        &[
            ("token", token.to_string()),
            ("DeviceType", device_type.to_string()),
            ("DeviceId", device_id.to_string()),
        ],
    )
}

pub fn profile_url(config: Option<&ConfigurationDocument>, token: &str) -> Option<String> {
    application_url(
        config,
        ApplicationUrl::GetProfile,
        &[("token", token.to_string())],
    )
}

/// Result of comparing the running client against the declared versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCompatibility {
    /// At or above the minimum version
    pub is_compatible: bool,
    /// Below the target version
    pub needs_update: bool,
    pub target_version: String,
    pub minimum_version: String,
}

pub fn check_version_compatibility(
    config: Option<&ConfigurationDocument>,
    current_version: &str,
) -> VersionCompatibility {
    let Some(app) = config.and_then(ConfigurationDocument::application) else {
        return VersionCompatibility {
            is_compatible: false,
            needs_update: false,
            target_version: String::new(),
            minimum_version: String::new(),
        };
    };

    VersionCompatibility {
        is_compatible: compare_versions(current_version, &app.minimum_version) != Ordering::Less,
        needs_update: compare_versions(current_version, &app.target_version) == Ordering::Less,
        target_version: app.target_version.clone(),
        minimum_version: app.minimum_version.clone(),
    }
}

/// Compare dotted numeric versions; missing or non-numeric parts count as 0.
fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| part.trim().parse().unwrap_or(0))
            .collect()
    };
    let (a, b) = (parse(a), parse(b));

    (0..a.len().max(b.len()))
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
