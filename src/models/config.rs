//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Target site and listing page
    #[serde(default)]
    pub site: SiteConfig,

    /// HTTP behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Poll loop settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Persisted state files
    #[serde(default)]
    pub storage: StorageConfig,

    /// Recipient mode and links
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Notification layout
    #[serde(default)]
    pub message: MessageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply `SAGA_URL`, `CHECK_INTERVAL` and `CHAT_ID` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("SAGA_URL").filter(|v| !v.trim().is_empty()) {
            self.site.listing_url = url.trim().to_string();
        }
        if let Some(interval) = lookup("CHECK_INTERVAL") {
            self.scheduler.interval_secs = interval.trim().parse().map_err(|_| {
                AppError::config(format!("CHECK_INTERVAL is not a number: {interval:?}"))
            })?;
        }
        if let Some(chat_id) = lookup("CHAT_ID").filter(|v| !v.trim().is_empty()) {
            self.telegram.chat_id = Some(chat_id.trim().to_string());
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(AppError::validation("scheduler.interval_secs must be > 0"));
        }
        url::Url::parse(&self.site.listing_url)
            .map_err(|e| AppError::validation(format!("site.listing_url: {e}")))?;
        url::Url::parse(&self.site.base_url)
            .map_err(|e| AppError::validation(format!("site.base_url: {e}")))?;
        if self.storage.cache_ttl_days.checked_mul(86_400).is_none() {
            return Err(AppError::validation("storage.cache_ttl_days is too large"));
        }
        if self.site.detail_path.trim_matches('/').is_empty() {
            return Err(AppError::validation("site.detail_path is empty"));
        }
        if let Some(template) = &self.telegram.action_url_template {
            if !template.contains("{id}") {
                return Err(AppError::validation(
                    "telegram.action_url_template must contain {id}",
                ));
            }
        }
        if self.message.fields.iter().any(|f| f.label.trim().is_empty()) {
            return Err(AppError::validation("message.fields contains an empty label"));
        }
        Ok(())
    }
}

/// Target site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Search result page that lists the current offers
    #[serde(default = "defaults::listing_url")]
    pub listing_url: String,

    /// Origin used to resolve relative detail links
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Substring that identifies detail page links
    #[serde(default = "defaults::detail_path")]
    pub detail_path: String,

    /// Title used when a detail anchor has no visible text
    #[serde(default = "defaults::default_title")]
    pub default_title: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            listing_url: defaults::listing_url(),
            base_url: defaults::base_url(),
            detail_path: defaults::detail_path(),
            default_title: defaults::default_title(),
        }
    }
}

/// HTTP client and fetching behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between detail requests in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Maximum concurrent detail requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: 0,
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay between the end of one cycle and the start of the next
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Remember offers whose detail extraction failed instead of retrying them
    #[serde(default)]
    pub mark_failed_as_seen: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            mark_failed_as_seen: false,
        }
    }
}

/// Persisted state settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "defaults::known_offers_file")]
    pub known_offers_file: String,

    #[serde(default = "defaults::subscribers_file")]
    pub subscribers_file: String,

    /// Age after which the known-offers file is discarded at startup
    #[serde(default = "defaults::cache_ttl_days")]
    pub cache_ttl_days: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            known_offers_file: defaults::known_offers_file(),
            subscribers_file: defaults::subscribers_file(),
            cache_ttl_days: defaults::cache_ttl_days(),
        }
    }
}

/// Telegram recipient settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Fixed recipient; when set, the subscriber set is ignored
    #[serde(default)]
    pub chat_id: Option<String>,

    /// Secondary link, `{id}` is replaced with the offer id
    #[serde(default)]
    pub action_url_template: Option<String>,

    /// Listen for `/start` and `/subscribe` commands
    #[serde(default = "defaults::accept_subscriptions")]
    pub accept_subscriptions: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            chat_id: None,
            action_url_template: None,
            accept_subscriptions: defaults::accept_subscriptions(),
        }
    }
}

/// How an attribute is rendered in the notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Plain,
    Currency,
    Area,
    EnergyClass,
    Description,
}

/// One entry of the ordered field list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldRule {
    pub label: String,
    pub glyph: String,
    #[serde(default = "defaults::field_kind")]
    pub kind: FieldKind,
}

impl FieldRule {
    pub fn new(label: &str, glyph: &str, kind: FieldKind) -> Self {
        Self {
            label: label.to_string(),
            glyph: glyph.to_string(),
            kind,
        }
    }
}

/// Notification layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConfig {
    #[serde(default = "defaults::title_glyph")]
    pub title_glyph: String,

    #[serde(default = "defaults::link_glyph")]
    pub link_glyph: String,

    #[serde(default = "defaults::action_glyph")]
    pub action_glyph: String,

    /// Descriptions longer than this (in graphemes) are cut with an ellipsis
    #[serde(default = "defaults::max_description_chars")]
    pub max_description_chars: usize,

    /// Attributes to show, in display order
    #[serde(default = "defaults::fields")]
    pub fields: Vec<FieldRule>,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            title_glyph: defaults::title_glyph(),
            link_glyph: defaults::link_glyph(),
            action_glyph: defaults::action_glyph(),
            max_description_chars: defaults::max_description_chars(),
            fields: defaults::fields(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{FieldKind, FieldRule};

    // Site defaults
    pub fn listing_url() -> String {
        "https://www.saga.hamburg/immobiliensuche?type=wohnungen".into()
    }
    pub fn base_url() -> String {
        "https://www.saga.hamburg".into()
    }
    pub fn detail_path() -> String {
        "/immobiliensuche/immo-detail/".into()
    }
    pub fn default_title() -> String {
        "Neues Angebot".into()
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn max_concurrent() -> usize {
        1
    }

    // Scheduler defaults
    pub fn interval() -> u64 {
        60
    }

    // Storage defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("data")
    }
    pub fn known_offers_file() -> String {
        "known_offers.txt".into()
    }
    pub fn subscribers_file() -> String {
        "subscribers.txt".into()
    }
    pub fn cache_ttl_days() -> u64 {
        7
    }

    pub fn accept_subscriptions() -> bool {
        true
    }

    // Message defaults
    pub fn title_glyph() -> String {
        "🏠".into()
    }
    pub fn link_glyph() -> String {
        "🔗".into()
    }
    pub fn action_glyph() -> String {
        "✉️".into()
    }
    pub fn max_description_chars() -> usize {
        600
    }
    pub fn field_kind() -> FieldKind {
        FieldKind::Plain
    }
    pub fn fields() -> Vec<FieldRule> {
        vec![
            FieldRule::new("Objektnummer", "🆔", FieldKind::Plain),
            FieldRule::new("Netto-Kaltmiete", "💵", FieldKind::Currency),
            FieldRule::new("Betriebskosten", "💡", FieldKind::Currency),
            FieldRule::new("Heizkosten", "🔥", FieldKind::Currency),
            FieldRule::new("Gesamtmiete", "💰", FieldKind::Currency),
            FieldRule::new("Wohnfläche ca.", "📐", FieldKind::Area),
            FieldRule::new("Zimmer", "🛏️", FieldKind::Plain),
            FieldRule::new("Etage", "🏢", FieldKind::Plain),
            FieldRule::new("Verfügbar ab", "📅", FieldKind::Plain),
            FieldRule::new("Energieeffizienzklasse", "⚡", FieldKind::EnergyClass),
            FieldRule::new("Description", "📝", FieldKind::Description),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [scheduler]
            interval_secs = 300

            [telegram]
            chat_id = "123456"

            [[message.fields]]
            label = "Zimmer"
            glyph = "🛏️"
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.interval_secs, 300);
        assert_eq!(config.telegram.chat_id.as_deref(), Some("123456"));
        assert_eq!(config.crawler.timeout_secs, 10);
        assert_eq!(config.storage.cache_ttl_days, 7);
        assert_eq!(config.message.fields.len(), 1);
        assert_eq!(config.message.fields[0].kind, FieldKind::Plain);
    }

    #[test]
    fn test_field_kind_names() {
        let rule: FieldRule =
            toml::from_str("label = \"Energieeffizienzklasse\"\nglyph = \"⚡\"\nkind = \"energy_class\"")
                .unwrap();
        assert_eq!(rule.kind, FieldKind::EnergyClass);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("SAGA_URL", "https://www.saga.hamburg/immobiliensuche?type=gewerbe"),
            ("CHECK_INTERVAL", "120"),
            ("CHAT_ID", " -100200300 "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(
            config.site.listing_url,
            "https://www.saga.hamburg/immobiliensuche?type=gewerbe"
        );
        assert_eq!(config.scheduler.interval_secs, 120);
        assert_eq!(config.telegram.chat_id.as_deref(), Some("-100200300"));
    }

    #[test]
    fn test_bad_interval_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| (key == "CHECK_INTERVAL").then(|| "soon".to_string()));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.scheduler.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.telegram.action_url_template = Some("https://example.com/contact".into());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.site.listing_url = "not a url".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.cache_ttl_days = u64::MAX;
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }
}
