// src/services/message.rs

//! Notification rendering.
//!
//! Pure: an offer and its attribute bag go in, Telegram HTML comes out.

use std::sync::LazyLock;

use regex::Regex;
use teloxide::utils::html;

use crate::models::{Config, FieldKind, FieldRule, MessageConfig, NotificationMessage, Offer, OfferDetails};
use crate::services::details::TITLE_LABEL;
use crate::utils::text::{normalize_whitespace, truncate_graphemes};

static CURRENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)€|\bEUR(?:O)?\b").expect("valid currency pattern"));
static AREA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)m²|\bm2\b|\bqm\b").expect("valid area pattern"));

const CURRENCY_SUFFIX: &str = "€";
const AREA_SUFFIX: &str = "m²";

/// Energy efficiency tier shown as a colored indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyTier {
    Favorable,
    Caution,
    Alert,
    Unknown,
}

impl EnergyTier {
    /// Classify an energy class value such as `"B"`, `"A+"` or `"Klasse F"`.
    pub fn classify(value: &str) -> Self {
        let class = value
            .split_whitespace()
            .map(|token| {
                token
                    .trim_matches(|c: char| !c.is_alphanumeric() && c != '+')
                    .to_uppercase()
            })
            .find(|token| is_energy_class(token));

        match class.as_deref() {
            Some("A++" | "A+" | "A" | "B") => Self::Favorable,
            Some("C" | "D" | "E") => Self::Caution,
            Some("F" | "G" | "H") => Self::Alert,
            _ => Self::Unknown,
        }
    }

    pub fn indicator(&self) -> &'static str {
        match self {
            Self::Favorable => "🟢",
            Self::Caution => "🟡",
            Self::Alert => "🔴",
            Self::Unknown => "⚪",
        }
    }
}

fn is_energy_class(token: &str) -> bool {
    matches!(
        token,
        "A++" | "A+" | "A" | "B" | "C" | "D" | "E" | "F" | "G" | "H"
    )
}

/// Renders offers into notification text.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    layout: MessageConfig,
    default_title: String,
    action_url_template: Option<String>,
}

impl MessageFormatter {
    pub fn new(
        layout: MessageConfig,
        default_title: impl Into<String>,
        action_url_template: Option<String>,
    ) -> Self {
        Self {
            layout,
            default_title: default_title.into(),
            action_url_template,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.message.clone(),
            config.site.default_title.clone(),
            config.telegram.action_url_template.clone(),
        )
    }

    /// Render one offer.
    pub fn render(&self, offer: &Offer, details: &OfferDetails) -> NotificationMessage {
        let mut lines = Vec::new();

        lines.push(prefixed(
            &self.layout.title_glyph,
            &html::bold(&html::escape(&self.title(offer, details))),
        ));
        lines.push(String::new());

        for rule in &self.layout.fields {
            if let Some(line) = details
                .get(&rule.label)
                .and_then(|value| self.field_line(rule, value))
            {
                lines.push(line);
            }
        }

        lines.push(String::new());
        lines.push(prefixed(&self.layout.link_glyph, &html::escape(&offer.url)));
        if let Some(action_url) = self.action_url(offer) {
            lines.push(prefixed(&self.layout.action_glyph, &html::escape(&action_url)));
        }

        NotificationMessage::new(&offer.id, lines.join("\n"))
    }

    /// Listing anchor text, or the detail heading when the anchor was empty.
    fn title(&self, offer: &Offer, details: &OfferDetails) -> String {
        if offer.title == self.default_title {
            if let Some(heading) = details.get(TITLE_LABEL) {
                return normalize_whitespace(heading);
            }
        }
        normalize_whitespace(&offer.title)
    }

    fn action_url(&self, offer: &Offer) -> Option<String> {
        self.action_url_template
            .as_ref()
            .map(|template| template.replace("{id}", &offer.id))
    }

    fn field_line(&self, rule: &FieldRule, raw: &str) -> Option<String> {
        let value = normalize_whitespace(raw);
        if value.is_empty() {
            return None;
        }

        let label = html::bold(&html::escape(&format!("{}:", rule.label)));
        let body = match rule.kind {
            FieldKind::Plain => format!("{label} {}", html::escape(&value)),
            FieldKind::Currency => {
                format!("{label} {}", html::escape(&with_unit(&value, &CURRENCY, CURRENCY_SUFFIX)?))
            }
            FieldKind::Area => {
                format!("{label} {}", html::escape(&with_unit(&value, &AREA, AREA_SUFFIX)?))
            }
            FieldKind::EnergyClass => format!(
                "{label} {} {}",
                html::escape(&value),
                EnergyTier::classify(&value).indicator()
            ),
            FieldKind::Description => {
                html::escape(&truncate_graphemes(&value, self.layout.max_description_chars))
            }
        };

        Some(prefixed(&rule.glyph, &body))
    }
}

/// Strip unit symbols from `value` and append `suffix` instead.
fn with_unit(value: &str, symbols: &Regex, suffix: &str) -> Option<String> {
    let bare = normalize_whitespace(&symbols.replace_all(value, " "));
    if bare.is_empty() {
        None
    } else {
        Some(format!("{bare} {suffix}"))
    }
}

fn prefixed(glyph: &str, body: &str) -> String {
    if glyph.is_empty() {
        body.to_string()
    } else {
        format!("{glyph} {body}")
    }
}
