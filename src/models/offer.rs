//! Offer, attribute bag and rendered message types.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One listing entry found on the search page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Offer {
    /// Second-to-last path segment of the detail URL
    pub id: String,

    /// Absolute URL of the detail page
    pub url: String,

    /// Anchor text from the listing, or the configured placeholder
    pub title: String,
}

impl Offer {
    pub fn new(id: impl Into<String>, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: title.into(),
        }
    }
}

/// Ordered label → value mapping scraped from a detail page.
///
/// Labels keep the position of their first insertion; a later insert of the
/// same label replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferDetails {
    entries: IndexMap<String, String>,
}

impl OfferDetails {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, overwriting any previous value for the label.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(label.into(), value.into());
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries.get(label).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// Merge a later pass into this one; `later` wins on collisions.
    pub fn merge(&mut self, later: OfferDetails) {
        for (label, value) in later.entries {
            self.entries.insert(label, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OfferDetails {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut details = Self::new();
        for (label, value) in iter {
            details.insert(label, value);
        }
        details
    }
}

/// Rendered notification for one offer. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    offer_id: String,
    text: String,
}

impl NotificationMessage {
    pub fn new(offer_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            offer_id: offer_id.into(),
            text: text.into(),
        }
    }

    pub fn offer_id(&self) -> &str {
        &self.offer_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_later_wins_and_keeps_position() {
        let mut details: OfferDetails = [("Zimmer", "2"), ("Etage", "3. OG")].into_iter().collect();
        let later: OfferDetails = [("Zimmer", "2,5"), ("Heizkosten", "80 €")]
            .into_iter()
            .collect();

        details.merge(later);

        let labels: Vec<&str> = details.iter().map(|(k, _)| k).collect();
        assert_eq!(labels, vec!["Zimmer", "Etage", "Heizkosten"]);
        assert_eq!(details.get("Zimmer"), Some("2,5"));
        assert_eq!(details.len(), 3);
    }

    #[test]
    fn test_missing_label() {
        let details = OfferDetails::new();
        assert!(details.is_empty());
        assert_eq!(details.get("Zimmer"), None);
        assert!(!details.contains("Zimmer"));
    }
}
