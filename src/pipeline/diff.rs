//! Change detection between the fetched listing and the known-offer set.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::Offer;

/// Offers found in one fetch, split against the known set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Listed offers whose id is not known yet, in id order
    pub added: BTreeMap<String, Offer>,
    /// Listed offers that were already known
    pub unchanged: usize,
}

impl ChangeSet {
    /// Check if there are any new offers.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty()
    }

    /// Ids of the new offers, in order.
    pub fn added_ids(&self) -> Vec<&str> {
        self.added.keys().map(String::as_str).collect()
    }
}

/// Compute the offers that are listed but not yet known.
///
/// Pure and deterministic; iteration over the result is lexicographic by id.
pub fn detect_new_offers(
    fetched: &BTreeMap<String, Offer>,
    known: &BTreeSet<String>,
) -> ChangeSet {
    let mut changes = ChangeSet::default();
    for (id, offer) in fetched {
        if known.contains(id) {
            changes.unchanged += 1;
        } else {
            changes.added.insert(id.clone(), offer.clone());
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(ids: &[&str]) -> BTreeMap<String, Offer> {
        ids.iter()
            .map(|id| {
                (
                    id.to_string(),
                    Offer::new(*id, format!("https://example.com/d/{id}/x/"), "t"),
                )
            })
            .collect()
    }

    fn known(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_changes() {
        let changes = detect_new_offers(&listing(&["1", "2"]), &known(&["1", "2", "3"]));
        assert!(!changes.has_changes());
        assert_eq!(changes.unchanged, 2);
    }

    #[test]
    fn test_additions_in_lexicographic_order() {
        let changes = detect_new_offers(&listing(&["7", "42", "3"]), &known(&["3"]));
        assert!(changes.has_changes());
        assert_eq!(changes.added_ids(), vec!["42", "7"]);
        assert_eq!(changes.unchanged, 1);
    }

    #[test]
    fn test_empty_to_full() {
        let changes = detect_new_offers(&listing(&["1"]), &BTreeSet::new());
        assert_eq!(changes.added_ids(), vec!["1"]);
    }

    #[test]
    fn test_full_to_empty() {
        let changes = detect_new_offers(&BTreeMap::new(), &known(&["1"]));
        assert!(!changes.has_changes());
        assert_eq!(changes.unchanged, 0);
    }
}
