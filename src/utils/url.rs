// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Derive the offer id from a detail link.
///
/// The id is the path segment right before the trailing one, e.g.
/// `/immobiliensuche/immo-detail/1234/zwei-zimmer-wohnung/` → `1234`.
/// Query string and fragment are ignored.
pub fn extract_offer_id(href: &str) -> Option<String> {
    let path = match Url::parse(href) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => href
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    if segments.len() < 2 {
        return None;
    }

    let id = segments[segments.len() - 2].trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}
