// src/services/listing.rs

//! Listing page fetcher.
//!
//! Turns the search result page into the candidate offer set.

use std::collections::BTreeMap;
use std::sync::Arc;

use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Offer, SiteConfig};
use crate::utils::http::PageFetcher;
use crate::utils::text::element_text;
use crate::utils::{extract_offer_id, resolve_url};

/// Service that reads the listing page.
pub struct ListingFetcher {
    site: SiteConfig,
    base_url: Url,
    link_sel: Selector,
    pages: Arc<dyn PageFetcher>,
}

impl ListingFetcher {
    /// Create a fetcher for the configured site.
    pub fn new(site: SiteConfig, pages: Arc<dyn PageFetcher>) -> Result<Self> {
        let base_url = Url::parse(&site.base_url)?;
        let selector = format!("a[href*=\"{}\"]", site.detail_path);
        let link_sel =
            Selector::parse(&selector).map_err(|e| AppError::selector(&selector, format!("{e:?}")))?;

        Ok(Self {
            site,
            base_url,
            link_sel,
            pages,
        })
    }

    /// Fetch the listing page and return the offers keyed by id.
    ///
    /// Transport failures are errors; a page without matching links is an
    /// empty map.
    pub async fn fetch_offers(&self) -> Result<BTreeMap<String, Offer>> {
        let html = self.pages.fetch(&self.site.listing_url).await?;
        let offers = self.parse_listing(&html);
        if offers.is_empty() {
            log::warn!(
                "No detail links matching {:?} on {}",
                self.site.detail_path,
                self.site.listing_url
            );
        }
        Ok(offers)
    }

    /// Extract offers from a listing document.
    pub fn parse_listing(&self, html: &str) -> BTreeMap<String, Offer> {
        let document = Html::parse_document(html);
        let mut offers: BTreeMap<String, Offer> = BTreeMap::new();

        for anchor in document.select(&self.link_sel) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(id) = extract_offer_id(href) else {
                log::debug!("Skipping detail link without id: {href}");
                continue;
            };

            let text = element_text(&anchor);

            // Cards often link the same offer twice (image + headline); keep
            // the first link but prefer a non-empty title.
            if let Some(existing) = offers.get_mut(&id) {
                if existing.title == self.site.default_title && !text.is_empty() {
                    existing.title = text;
                }
                continue;
            }

            let title = if text.is_empty() {
                self.site.default_title.clone()
            } else {
                text
            };
            let url = resolve_url(&self.base_url, href);
            offers.insert(id.clone(), Offer { id, url, title });
        }

        offers
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct NoPages;

    #[async_trait]
    impl PageFetcher for NoPages {
        async fn fetch(&self, url: &str) -> Result<String> {
            Err(AppError::config(format!("unexpected fetch of {url}")))
        }
    }

    fn fetcher() -> ListingFetcher {
        ListingFetcher::new(SiteConfig::default(), Arc::new(NoPages)).unwrap()
    }

    const LISTING: &str = r#"
        <html><body>
          <div class="teaser">
            <a href="/immobiliensuche/immo-detail/1234/zwei-zimmer/"><img src="a.jpg"></a>
            <a href="/immobiliensuche/immo-detail/1234/zwei-zimmer/">
              2-Zimmer-Wohnung in   Barmbek
            </a>
          </div>
          <div class="teaser">
            <a href="https://www.saga.hamburg/immobiliensuche/immo-detail/5678/altbau/">Altbau in Eimsbüttel</a>
          </div>
          <a href="/immobiliensuche/immo-detail/9999/ohne-titel/"></a>
          <a href="/kontakt/">Kontakt</a>
        </body></html>
    "#;

    #[test]
    fn test_parse_listing() {
        let offers = fetcher().parse_listing(LISTING);

        let ids: Vec<&str> = offers.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["1234", "5678", "9999"]);

        let first = &offers["1234"];
        assert_eq!(first.title, "2-Zimmer-Wohnung in Barmbek");
        assert_eq!(
            first.url,
            "https://www.saga.hamburg/immobiliensuche/immo-detail/1234/zwei-zimmer/"
        );
        assert_eq!(offers["5678"].title, "Altbau in Eimsbüttel");
        assert_eq!(offers["9999"].title, "Neues Angebot");
    }

    #[test]
    fn test_structural_drift_yields_empty_map() {
        let offers = fetcher().parse_listing("<html><body><a href=\"/angebote/1\">x</a></body></html>");
        assert!(offers.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_error() {
        assert!(fetcher().fetch_offers().await.is_err());
    }
}
