// src/services/details.rs

//! Detail page attribute extraction.
//!
//! The detail pages mix several markup styles, so extraction runs a fixed
//! list of passes over the document. Every pass returns its own partial
//! [`OfferDetails`]; the partials are merged in pass order and a later pass
//! overwrites an earlier one on the same label.
//!
//! | # | Pass | Label source |
//! |---|------|--------------|
//! | 0 | heading | `h1` → `Title` |
//! | 1 | definition lists | `dt` → `dd` |
//! | 2 | tables | first cell → second cell, rows with two non-empty cells |
//! | 3 | keyfacts | `.keyfacts-list li`, split on the first colon |
//! | 4 | description | `#text-description` / `.description` → `Description` |
//! | 5 | sections | `h2` text → following `p`/`li` text up to the next `h2` |
//! | 6 | paragraphs | `p` in the main block → `Paragraph N` |

use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Offer, OfferDetails};
use crate::utils::http::PageFetcher;
use crate::utils::text::{element_text, normalize_whitespace};

/// Label of the detail page heading.
pub const TITLE_LABEL: &str = "Title";
/// Label of the free-text description block.
pub const DESCRIPTION_LABEL: &str = "Description";
/// Prefix of the synthetic paragraph labels.
pub const PARAGRAPH_PREFIX: &str = "Paragraph";

type ExtractionPass = fn(&DetailSelectors, &Html) -> OfferDetails;

/// Passes in merge order.
const PASSES: [(&str, ExtractionPass); 7] = [
    ("heading", heading_pass),
    ("definition_list", definition_list_pass),
    ("table", table_pass),
    ("keyfacts", keyfacts_pass),
    ("description", description_pass),
    ("sections", sections_pass),
    ("paragraphs", paragraphs_pass),
];

/// Selectors compiled once per extractor.
struct DetailSelectors {
    h1: Selector,
    dl: Selector,
    dt: Selector,
    dd: Selector,
    table_row: Selector,
    keyfact: Selector,
    description: Vec<Selector>,
    h2: Selector,
    main_block: Vec<Selector>,
    paragraph: Selector,
}

impl DetailSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            h1: parse_selector("h1")?,
            dl: parse_selector("dl")?,
            dt: parse_selector("dt")?,
            dd: parse_selector("dd")?,
            table_row: parse_selector("table tr")?,
            keyfact: parse_selector(".keyfacts-list li")?,
            description: vec![
                parse_selector("#text-description")?,
                parse_selector(".description")?,
            ],
            h2: parse_selector("h2")?,
            main_block: vec![
                parse_selector("article")?,
                parse_selector("div.body-text")?,
                parse_selector("main")?,
            ],
            paragraph: parse_selector("p")?,
        })
    }

    /// First element matched by the first selector in `candidates` that matches anything.
    fn first_match<'a>(document: &'a Html, candidates: &[Selector]) -> Option<ElementRef<'a>> {
        candidates
            .iter()
            .find_map(|sel| document.select(sel).next())
    }
}

/// Service that turns a detail page into an attribute bag.
pub struct DetailExtractor {
    selectors: DetailSelectors,
    pages: Arc<dyn PageFetcher>,
}

impl DetailExtractor {
    pub fn new(pages: Arc<dyn PageFetcher>) -> Result<Self> {
        Ok(Self {
            selectors: DetailSelectors::new()?,
            pages,
        })
    }

    /// Fetch the offer's detail page and extract its attributes.
    pub async fn extract(&self, offer: &Offer) -> Result<OfferDetails> {
        let html = self.pages.fetch(&offer.url).await?;
        let details = self.extract_document(&html);

        if details.is_empty() {
            return Err(AppError::extraction(
                &offer.url,
                "no attributes found on detail page",
            ));
        }

        log::debug!("Extracted {} attributes for offer {}", details.len(), offer.id);
        Ok(details)
    }

    /// Run every pass over a detail document and merge the results.
    pub fn extract_document(&self, html: &str) -> OfferDetails {
        let document = Html::parse_document(html);
        let mut merged = OfferDetails::new();

        for (name, pass) in PASSES {
            let partial = pass(&self.selectors, &document);
            if !partial.is_empty() {
                log::trace!("Pass {name} produced {} attributes", partial.len());
            }
            merged.merge(partial);
        }

        merged
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Text of a label cell without the trailing colon.
fn label_text(element: &ElementRef) -> String {
    element_text(element)
        .trim_end_matches(':')
        .trim()
        .to_string()
}

fn heading_pass(sel: &DetailSelectors, document: &Html) -> OfferDetails {
    let mut details = OfferDetails::new();
    if let Some(h1) = document.select(&sel.h1).next() {
        let title = element_text(&h1);
        if !title.is_empty() {
            details.insert(TITLE_LABEL, title);
        }
    }
    details
}

fn definition_list_pass(sel: &DetailSelectors, document: &Html) -> OfferDetails {
    let mut details = OfferDetails::new();
    for dl in document.select(&sel.dl) {
        let terms = dl.select(&sel.dt);
        let values = dl.select(&sel.dd);
        for (dt, dd) in terms.zip(values) {
            let label = label_text(&dt);
            let value = element_text(&dd);
            if label.is_empty() || value.is_empty() {
                continue;
            }
            details.insert(label, value);
        }
    }
    details
}

fn table_pass(sel: &DetailSelectors, document: &Html) -> OfferDetails {
    let mut details = OfferDetails::new();
    for row in document.select(&sel.table_row) {
        let cells: Vec<ElementRef> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|cell| matches!(cell.value().name(), "th" | "td"))
            .filter(|cell| !element_text(cell).is_empty())
            .collect();

        if let [label, value] = cells.as_slice() {
            let label = label_text(label);
            if !label.is_empty() {
                details.insert(label, element_text(value));
            }
        }
    }
    details
}

fn keyfacts_pass(sel: &DetailSelectors, document: &Html) -> OfferDetails {
    let mut details = OfferDetails::new();
    for item in document.select(&sel.keyfact) {
        let text = element_text(&item);
        if let Some((label, value)) = text.split_once(':') {
            let label = label.trim();
            if !label.is_empty() {
                details.insert(label, value.trim());
            }
        }
    }
    details
}

fn description_pass(sel: &DetailSelectors, document: &Html) -> OfferDetails {
    let mut details = OfferDetails::new();
    if let Some(block) = DetailSelectors::first_match(document, &sel.description) {
        let text = element_text(&block);
        if !text.is_empty() {
            details.insert(DESCRIPTION_LABEL, text);
        }
    }
    details
}

fn sections_pass(sel: &DetailSelectors, document: &Html) -> OfferDetails {
    let mut details = OfferDetails::new();
    for heading in document.select(&sel.h2) {
        let label = element_text(&heading);
        if label.is_empty() {
            continue;
        }

        let mut content = Vec::new();
        for sibling in heading.next_siblings().filter_map(ElementRef::wrap) {
            match sibling.value().name() {
                "h2" => break,
                "p" | "li" => content.push(element_text(&sibling)),
                "ul" | "ol" => content.extend(
                    sibling
                        .children()
                        .filter_map(ElementRef::wrap)
                        .filter(|child| child.value().name() == "li")
                        .map(|li| element_text(&li)),
                ),
                _ => {}
            }
        }

        content.retain(|text| !text.is_empty());
        if !content.is_empty() {
            details.insert(label, normalize_whitespace(&content.join(" ")));
        }
    }
    details
}

fn paragraphs_pass(sel: &DetailSelectors, document: &Html) -> OfferDetails {
    let mut details = OfferDetails::new();
    if let Some(block) = DetailSelectors::first_match(document, &sel.main_block) {
        for (idx, paragraph) in block.select(&sel.paragraph).enumerate() {
            let text = element_text(&paragraph);
            if !text.is_empty() {
                details.insert(format!("{PARAGRAPH_PREFIX} {}", idx + 1), text);
            }
        }
    }
    details
}
