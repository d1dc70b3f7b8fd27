//! Text helpers shared by extraction and formatting.

use scraper::ElementRef;
use unicode_segmentation::UnicodeSegmentation;

/// Collapse every whitespace run (newlines and NBSP included) into one space.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an element with whitespace normalized.
///
/// Text nodes are concatenated as-is, so inline markup such as
/// `Netto-<span>Kaltmiete</span>` keeps the word intact.
pub fn element_text(element: &ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

/// Cut `s` to at most `max` graphemes, ending with an ellipsis when cut.
pub fn truncate_graphemes(s: &str, max: usize) -> String {
    let graphemes: Vec<&str> = s.graphemes(true).collect();
    if graphemes.len() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(1);
    let mut out: String = graphemes[..keep].concat().trim_end().to_string();
    out.push('…');
    out
}
