//! Utility functions and helpers.

pub mod http;
pub mod text;
pub mod url;

pub use self::url::{extract_offer_id, resolve_url};
