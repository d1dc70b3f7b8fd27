//! Persistence for the monitor's two durable sets.
//!
//! ## Directory Structure
//!
//! ```text
//! data/
//! ├── known_offers.txt   # ids already notified, sorted, rewritten on save
//! └── subscribers.txt    # recipient ids, append-only
//! ```
//!
//! Both files hold one id per line. The known-offers file doubles as a cache:
//! once it is older than the configured TTL it is discarded as a whole at
//! startup and every listed offer is announced once more.

pub mod local;

use std::collections::BTreeSet;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStorage;

/// Trait for state storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the ids of offers that were already notified.
    async fn load_known(&self) -> Result<BTreeSet<String>>;

    /// Replace the known-offer file with `known`, one id per line in sorted order.
    async fn save_known(&self, known: &BTreeSet<String>) -> Result<()>;

    /// Delete the known-offer file if it was last modified more than `ttl` before `now`.
    ///
    /// Returns whether the file was removed.
    async fn expire_known(&self, ttl: Duration, now: SystemTime) -> Result<bool>;

    /// Load the registered recipient ids.
    async fn load_subscribers(&self) -> Result<BTreeSet<String>>;

    /// Append one recipient id to the subscriber file.
    async fn append_subscriber(&self, id: &str) -> Result<()>;
}

/// Parse a newline-delimited id list, ignoring blanks and duplicates.
pub fn parse_id_lines(bytes: &[u8]) -> BTreeSet<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render ids one per line, in the set's (sorted) order.
pub fn render_id_lines(ids: &BTreeSet<String>) -> String {
    ids.iter().map(|id| format!("{id}\n")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_lines() {
        let ids = parse_id_lines(b"42\r\n  7 \n\n3\n42\n");
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["3", "42", "7"]);
    }

    #[test]
    fn test_render_id_lines_sorted_textually() {
        let ids: BTreeSet<String> = ["7", "3", "42"].iter().map(|s| s.to_string()).collect();
        assert_eq!(render_id_lines(&ids), "3\n42\n7\n");
        assert_eq!(render_id_lines(&BTreeSet::new()), "");
    }
}
