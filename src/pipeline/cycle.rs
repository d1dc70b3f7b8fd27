// src/pipeline/cycle.rs

//! One poll cycle: fetch → diff → extract/render/deliver → persist.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::Config;
use crate::pipeline::diff::detect_new_offers;
use crate::services::{ListingFetcher, Messenger, Notifier, SubscriberHandle};
use crate::storage::StateStore;
use crate::utils::http::PageFetcher;

/// Who receives the notifications.
#[derive(Clone)]
pub enum Recipients {
    /// Legacy single-recipient mode
    Fixed(String),
    /// Everyone in the subscriber registry, read once per cycle
    Subscribers(SubscriberHandle),
}

impl Recipients {
    async fn resolve(&self) -> Result<Vec<String>> {
        match self {
            Self::Fixed(id) => Ok(vec![id.clone()]),
            Self::Subscribers(handle) => handle.snapshot().await,
        }
    }
}

/// Summary of a single cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Offers found on the listing page
    pub listed: usize,
    /// Offers not in the known set
    pub new_offers: usize,
    /// New offers that were rendered and handed out
    pub extracted: usize,
    /// New offers whose detail extraction failed
    pub skipped: usize,
    pub deliveries: usize,
    pub delivery_failures: usize,
    /// Whether the known-offer file was written this cycle
    pub persisted: bool,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>, listed: usize) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            listed,
            new_offers: 0,
            extracted: 0,
            skipped: 0,
            deliveries: 0,
            delivery_failures: 0,
            persisted: false,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}

/// The change-detection pipeline and its in-memory state.
pub struct Monitor {
    listing: ListingFetcher,
    notifier: Notifier,
    store: Arc<dyn StateStore>,
    recipients: Recipients,
    known: BTreeSet<String>,
    mark_failed_as_seen: bool,
}

impl Monitor {
    /// Assemble a monitor around an already loaded known set.
    pub fn new(
        config: &Config,
        pages: Arc<dyn PageFetcher>,
        messenger: Arc<dyn Messenger>,
        store: Arc<dyn StateStore>,
        recipients: Recipients,
        known: BTreeSet<String>,
    ) -> Result<Self> {
        Ok(Self {
            listing: ListingFetcher::new(config.site.clone(), Arc::clone(&pages))?,
            notifier: Notifier::new(config, pages, messenger)?,
            store,
            recipients,
            known,
            mark_failed_as_seen: config.scheduler.mark_failed_as_seen,
        })
    }

    /// Apply the cache TTL, load the known set and assemble the monitor.
    pub async fn start(
        config: &Config,
        pages: Arc<dyn PageFetcher>,
        messenger: Arc<dyn Messenger>,
        store: Arc<dyn StateStore>,
        recipients: Recipients,
    ) -> Result<Self> {
        let ttl = Duration::from_secs(config.storage.cache_ttl_days.saturating_mul(86_400));
        store.expire_known(ttl, SystemTime::now()).await?;

        let known = store.load_known().await?;
        log::info!("Loaded {} known offers", known.len());

        Self::new(config, pages, messenger, store, recipients, known)
    }

    /// Ids already notified.
    pub fn known(&self) -> &BTreeSet<String> {
        &self.known
    }

    /// Run one cycle.
    ///
    /// Only a listing fetch failure or an unreachable subscriber registry
    /// fails the cycle; extraction and delivery failures are isolated inside
    /// the notifier, and a failed flush of the known set is logged.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let started_at = Utc::now();
        let offers = self.listing.fetch_offers().await?;
        log::info!("Found {} offers on search page", offers.len());

        let mut report = CycleReport::new(started_at, offers.len());
        let changes = detect_new_offers(&offers, &self.known);
        if !changes.has_changes() {
            log::info!("No new offers");
            return Ok(report.finish());
        }

        log::info!("New offers: {:?}", changes.added_ids());
        report.new_offers = changes.added.len();

        let recipients = self.recipients.resolve().await?;
        let seen: Vec<String> = if recipients.is_empty() {
            // Nobody to tell: record the offers without fetching their pages.
            log::warn!(
                "No recipients registered; marking {} new offer(s) as seen",
                changes.added.len()
            );
            changes.added.into_keys().collect()
        } else {
            let outcome = self.notifier.notify(&changes.added, &recipients).await;

            report.extracted = outcome.rendered.len();
            report.skipped = outcome.skipped.len();
            report.deliveries = outcome.deliveries;
            report.delivery_failures = outcome.delivery_failures;

            let mut seen = outcome.rendered;
            if self.mark_failed_as_seen {
                seen.extend(outcome.skipped);
            }
            seen
        };
        if seen.is_empty() {
            return Ok(report.finish());
        }
        self.known.extend(seen);

        match self.store.save_known(&self.known).await {
            Ok(()) => report.persisted = true,
            Err(e) => log::error!("Failed to save known offers: {e}"),
        }

        Ok(report.finish())
    }
}
