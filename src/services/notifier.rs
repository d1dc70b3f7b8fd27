// src/services/notifier.rs

//! Fan-out of new offers to recipients.
//!
//! Failures are isolated twice: an offer whose details cannot be extracted
//! is skipped without affecting the other offers, and a failed send to one
//! recipient does not stop the sends to the rest.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, Recipient};

use crate::error::{AppError, Result};
use crate::models::{Config, NotificationMessage, Offer};
use crate::services::{DetailExtractor, MessageFormatter};
use crate::utils::http::PageFetcher;

/// Outbound message channel.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send rich text to one recipient.
    async fn send(&self, recipient: &str, text: &str) -> Result<()>;
}

/// Telegram bot messenger (HTML, no link previews).
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn from_token(token: &str) -> Self {
        Self::new(Bot::new(token))
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

/// Numeric ids are chats, anything else a channel username.
fn to_recipient(id: &str) -> Recipient {
    let id = id.trim();
    match id.parse::<i64>() {
        Ok(chat) => Recipient::Id(ChatId(chat)),
        Err(_) => Recipient::ChannelUsername(id.to_string()),
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(&self, recipient: &str, text: &str) -> Result<()> {
        self.bot
            .send_message(to_recipient(recipient), text)
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true)
            .await
            .map_err(|e| AppError::delivery(recipient, e))?;
        Ok(())
    }
}

/// Result of sending one message to a recipient list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

/// Result of notifying about a batch of new offers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyOutcome {
    /// Offers that were rendered and handed to the messenger
    pub rendered: Vec<String>,
    /// Offers skipped because their details could not be extracted
    pub skipped: Vec<String>,
    pub deliveries: usize,
    pub delivery_failures: usize,
}

/// Service that extracts, renders and delivers new offers.
pub struct Notifier {
    extractor: DetailExtractor,
    formatter: MessageFormatter,
    messenger: Arc<dyn Messenger>,
    max_concurrent: usize,
    request_delay: Duration,
}

impl Notifier {
    pub fn new(
        config: &Config,
        pages: Arc<dyn PageFetcher>,
        messenger: Arc<dyn Messenger>,
    ) -> Result<Self> {
        Ok(Self {
            extractor: DetailExtractor::new(pages)?,
            formatter: MessageFormatter::from_config(config),
            messenger,
            max_concurrent: config.crawler.max_concurrent.max(1),
            request_delay: Duration::from_millis(config.crawler.request_delay_ms),
        })
    }

    /// Notify `recipients` about every offer, in id order.
    pub async fn notify(
        &self,
        offers: &BTreeMap<String, Offer>,
        recipients: &[String],
    ) -> NotifyOutcome {
        let mut outcome = NotifyOutcome::default();

        if recipients.is_empty() {
            log::warn!(
                "No recipients registered; {} new offer(s) will not be delivered",
                offers.len()
            );
        }

        // Detail pages may be fetched ahead with bounded concurrency; results
        // still arrive in id order and deliveries stay sequential.
        let mut extracted = stream::iter(offers.values())
            .map(|offer| async move {
                let details = self.extractor.extract(offer).await;
                (offer, details)
            })
            .buffered(self.max_concurrent);

        while let Some((offer, result)) = extracted.next().await {
            match result {
                Ok(details) => {
                    let message = self.formatter.render(offer, &details);
                    let report = self.deliver(&message, recipients).await;
                    log::info!(
                        "Offer {} sent to {}/{} recipient(s)",
                        offer.id,
                        report.sent,
                        recipients.len()
                    );
                    outcome.deliveries += report.sent;
                    outcome.delivery_failures += report.failed;
                    outcome.rendered.push(offer.id.clone());
                }
                Err(error) => {
                    log::warn!("Skipping offer {} ({}): {}", offer.id, offer.url, error);
                    outcome.skipped.push(offer.id.clone());
                }
            }

            if !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        outcome
    }

    /// Send one rendered message to each recipient in turn.
    pub async fn deliver(
        &self,
        message: &NotificationMessage,
        recipients: &[String],
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for recipient in recipients {
            match self.messenger.send(recipient, message.text()).await {
                Ok(()) => report.sent += 1,
                Err(error) => {
                    report.failed += 1;
                    log::warn!(
                        "Failed to deliver offer {} to {}: {}",
                        message.offer_id(),
                        recipient,
                        error
                    );
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct FixturePages;

    #[async_trait]
    impl PageFetcher for FixturePages {
        async fn fetch(&self, url: &str) -> Result<String> {
            if url.contains("/broken/") {
                return Err(AppError::config("connection reset"));
            }
            Ok("<h1>Wohnung</h1><table><tr><td>Zimmer</td><td>3</td></tr></table>".into())
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Messenger for Recorder {
        async fn send(&self, recipient: &str, text: &str) -> Result<()> {
            if recipient == "blocked" {
                return Err(AppError::delivery(recipient, "bot was blocked by the user"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn offers(entries: &[(&str, &str)]) -> BTreeMap<String, Offer> {
        entries
            .iter()
            .map(|(id, path)| {
                let url = format!("https://example.com/{path}/{id}/x/");
                (id.to_string(), Offer::new(*id, url, format!("Offer {id}")))
            })
            .collect()
    }

    fn recipients(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_to_recipient() {
        assert_eq!(to_recipient(" 42 "), Recipient::Id(ChatId(42)));
        assert_eq!(to_recipient("-1001"), Recipient::Id(ChatId(-1001)));
        assert_eq!(
            to_recipient("@saga_feed"),
            Recipient::ChannelUsername("@saga_feed".to_string())
        );
    }

    #[tokio::test]
    async fn test_failed_extraction_skips_only_that_offer() {
        let recorder = Arc::new(Recorder::default());
        let notifier =
            Notifier::new(&Config::default(), Arc::new(FixturePages), recorder.clone()).unwrap();

        let outcome = notifier
            .notify(&offers(&[("1", "broken"), ("2", "ok")]), &recipients(&["a"]))
            .await;

        assert_eq!(outcome.skipped, vec!["1"]);
        assert_eq!(outcome.rendered, vec!["2"]);
        assert_eq!(outcome.deliveries, 1);
        assert_eq!(recorder.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_recipient_does_not_stop_others() {
        let recorder = Arc::new(Recorder::default());
        let notifier =
            Notifier::new(&Config::default(), Arc::new(FixturePages), recorder.clone()).unwrap();

        let outcome = notifier
            .notify(
                &offers(&[("7", "ok"), ("42", "ok")]),
                &recipients(&["a", "blocked", "c"]),
            )
            .await;

        assert_eq!(outcome.rendered, vec!["42", "7"]);
        assert_eq!(outcome.deliveries, 4);
        assert_eq!(outcome.delivery_failures, 2);

        let sent = recorder.sent.lock().unwrap();
        let order: Vec<&str> = sent.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "a", "c"]);
        assert!(sent[0].1.contains("Offer 42"));
    }

    #[tokio::test]
    async fn test_bounded_concurrency_keeps_order() {
        let mut config = Config::default();
        config.crawler.max_concurrent = 4;
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(&config, Arc::new(FixturePages), recorder.clone()).unwrap();

        let outcome = notifier
            .notify(&offers(&[("3", "ok"), ("1", "ok"), ("2", "ok")]), &recipients(&["a"]))
            .await;

        assert_eq!(outcome.rendered, vec!["1", "2", "3"]);
    }
}
