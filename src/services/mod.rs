//! Service layer for the monitor.
//!
//! This module contains the business logic for:
//! - Listing page reading (`ListingFetcher`)
//! - Detail page attribute extraction (`DetailExtractor`)
//! - Notification rendering (`MessageFormatter`)
//! - Fan-out to recipients (`Notifier`)
//! - Subscriber bookkeeping (`SubscriberRegistry`)

pub mod details;
mod listing;
mod message;
mod notifier;
mod subscriptions;

pub use details::DetailExtractor;
pub use listing::ListingFetcher;
pub use message::{EnergyTier, MessageFormatter};
pub use notifier::{DeliveryReport, Messenger, Notifier, NotifyOutcome, TelegramMessenger};
pub use subscriptions::{SubscribeAck, SubscriberCommand, SubscriberHandle, SubscriberRegistry};
