// src/models/mod.rs

//! Domain models for the monitor.
//!
//! This module contains the per-cycle data (offers, attribute bags, rendered
//! messages) and the configuration structures.

mod config;
mod offer;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, FieldKind, FieldRule, MessageConfig, SchedulerConfig, SiteConfig,
    StorageConfig, TelegramConfig,
};
pub use offer::{NotificationMessage, Offer, OfferDetails};
