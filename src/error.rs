// src/error.rs

//! Unified error handling for the monitor.

use std::fmt;

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Listing or detail page could not be retrieved (transport, status, timeout)
    #[error("Fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Detail page was fetched but yielded nothing usable
    #[error("Extraction error for {url}: {message}")]
    Extraction { url: String, message: String },

    /// Sending a message to one recipient failed
    #[error("Delivery to {recipient} failed: {message}")]
    Delivery { recipient: String, message: String },

    /// Reading or writing a persisted set failed
    #[error("Store error: {0}")]
    Store(#[from] std::io::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create an extraction error for a detail page.
    pub fn extraction(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extraction {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a delivery error for one recipient.
    pub fn delivery(recipient: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Delivery {
            recipient: recipient.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AppError::delivery("42", "chat not found");
        assert_eq!(err.to_string(), "Delivery to 42 failed: chat not found");

        let err = AppError::extraction("https://example.com/1", "empty page");
        assert_eq!(
            err.to_string(),
            "Extraction error for https://example.com/1: empty page"
        );
    }

    #[test]
    fn test_io_converts_to_store() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::Store(_)));
    }
}
