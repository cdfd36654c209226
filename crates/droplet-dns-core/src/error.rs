//! Error types for droplet-dns
//!
//! This module defines all error types used throughout the crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for droplet-dns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for droplet-dns
#[derive(Error, Debug)]
pub enum Error {
    /// Inventory source errors (listing instances failed)
    #[error("Inventory error: {0}")]
    Inventory(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-related errors (socket bind, send, receive)
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// DNS wire format errors
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The provider returned pages in a way that cannot be followed
    #[error("Pagination error: {0}")]
    Pagination(String),

    /// The inventory fetch did not complete before its deadline
    #[error("Inventory fetch timed out after {0:?}")]
    Timeout(Duration),

    /// An instance selected for a reply has no usable IPv4 address
    #[error("Address error for instance {instance}: {message}")]
    Address {
        /// Instance name
        instance: String,
        /// Error message
        message: String,
    },

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create an inventory error
    pub fn inventory(msg: impl Into<String>) -> Self {
        Self::Inventory(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a pagination error
    pub fn pagination(msg: impl Into<String>) -> Self {
        Self::Pagination(msg.into())
    }

    /// Create an address error for the named instance
    pub fn address(instance: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Address {
            instance: instance.into(),
            message: message.into(),
        }
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether a later refresh cycle may succeed where this one failed
    ///
    /// Only used for log severity; the refresh schedule is the same either way.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Http(_) | Error::RateLimited(_) | Error::Timeout(_)
        )
    }
}
