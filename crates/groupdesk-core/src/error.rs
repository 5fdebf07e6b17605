// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Groupdesk relay.

use thiserror::Error;

use crate::types::Platform;

/// The primary error type used across all Groupdesk traits and core operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (missing token, invalid value).
    #[error("configuration error: {0}")]
    Config(String),

    /// Backing store errors (database unreachable, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A message is missing the fields needed to route it.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A call to Telegram or Intercom failed (network, auth, conflict, rate limit).
    #[error("{platform} error: {message}")]
    Platform {
        platform: Platform,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A remote entity that was expected to exist does not.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Shorthand for a platform error without an underlying source.
    pub fn platform(platform: Platform, message: impl Into<String>) -> Self {
        Self::Platform {
            platform,
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Returns true when the failure came from the backing store.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}
