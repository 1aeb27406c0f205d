// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Weft session sync engine.

use thiserror::Error;

/// The primary error type used across Weft crates.
///
/// Nothing in the reconciler is fatal: every variant describes a failure that
/// degrades to "state is stale until the next successful resync".
#[derive(Debug, Error)]
pub enum WeftError {
    /// Configuration errors (invalid TOML, bad URL, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Event transport errors (connection refused, stream interrupted).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Errors returned by the REST collaborator.
    #[error("api error: {message}")]
    Api {
        message: String,
        /// HTTP status code when the server answered at all.
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An event payload is missing a required field or has the wrong shape.
    #[error("malformed `{event_type}` payload: {message}")]
    Decode { event_type: String, message: String },

    /// No live subscription exists for the session.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The subscription was torn down while a command was in flight.
    #[error("subscription closed for session {0}")]
    SubscriptionClosed(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WeftError {
    /// Shorthand for an API error without an underlying source.
    pub fn api(message: impl Into<String>, status: Option<u16>) -> Self {
        WeftError::Api {
            message: message.into(),
            status,
            source: None,
        }
    }

    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        WeftError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a payload decode error.
    pub fn decode(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        WeftError::Decode {
            event_type: event_type.into(),
            message: message.into(),
        }
    }
}
