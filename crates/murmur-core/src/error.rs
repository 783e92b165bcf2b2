// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Murmur mesh bridge.

use thiserror::Error;

/// The primary error type used across all Murmur components.
#[derive(Debug, Error)]
pub enum MurmurError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Mesh transport errors (connect/handshake/send failures). Retried with
    /// backoff by the supervisor and dispatcher, never fatal.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// AI gateway errors (generation, triage, summarization).
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Conversation journal write failure.
    #[error("journal error: {source}")]
    Journal {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A payload that cannot be chunked (zero-length payload budget).
    #[error("payload too large: budget is {budget} bytes")]
    PayloadTooLarge { budget: usize },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MurmurError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        MurmurError::Transport {
            message: message.into(),
            source: None,
        }
    }
}

/// Failure modes of an AI provider call.
///
/// Every variant converts to an implicit `Skip` decision at the triage
/// boundary; `InvalidCredentials` additionally raises a sticky warning in
/// the engine status without stopping message ingestion.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider call exceeded its time budget.
    #[error("gateway call timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The provider rejected the call due to rate limiting (after retries).
    #[error("gateway rate limited")]
    RateLimited,

    /// The provider rejected the configured credentials.
    #[error("gateway credentials rejected")]
    InvalidCredentials,

    /// Any other provider failure.
    #[error("gateway error: {0}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_variants_construct() {
        let _config = MurmurError::Config("bad".into());
        let _transport = MurmurError::transport("socket closed");
        let _gateway = MurmurError::Gateway(GatewayError::RateLimited);
        let _journal = MurmurError::Journal {
            source: Box::new(std::io::Error::other("disk full")),
        };
        let _payload = MurmurError::PayloadTooLarge { budget: 0 };
        let _internal = MurmurError::Internal("bug".into());
    }

    #[test]
    fn gateway_error_converts() {
        let err: MurmurError = GatewayError::InvalidCredentials.into();
        assert!(matches!(
            err,
            MurmurError::Gateway(GatewayError::InvalidCredentials)
        ));
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            MurmurError::transport("socket closed").to_string(),
            "transport error: socket closed"
        );
        assert_eq!(
            GatewayError::InvalidCredentials.to_string(),
            "gateway credentials rejected"
        );
    }
}
