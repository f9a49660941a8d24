//! Error taxonomy for a chat turn.
//!
//! A turn ends on an external call that failed, a request that could not be
//! understood, or a response line that could not be serialized. A full-text record that no longer exists is
//! not an error at all; stores report it as `Ok(None)`.

use thiserror::Error;

/// Errors surfaced by the chat pipeline.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A language model, vector index, or full-text store call failed.
    #[error("{service} call failed: {source}")]
    ExternalService {
        service: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The inbound request was malformed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A wire event could not be serialized.
    #[error("failed to encode stream event: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl ChatError {
    pub fn external(service: &'static str, source: anyhow::Error) -> Self {
        ChatError::ExternalService { service, source }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ChatError::Validation(_))
    }
}
