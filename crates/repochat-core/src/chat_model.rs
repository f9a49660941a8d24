//! Chat-completion abstraction.
//!
//! The term extractor and the answer generator talk to a language model
//! only through [`ChatModel`]. The app crate provides HTTP clients; tests
//! substitute scripted models.

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;

use crate::models::Message;

/// A stream of text deltas produced by a streaming completion.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Which pipeline role a model serves.
///
/// Only [`ModelRole::Generator`] output is forwarded to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    /// Extracts search terms from the question.
    Retriever,
    /// Writes the answer.
    Generator,
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run a completion and return the full response text.
    async fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Run a completion and return the response as a stream of deltas.
    async fn stream(&self, messages: &[Message]) -> Result<TextStream>;
}
