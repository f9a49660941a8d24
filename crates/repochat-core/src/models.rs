//! Core data models for a chat turn.
//!
//! These types flow through the retrieval and generation pipeline:
//! inbound [`Message`]s become a [`ConversationState`], the retriever fills
//! its context with [`RetrievedChunk`]s, and the context loader resolves
//! each chunk to the [`FullTextRecord`] it was cut from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A chunk returned by the vector index.
///
/// `source` identifies the file the chunk was cut from and is the
/// deduplication key; `file_id` points into the full-text store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    /// Opaque file/document identifier (also used as citation URL and title).
    pub source: String,
    /// Identifier of the backing [`FullTextRecord`].
    pub file_id: String,
    /// Chunk text as indexed.
    pub content: String,
    /// Character offset of the chunk inside its file, when ingestion recorded one.
    pub start_index: Option<i64>,
    /// Distance reported by the index. Smaller is closer.
    pub distance: f64,
}

/// Whole-file content written by ingestion and read by the context loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullTextRecord {
    pub id: String,
    pub content: String,
    pub filepath: String,
    pub file_type: String,
    pub metadata: BTreeMap<String, String>,
}

/// Per-request state of one chat turn.
///
/// Created from the inbound request, filled in by the pipeline, and dropped
/// when the response finishes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub context: Vec<RetrievedChunk>,
    pub answer: Option<String>,
}

impl ConversationState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            context: Vec::new(),
            answer: None,
        }
    }

    /// The question of this turn: the content of the last message.
    pub fn question(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(Role::Assistant).unwrap();
        assert_eq!(json, "assistant");
    }

    #[test]
    fn test_role_rejects_unknown() {
        let parsed: Result<Role, _> = serde_json::from_str("\"wizard\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_question_is_last_message() {
        let state = ConversationState::new(vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("What is Foo?"),
        ]);
        assert_eq!(state.question(), Some("What is Foo?"));
        assert!(state.answer.is_none());
    }

    #[test]
    fn test_question_empty_conversation() {
        let state = ConversationState::default();
        assert_eq!(state.question(), None);
    }
}
