//! Wire events for the chat response stream.
//!
//! Every event is one line: a single-character tag, a colon, a JSON
//! payload, and a newline.
//!
//! | Tag | Event | Payload |
//! |-----|-------|---------|
//! | `h` | [`StreamEvent::Citation`] | `{"sourceType":"url","id":"","url":…,"title":…}` |
//! | `0` | [`StreamEvent::TextDelta`] | JSON string |
//!
//! Citations come from the retrieval step and text deltas from the answer
//! model, so every `h:` line of a turn precedes every `0:` line.

use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;

use crate::chat_model::ModelRole;
use crate::error::ChatError;
use crate::models::RetrievedChunk;
use crate::pipeline::PipelineEvent;

/// Maximum citations emitted per turn. Later chunks are dropped.
pub const MAX_CITATIONS: usize = 10;

/// A reference to a retrieved source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub source_type: &'static str,
    pub id: String,
    pub url: String,
    pub title: String,
}

impl Citation {
    pub fn from_chunk(chunk: &RetrievedChunk) -> Self {
        Self {
            source_type: "url",
            id: String::new(),
            url: chunk.source.clone(),
            title: chunk.source.clone(),
        }
    }
}

/// One line of the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Citation(Citation),
    TextDelta { text: String },
}

impl StreamEvent {
    pub fn tag(&self) -> char {
        match self {
            StreamEvent::Citation(_) => 'h',
            StreamEvent::TextDelta { .. } => '0',
        }
    }

    /// Encode as `<tag>:<json>\n`.
    pub fn encode(&self) -> Result<String, ChatError> {
        let payload = match self {
            StreamEvent::Citation(c) => serde_json::to_string(c)?,
            StreamEvent::TextDelta { text } => serde_json::to_string(text)?,
        };
        Ok(format!("{}:{}\n", self.tag(), payload))
    }
}

/// Map a pipeline event to the wire events it produces.
///
/// Only text from the answer model reaches the client; the final state
/// produces nothing.
pub fn events_for(event: &PipelineEvent) -> Vec<StreamEvent> {
    match event {
        PipelineEvent::Retrieved { context } => context
            .iter()
            .take(MAX_CITATIONS)
            .map(|chunk| StreamEvent::Citation(Citation::from_chunk(chunk)))
            .collect(),
        PipelineEvent::Token {
            origin: ModelRole::Generator,
            text,
        } => vec![StreamEvent::TextDelta { text: text.clone() }],
        PipelineEvent::Token { .. } | PipelineEvent::Done { .. } => Vec::new(),
    }
}

/// Encode a pipeline run into wire lines.
///
/// The returned stream is lazy: each pipeline event is pulled only after
/// the lines of the previous one were taken. A pipeline error is passed
/// through once and the run ends with it.
pub fn encode_run<S>(run: S) -> impl Stream<Item = Result<String, ChatError>> + Send
where
    S: Stream<Item = Result<PipelineEvent, ChatError>> + Send,
{
    run.flat_map(|item| {
        let lines: Vec<Result<String, ChatError>> = match item {
            Ok(event) => events_for(&event).iter().map(StreamEvent::encode).collect(),
            Err(e) => vec![Err(e)],
        };
        stream::iter(lines)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversationState;

    fn chunk(source: &str) -> RetrievedChunk {
        RetrievedChunk {
            source: source.to_string(),
            file_id: format!("id-{source}"),
            content: String::new(),
            start_index: Some(42),
            distance: 0.3,
        }
    }

    fn token(text: &str) -> PipelineEvent {
        PipelineEvent::Token {
            origin: ModelRole::Generator,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_encode_citation() {
        let line = StreamEvent::Citation(Citation::from_chunk(&chunk("src/a.py")))
            .encode()
            .unwrap();
        assert!(line.starts_with("h:"));
        assert!(line.ends_with('\n'));

        let json: serde_json::Value = serde_json::from_str(&line[2..]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sourceType": "url",
                "id": "",
                "url": "src/a.py",
                "title": "src/a.py",
            })
        );
    }

    #[test]
    fn test_citation_field_order() {
        let line = StreamEvent::Citation(Citation::from_chunk(&chunk("a.py")))
            .encode()
            .unwrap();
        assert_eq!(
            line,
            "h:{\"sourceType\":\"url\",\"id\":\"\",\"url\":\"a.py\",\"title\":\"a.py\"}\n"
        );
    }

    #[test]
    fn test_encode_text_delta_escapes() {
        let line = StreamEvent::TextDelta {
            text: "say \"hi\"\nnow".into(),
        }
        .encode()
        .unwrap();
        assert_eq!(line, "0:\"say \\\"hi\\\"\\nnow\"\n");
    }

    #[test]
    fn test_citations_truncated_to_max() {
        let context: Vec<RetrievedChunk> = (0..15).map(|i| chunk(&format!("f{i}.py"))).collect();
        let events = events_for(&PipelineEvent::Retrieved { context });
        assert_eq!(events.len(), MAX_CITATIONS);
        assert_eq!(
            events[9],
            StreamEvent::Citation(Citation::from_chunk(&chunk("f9.py")))
        );
    }

    #[test]
    fn test_only_generator_tokens_are_forwarded() {
        let retriever = PipelineEvent::Token {
            origin: ModelRole::Retriever,
            text: "Foo, Bar".into(),
        };
        assert!(events_for(&retriever).is_empty());
        assert_eq!(
            events_for(&token("hi")),
            vec![StreamEvent::TextDelta { text: "hi".into() }]
        );
        let done = PipelineEvent::Done {
            state: ConversationState::default(),
        };
        assert!(events_for(&done).is_empty());
    }

    #[tokio::test]
    async fn test_encode_run_orders_citations_before_text() {
        let run = stream::iter(vec![
            Ok(PipelineEvent::Retrieved {
                context: (0..12).map(|i| chunk(&format!("f{i}.py"))).collect(),
            }),
            Ok(token("Hello")),
            Ok(token(" world")),
            Ok(PipelineEvent::Done {
                state: ConversationState::default(),
            }),
        ]);
        let lines: Vec<String> = encode_run(run).map(|l| l.unwrap()).collect().await;

        assert_eq!(lines.len(), MAX_CITATIONS + 2);
        let first_text = lines.iter().position(|l| l.starts_with("0:")).unwrap();
        assert_eq!(first_text, MAX_CITATIONS);
        assert!(lines[..first_text].iter().all(|l| l.starts_with("h:")));
        assert_eq!(lines[MAX_CITATIONS + 1], "0:\" world\"\n");
    }

    #[tokio::test]
    async fn test_encode_run_passes_error_through() {
        let run = stream::iter(vec![
            Ok(token("partial")),
            Err(ChatError::external("answer model", anyhow::anyhow!("reset"))),
        ]);
        let items: Vec<Result<String, ChatError>> = encode_run(run).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }
}
