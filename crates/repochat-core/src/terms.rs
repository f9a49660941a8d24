//! Search-term derivation.
//!
//! A language model is asked for identifiers mentioned in the question.
//! Its comma-separated answer is combined with fixed keywords and the raw
//! question into the list the retriever searches with.

use crate::chat_model::ChatModel;
use crate::error::ChatError;
use crate::models::Message;
use crate::prompt::render;

/// Ask `model` for class/function-like names in `question`.
///
/// Model failures are returned as [`ChatError::ExternalService`]; whether
/// to continue without extracted terms is the caller's decision.
pub async fn extract_terms(
    model: &dyn ChatModel,
    template: &str,
    question: &str,
) -> Result<Vec<String>, ChatError> {
    let prompt = Message::user(render(template, &[("question", question)]));
    let raw = model
        .complete(std::slice::from_ref(&prompt))
        .await
        .map_err(|e| ChatError::external("term extraction model", e))?;

    let terms = parse_terms(&raw);
    tracing::debug!(count = terms.len(), "extracted search terms");
    Ok(terms)
}

/// Split a comma-separated model response into trimmed, non-empty terms.
pub fn parse_terms(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `keywords ++ extracted ++ [question]`.
pub fn build_search_terms(keywords: &[String], extracted: &[String], question: &str) -> Vec<String> {
    let mut terms = Vec::with_capacity(keywords.len() + extracted.len() + 1);
    terms.extend_from_slice(keywords);
    terms.extend_from_slice(extracted);
    terms.push(question.to_string());
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_model::TextStream;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Canned {
        reply: Result<String, String>,
        seen: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl ChatModel for Canned {
        async fn complete(&self, messages: &[Message]) -> Result<String> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            self.reply.clone().map_err(|e| anyhow::anyhow!(e))
        }
        async fn stream(&self, _messages: &[Message]) -> Result<TextStream> {
            anyhow::bail!("not used")
        }
    }

    #[test]
    fn test_parse_terms_trims_and_drops_empty() {
        assert_eq!(
            parse_terms(" Foo, bar_baz ,, Qux.run ,"),
            vec!["Foo", "bar_baz", "Qux.run"]
        );
        assert!(parse_terms("").is_empty());
        assert!(parse_terms("  \n ").is_empty());
    }

    #[test]
    fn test_build_search_terms_order() {
        let keywords: Vec<String> = vec!["kw1".into(), "kw2".into(), "kw3".into()];
        let terms = build_search_terms(&keywords, &["Foo".to_string()], "What is Foo?");
        assert_eq!(terms, vec!["kw1", "kw2", "kw3", "Foo", "What is Foo?"]);

        let reversed: Vec<&str> = terms.iter().rev().map(String::as_str).collect();
        assert_eq!(reversed, vec!["What is Foo?", "Foo", "kw3", "kw2", "kw1"]);
    }

    #[tokio::test]
    async fn test_extract_terms_renders_question() {
        let model = Canned {
            reply: Ok("Foo, Bar".into()),
            seen: Mutex::new(Vec::new()),
        };
        let terms = extract_terms(&model, "names in: {question}", "What is Foo?")
            .await
            .unwrap();
        assert_eq!(terms, vec!["Foo", "Bar"]);

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].content, "names in: What is Foo?");
    }

    #[tokio::test]
    async fn test_extract_terms_propagates_failure() {
        let model = Canned {
            reply: Err("rate limited".into()),
            seen: Mutex::new(Vec::new()),
        };
        let err = extract_terms(&model, "{question}", "q").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::ExternalService { service: "term extraction model", .. }
        ));
    }
}
