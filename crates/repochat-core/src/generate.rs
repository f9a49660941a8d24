//! Answer generation.
//!
//! The model sees the whole conversation followed by one extra user message
//! built from the answer template, the question, and the loaded context.

use crate::chat_model::{ChatModel, TextStream};
use crate::error::ChatError;
use crate::models::Message;
use crate::prompt::render;

/// Render the answer template as a user message.
pub fn build_prompt(template: &str, question: &str, context: &str) -> Message {
    Message::user(render(
        template,
        &[("question", question), ("context", context)],
    ))
}

fn with_prompt(history: &[Message], prompt: Message) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.extend_from_slice(history);
    messages.push(prompt);
    messages
}

/// Generate a complete answer in one call.
pub async fn generate(
    model: &dyn ChatModel,
    template: &str,
    history: &[Message],
    question: &str,
    context: &str,
) -> Result<Message, ChatError> {
    let messages = with_prompt(history, build_prompt(template, question, context));
    let text = model
        .complete(&messages)
        .await
        .map_err(|e| ChatError::external("answer model", e))?;
    Ok(Message::assistant(text))
}

/// Start a streaming answer. Errors inside the returned stream are raw
/// model errors; the pipeline wraps them.
pub async fn generate_stream(
    model: &dyn ChatModel,
    template: &str,
    history: &[Message],
    question: &str,
    context: &str,
) -> Result<TextStream, ChatError> {
    let messages = with_prompt(history, build_prompt(template, question, context));
    model
        .stream(&messages)
        .await
        .map_err(|e| ChatError::external("answer model", e))
}
