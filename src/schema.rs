//! Inbound chat request types.
//!
//! The body follows the Vercel AI SDK `useChat` shape. Attachments and tool
//! invocations are accepted so existing clients validate, but only `role`
//! and `content` reach the model.

use serde::Deserialize;

use repochat_core::error::ChatError;
use repochat_core::models::{ConversationState, Message, Role};

#[derive(Debug, Clone, Deserialize)]
pub struct ClientAttachment {
    pub name: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    pub args: serde_json::Map<String, serde_json::Value>,
    pub result: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub experimental_attachments: Option<Vec<ClientAttachment>>,
    #[serde(default, rename = "toolInvocations")]
    pub tool_invocations: Option<Vec<ToolInvocation>>,
}

/// `POST /chat` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ClientMessage>,
}

impl ChatRequest {
    /// Build the per-turn state. An empty conversation has no question and
    /// is rejected.
    pub fn into_state(self) -> Result<ConversationState, ChatError> {
        if self.messages.is_empty() {
            return Err(ChatError::Validation("messages must not be empty".into()));
        }

        let extras = self
            .messages
            .iter()
            .filter(|m| m.experimental_attachments.is_some() || m.tool_invocations.is_some())
            .count();
        if extras > 0 {
            tracing::debug!(messages = extras, "ignoring attachments and tool invocations");
        }

        let messages = self
            .messages
            .into_iter()
            .map(|m| Message::new(m.role, m.content))
            .collect();
        Ok(ConversationState::new(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_message_shape_parses() {
        let body = r#"{
            "messages": [
                {
                    "role": "user",
                    "content": "What does DataToImage do?",
                    "experimental_attachments": [
                        { "name": "a.png", "contentType": "image/png", "url": "data:..." }
                    ],
                    "toolInvocations": [
                        { "toolCallId": "c1", "toolName": "search", "args": {"q": "x"}, "result": {} }
                    ]
                }
            ]
        }"#;
        let req: ChatRequest = serde_json::from_str(body).unwrap();
        let msg = &req.messages[0];
        assert_eq!(msg.role, Role::User);
        assert_eq!(
            msg.experimental_attachments.as_ref().unwrap()[0].content_type,
            "image/png"
        );
        assert_eq!(msg.tool_invocations.as_ref().unwrap()[0].tool_name, "search");

        let state = req.into_state().unwrap();
        assert_eq!(state.question(), Some("What does DataToImage do?"));
    }

    #[test]
    fn test_missing_messages_rejected() {
        assert!(serde_json::from_str::<ChatRequest>("{}").is_err());
        assert!(serde_json::from_str::<ChatRequest>(r#"{"messages": "hi"}"#).is_err());
    }

    #[test]
    fn test_unknown_role_rejected() {
        let body = r#"{"messages":[{"role":"wizard","content":"hi"}]}"#;
        assert!(serde_json::from_str::<ChatRequest>(body).is_err());
    }

    #[test]
    fn test_empty_messages_is_validation_error() {
        let req: ChatRequest = serde_json::from_str(r#"{"messages":[]}"#).unwrap();
        assert!(req.into_state().unwrap_err().is_validation());
    }
}
