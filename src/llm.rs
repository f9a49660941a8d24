//! Chat-completion clients.
//!
//! [`HttpChatModel`] implements [`ChatModel`] for two wire protocols:
//!
//! | Provider | Endpoint | Streaming format |
//! |----------|----------|------------------|
//! | `openai` | `POST {base_url}/chat/completions` | SSE `data: {...}` lines, ending with `data: [DONE]` |
//! | `ollama` | `POST {base_url}/api/chat` | NDJSON, one object per line, last has `"done": true` |
//!
//! Clients are built once at startup by [`create_models`] and shared by
//! every request. Dropping a returned [`TextStream`] drops the underlying
//! HTTP response, which closes the connection.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use repochat_core::chat_model::{ChatModel, TextStream};
use repochat_core::models::Message;

use crate::config::LlmConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Ollama,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "openai" => Ok(Provider::OpenAI),
            "ollama" => Ok(Provider::Ollama),
            other => anyhow::bail!("Unsupported LLM provider: {other}"),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Provider::OpenAI => "OpenAI",
            Provider::Ollama => "Ollama",
        }
    }
}

/// The two models a [`repochat_core::pipeline::Pipeline`] needs.
pub struct ChatModels {
    pub term: Arc<dyn ChatModel>,
    pub answer: Arc<dyn ChatModel>,
}

/// Build the term-extraction and answer clients from `[llm]`.
///
/// Both share one connection pool. `terms_model` overrides the model name
/// for term extraction only.
pub fn create_models(config: &LlmConfig) -> Result<ChatModels> {
    let provider = Provider::parse(&config.provider)?;
    let api_key = match provider {
        Provider::OpenAI => Some(
            std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?,
        ),
        Provider::Ollama => None,
    };
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let base_url = config.base_url();
    let answer = HttpChatModel {
        client: client.clone(),
        provider,
        base_url: base_url.clone(),
        model: config.model.clone(),
        api_key: api_key.clone(),
    };
    let term = HttpChatModel {
        client,
        provider,
        base_url,
        model: config.terms_model.clone().unwrap_or_else(|| config.model.clone()),
        api_key,
    };

    tracing::info!(
        provider = provider.label(),
        model = %answer.model,
        terms_model = %term.model,
        "chat models ready"
    );

    Ok(ChatModels {
        term: Arc::new(term),
        answer: Arc::new(answer),
    })
}

/// An OpenAI-compatible or Ollama chat endpoint.
pub struct HttpChatModel {
    client: reqwest::Client,
    provider: Provider,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

impl HttpChatModel {
    pub fn new(
        provider: Provider,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        match self.provider {
            Provider::OpenAI => format!("{}/chat/completions", self.base_url),
            Provider::Ollama => format!("{}/api/chat", self.base_url),
        }
    }

    async fn send(&self, messages: &[Message], stream: bool) -> Result<reqwest::Response> {
        let label = self.provider.label();
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream,
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("Failed to connect to {label} at {}", self.base_url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{label} chat API returned {status}: {body}");
        }
        Ok(resp)
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let resp = self.send(messages, false).await?;
        let json: serde_json::Value = resp.json().await?;
        match self.provider {
            Provider::OpenAI => parse_openai_completion(&json),
            Provider::Ollama => parse_ollama_completion(&json),
        }
    }

    async fn stream(&self, messages: &[Message]) -> Result<TextStream> {
        let resp = self.send(messages, true).await?;
        let provider = self.provider;

        let deltas = stream_lines(resp.bytes_stream()).filter_map(move |line_result| async move {
            match line_result {
                Ok(line) => match provider {
                    Provider::OpenAI => parse_openai_line(&line),
                    Provider::Ollama => parse_ollama_line(&line),
                },
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Box::pin(deltas))
    }
}

// ─── Blocking responses ─────────────────────────────────

fn parse_openai_completion(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

fn parse_ollama_completion(json: &serde_json::Value) -> Result<String> {
    json.pointer("/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))
}

// ─── Streaming lines ────────────────────────────────────

#[derive(Deserialize)]
struct OllamaStreamChunk {
    message: Option<OllamaStreamMessage>,
}

#[derive(Deserialize)]
struct OllamaStreamMessage {
    #[serde(default)]
    content: String,
}

/// Parse one Ollama NDJSON line. `None` means skip.
fn parse_ollama_line(line: &str) -> Option<Result<String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<OllamaStreamChunk>(line) {
        Ok(chunk) => {
            let content = chunk.message.map(|m| m.content).unwrap_or_default();
            if content.is_empty() {
                return None;
            }
            Some(Ok(content))
        }
        Err(e) => Some(Err(anyhow::anyhow!("Failed to parse Ollama chunk: {e}"))),
    }
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

/// Parse one OpenAI SSE line. `None` means skip (blank lines, non-data
/// fields, `[DONE]`, role-only deltas).
fn parse_openai_line(line: &str) -> Option<Result<String>> {
    let line = line.trim();
    let data = line.strip_prefix("data:")?.trim();

    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(chunk) => {
            let content = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .unwrap_or_default();
            if content.is_empty() {
                return None;
            }
            Some(Ok(content))
        }
        Err(e) => Some(Err(anyhow::anyhow!("Failed to parse OpenAI chunk: {e}"))),
    }
}

/// Split a byte stream into non-blank lines.
///
/// Bytes are buffered until a newline arrives, so multi-byte characters
/// split across network reads decode intact.
fn stream_lines<S, E>(byte_stream: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display,
{
    stream::unfold(
        (Box::pin(byte_stream), Vec::<u8>::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                if let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let rest = buffer.split_off(pos + 1);
                    let line = String::from_utf8_lossy(&buffer[..pos]).into_owned();
                    buffer = rest;
                    if !line.trim().is_empty() {
                        return Some((Ok(line), (stream, buffer)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        return Some((
                            Err(anyhow::anyhow!("Stream read error: {e}")),
                            (stream, buffer),
                        ));
                    }
                    None => {
                        if buffer.iter().all(u8::is_ascii_whitespace) {
                            return None;
                        }
                        let line = String::from_utf8_lossy(&buffer).into_owned();
                        buffer.clear();
                        return Some((Ok(line), (stream, buffer)));
                    }
                }
            }
        },
    )
}
