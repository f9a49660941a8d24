//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use futures::stream;
use tempfile::TempDir;

use repochat::config::{parse_config, Config};
use repochat_core::chat_model::{ChatModel, TextStream};
use repochat_core::embedding::Embedder;
use repochat_core::models::Message;

/// Embeds text as lowercase letter counts over `a..=z`.
pub struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letters"
    }
    fn dims(&self) -> usize {
        26
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 26];
                for b in t.to_ascii_lowercase().bytes() {
                    if b.is_ascii_lowercase() {
                        v[(b - b'a') as usize] += 1.0;
                    }
                }
                v
            })
            .collect())
    }
}

/// Chat model with a fixed blocking reply and fixed streamed pieces.
pub struct ScriptedModel {
    reply: Option<String>,
    pieces: Vec<String>,
    pub calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            pieces: Vec::new(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            pieces: Vec::new(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn streaming(pieces: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(pieces.concat()),
            pieces: pieces.iter().map(|p| p.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.reply
            .clone()
            .ok_or_else(|| anyhow::anyhow!("model unavailable"))
    }

    async fn stream(&self, messages: &[Message]) -> Result<TextStream> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if self.reply.is_none() {
            anyhow::bail!("model unavailable");
        }
        let items: Vec<Result<String>> = self.pieces.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

/// A config whose database lives in `tmp`.
pub fn test_config(tmp: &TempDir) -> Config {
    let toml = format!(
        r#"
[db]
path = "{}/data/repochat.sqlite"

[server]
bind = "127.0.0.1:0"

[retrieval]
keywords = ["ScaleDPSession"]
top_k_per_term = 3
"#,
        tmp.path().display()
    );
    parse_config(&toml).unwrap()
}
