//! One chat turn from the terminal.
//!
//! `repochat ask "<question>"` runs the same pipeline as `POST /chat` and
//! prints the extracted search terms and the sources, then streams the
//! answer to stdout as it arrives.

use std::io::Write;

use anyhow::Result;
use futures::StreamExt;

use repochat_core::chat_model::ModelRole;
use repochat_core::events::MAX_CITATIONS;
use repochat_core::models::{ConversationState, Message};
use repochat_core::pipeline::{Pipeline, PipelineEvent};

use crate::config::Config;
use crate::pipeline::open_pipeline;

pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let (pipeline, pool) = open_pipeline(config).await?;
    let mut out = std::io::stdout();
    let result = ask(&pipeline, question, &mut out).await;
    pool.close().await;
    result
}

/// Run one turn and write sources and answer to `out`.
pub async fn ask(pipeline: &Pipeline, question: &str, out: &mut impl Write) -> Result<()> {
    let state = ConversationState::new(vec![Message::user(question)]);
    let mut run = pipeline.run(state);

    while let Some(event) = run.next().await {
        match event? {
            PipelineEvent::Retrieved { context } => {
                if context.is_empty() {
                    writeln!(out, "No sources found.")?;
                } else {
                    writeln!(out, "Sources:")?;
                    for (i, chunk) in context.iter().take(MAX_CITATIONS).enumerate() {
                        writeln!(out, "  {}. {}", i + 1, chunk.source)?;
                    }
                }
                writeln!(out)?;
            }
            PipelineEvent::Token {
                origin: ModelRole::Retriever,
                text,
            } => writeln!(out, "Search terms: {}", text)?,
            PipelineEvent::Token {
                origin: ModelRole::Generator,
                text,
            } => {
                write!(out, "{}", text)?;
                out.flush()?;
            }
            PipelineEvent::Done { .. } => writeln!(out)?,
        }
    }

    Ok(())
}
