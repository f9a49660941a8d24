//! Two-stage chat pipeline: retrieve, then generate.
//!
//! A [`Pipeline`] is built once with its stores and models and shared
//! across requests. Each call to [`Pipeline::run`] owns a fresh
//! [`ConversationState`] and walks it through
//! `Retrieving → Generating → Done`, yielding a [`PipelineEvent`] at every
//! step. Retrieving reports the extracted search terms as a
//! [`ModelRole::Retriever`] token before the search results. The run is a
//! pull-based stream: nothing happens until it is polled, and dropping it
//! drops any in-flight model stream.

use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::chat_model::{ChatModel, ModelRole, TextStream};
use crate::context::load_full_text;
use crate::error::ChatError;
use crate::generate::{generate, generate_stream};
use crate::models::{ConversationState, RetrievedChunk};
use crate::prompt::{DEFAULT_ANSWER_TEMPLATE, DEFAULT_TERMS_TEMPLATE};
use crate::retrieve::{retrieve, DEFAULT_TOP_K_PER_TERM};
use crate::store::{FullTextStore, VectorIndex};
use crate::terms::{build_search_terms, extract_terms};

/// Keywords searched on every turn in addition to the extracted terms.
pub const DEFAULT_KEYWORDS: [&str; 4] = ["ScaleDPSession", "DataToImage", "show_image", "show_text"];

/// What to do when the term-extraction model call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermErrorPolicy {
    /// Log a warning and search with keywords and the question only.
    #[default]
    Fallback,
    /// Fail the turn.
    Abort,
}

/// Tunables for a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub keywords: Vec<String>,
    pub top_k_per_term: usize,
    pub on_term_error: TermErrorPolicy,
    pub terms_template: String,
    pub answer_template: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            top_k_per_term: DEFAULT_TOP_K_PER_TERM,
            on_term_error: TermErrorPolicy::default(),
            terms_template: DEFAULT_TERMS_TEMPLATE.to_string(),
            answer_template: DEFAULT_ANSWER_TEMPLATE.to_string(),
        }
    }
}

/// One step of a pipeline run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Retrieval finished; `context` is in retrieval order.
    Retrieved { context: Vec<RetrievedChunk> },
    /// A text fragment produced by a model. Retriever tokens carry the
    /// extracted search terms, comma-separated.
    Token { origin: ModelRole, text: String },
    /// The run finished; `state.answer` is set.
    Done { state: ConversationState },
}

/// A single pipeline run. Finite and not restartable.
pub type PipelineRun = Pin<Box<dyn Stream<Item = Result<PipelineEvent, ChatError>> + Send>>;

enum Stage {
    Retrieving(ConversationState),
    Searching {
        state: ConversationState,
        extracted: Vec<String>,
    },
    Generating(ConversationState),
    Streaming {
        state: ConversationState,
        tokens: TextStream,
        answer: String,
    },
    Finished,
}

/// Retrieval-augmented chat over a vector index and a full-text store.
#[derive(Clone)]
pub struct Pipeline {
    index: Arc<dyn VectorIndex>,
    full_text: Arc<dyn FullTextStore>,
    term_model: Arc<dyn ChatModel>,
    answer_model: Arc<dyn ChatModel>,
    options: Arc<PipelineOptions>,
}

impl Pipeline {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        full_text: Arc<dyn FullTextStore>,
        term_model: Arc<dyn ChatModel>,
        answer_model: Arc<dyn ChatModel>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            index,
            full_text,
            term_model,
            answer_model,
            options: Arc::new(options),
        }
    }

    /// Derive search terms for `question` and run the retriever.
    pub async fn retrieve_context(&self, question: &str) -> Result<Vec<RetrievedChunk>, ChatError> {
        let extracted = self.extracted_terms(question).await?;
        self.search(question, &extracted).await
    }

    /// Ask the term model for names in `question`, applying the failure policy.
    async fn extracted_terms(&self, question: &str) -> Result<Vec<String>, ChatError> {
        let opts = &self.options;
        match extract_terms(self.term_model.as_ref(), &opts.terms_template, question).await {
            Ok(terms) => Ok(terms),
            Err(e) => match opts.on_term_error {
                TermErrorPolicy::Fallback => {
                    tracing::warn!(error = %e, "term extraction failed, searching with keywords and question only");
                    Ok(Vec::new())
                }
                TermErrorPolicy::Abort => Err(e),
            },
        }
    }

    async fn search(
        &self,
        question: &str,
        extracted: &[String],
    ) -> Result<Vec<RetrievedChunk>, ChatError> {
        let opts = &self.options;
        let terms = build_search_terms(&opts.keywords, extracted, question);
        let context = retrieve(self.index.as_ref(), &terms, opts.top_k_per_term).await?;
        tracing::info!(
            terms = terms.len(),
            extracted = extracted.len(),
            chunks = context.len(),
            "retrieval finished"
        );
        Ok(context)
    }

    /// Run one turn as a stream of events.
    pub fn run(&self, state: ConversationState) -> PipelineRun {
        let pipeline = self.clone();
        Box::pin(stream::unfold(Stage::Retrieving(state), move |stage| {
            let pipeline = pipeline.clone();
            async move { pipeline.step(stage).await }
        }))
    }

    /// Run one turn without streaming and return the finished state.
    pub async fn invoke(&self, mut state: ConversationState) -> Result<ConversationState, ChatError> {
        let question = question_of(&state)?;
        state.context = self.retrieve_context(&question).await?;

        let context = load_full_text(self.full_text.as_ref(), &state.context).await?;
        let answer = generate(
            self.answer_model.as_ref(),
            &self.options.answer_template,
            &state.messages,
            &question,
            &context,
        )
        .await?;
        state.answer = Some(answer.content);
        Ok(state)
    }

    async fn step(&self, mut stage: Stage) -> Option<(Result<PipelineEvent, ChatError>, Stage)> {
        loop {
            match stage {
                Stage::Retrieving(state) => {
                    let result = match question_of(&state) {
                        Ok(question) => self.extracted_terms(&question).await,
                        Err(e) => Err(e),
                    };
                    match result {
                        Ok(extracted) if extracted.is_empty() => {
                            stage = Stage::Searching { state, extracted };
                        }
                        Ok(extracted) => {
                            let event = PipelineEvent::Token {
                                origin: ModelRole::Retriever,
                                text: extracted.join(", "),
                            };
                            return Some((Ok(event), Stage::Searching { state, extracted }));
                        }
                        Err(e) => return Some((Err(e), Stage::Finished)),
                    }
                }
                Stage::Searching {
                    mut state,
                    extracted,
                } => {
                    let result = match question_of(&state) {
                        Ok(question) => self.search(&question, &extracted).await,
                        Err(e) => Err(e),
                    };
                    return Some(match result {
                        Ok(context) => {
                            state.context = context.clone();
                            (Ok(PipelineEvent::Retrieved { context }), Stage::Generating(state))
                        }
                        Err(e) => (Err(e), Stage::Finished),
                    });
                }
                Stage::Generating(state) => {
                    let tokens = match self.start_answer(&state).await {
                        Ok(tokens) => tokens,
                        Err(e) => return Some((Err(e), Stage::Finished)),
                    };
                    stage = Stage::Streaming {
                        state,
                        tokens,
                        answer: String::new(),
                    };
                }
                Stage::Streaming {
                    mut state,
                    mut tokens,
                    mut answer,
                } => match tokens.next().await {
                    Some(Ok(text)) if text.is_empty() => {
                        stage = Stage::Streaming {
                            state,
                            tokens,
                            answer,
                        };
                    }
                    Some(Ok(text)) => {
                        answer.push_str(&text);
                        let event = PipelineEvent::Token {
                            origin: ModelRole::Generator,
                            text,
                        };
                        return Some((
                            Ok(event),
                            Stage::Streaming {
                                state,
                                tokens,
                                answer,
                            },
                        ));
                    }
                    Some(Err(e)) => {
                        return Some((Err(ChatError::external("answer model", e)), Stage::Finished));
                    }
                    None => {
                        tracing::debug!(chars = answer.len(), "answer complete");
                        state.answer = Some(answer);
                        return Some((Ok(PipelineEvent::Done { state }), Stage::Finished));
                    }
                },
                Stage::Finished => return None,
            }
        }
    }

    async fn start_answer(&self, state: &ConversationState) -> Result<TextStream, ChatError> {
        let question = question_of(state)?;
        let context = load_full_text(self.full_text.as_ref(), &state.context).await?;
        generate_stream(
            self.answer_model.as_ref(),
            &self.options.answer_template,
            &state.messages,
            &question,
            &context,
        )
        .await
    }
}

fn question_of(state: &ConversationState) -> Result<String, ChatError> {
    state
        .question()
        .map(str::to_string)
        .ok_or_else(|| ChatError::Validation("conversation has no messages".into()))
}
