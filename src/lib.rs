//! # repochat
//!
//! Retrieval-augmented chat over a source-code repository that has been
//! ingested into SQLite.
//!
//! ## Architecture
//!
//! ```text
//! POST /chat ──▶ Term extractor ──▶ Retriever ──▶ Context loader ──▶ Answer model
//!                   (LLM)          (vector index)   (document_file)      (LLM, streamed)
//!                                        │                                   │
//!                                        ▼                                   ▼
//!                                   h: citations ─────────────────────▶ 0: text deltas
//! ```
//!
//! The algorithms live in [`repochat_core`]; this crate supplies the
//! SQLite stores, HTTP model clients, configuration, server, and CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite vector index and full-text store |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Chat-completion clients |
//! | [`pipeline`] | Pipeline assembly from config |
//! | [`schema`] | Inbound request types |
//! | [`server`] | Chat HTTP server |
//! | [`ask`] | Terminal chat turn |
//! | [`get`] | Full-text record lookup |

pub mod ask;
pub mod config;
pub mod db;
pub mod embedding;
pub mod get;
pub mod llm;
pub mod migrate;
pub mod pipeline;
pub mod schema;
pub mod server;
pub mod sqlite_store;
