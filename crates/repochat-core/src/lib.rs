//! # repochat core
//!
//! Runtime-agnostic logic for repochat: the conversation model, store and
//! model traits, term extraction, retrieval, context loading, answer
//! generation, the pipeline that sequences them, and the wire encoding of
//! its events.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. Concrete
//! stores and model clients live in the `repochat` app crate.

pub mod chat_model;
pub mod context;
pub mod embedding;
pub mod error;
pub mod events;
pub mod generate;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod retrieve;
pub mod store;
pub mod terms;
