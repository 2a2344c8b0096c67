//! Parrita core — the domain library behind the lead-qualification chatbot.
//!
//! Everything request-independent lives here: the discovery-call knowledge
//! base and its CSV import pipeline, conversation/message storage, the
//! keyword context extractor, prompt enrichment, per-session rate limiting,
//! the LLM gateway client, and the qualification/webhook side channel.
//! The HTTP surface is in the `parrita-web` crate.

pub mod config;
pub mod context;
pub mod enrich;
pub mod error;
pub mod import;
pub mod llm;
pub mod model;
pub mod prompt;
pub mod qualify;
pub mod rate_limit;
pub mod storage;
pub mod webhook;

pub use error::{ParritaError, Result};
