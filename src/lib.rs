//! Financial Ask Router
//!
//! Answers natural-language finance questions by either:
//! - chatting directly with a language model, or
//! - calling one market-data tool per ticker symbol and asking the model
//!   to explain the results
//!
//! Deterministic keyword rules decide the route first; the model is only
//! consulted when no rule matches. Each session keeps a short rolling
//! memory of recent turns.
//!
//! REQUEST FLOW:
//! EXTRACT SYMBOLS → CLASSIFY → DISPATCH (retry) → COMPOSE → REMEMBER

pub mod agent;
pub mod api;
pub mod classifier;
pub mod composer;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod memory;
pub mod models;
pub mod symbols;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AskError, Result};

// Re-export common types
pub use models::*;
pub use agent::AskService;
