//! Conversation memory
//!
//! Bounded, per-session turn logs shared by every request, plus eviction of
//! idle sessions so the session map cannot grow without limit.

pub mod manager;
pub mod store;

pub use manager::ConversationMemory;
pub use store::{ConversationHistory, MAX_MEMORY_TURNS};
