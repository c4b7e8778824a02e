//! Conversation store for the coordination core.
//!
//! A JSON-file-backed implementation of the conversation-store
//! collaborator contract: conversations, turns, messages, and payloads,
//! plus an append-only per-conversation transcript used as an audit
//! trail.

pub mod store;
pub mod transcript;

pub use store::{ConversationStore, JsonConversationStore, Payload};
pub use transcript::{TranscriptLine, TranscriptWriter};
