//! HTTP/JSON-RPC boundary: wires the coordination core's services
//! (conversation store, tool registry, LLM provider, elicitation
//! service) onto an axum router and a small CLI.

pub mod api;
pub mod cli;
pub mod state;
