//! Tool registry for the coordination core.
//!
//! A minimal in-memory registry pre-populated with reference tools:
//! `calc` (pure/idempotent), `echo`, and `fail_once` (test-only).

pub mod builtin;
pub mod registry;

pub use registry::{ExecuteFuture, InMemoryToolRegistry, Tool, ToolDefinition, ToolRegistry};
pub use sa_domain::config::ToolPolicy;
