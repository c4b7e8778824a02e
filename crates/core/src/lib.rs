//! Coordination core: the in-process services that sit between the
//! gateway's HTTP surface and the conversation store / tool registry /
//! LLM provider collaborators.

pub mod adapter;
pub mod cancel;
pub mod elicitation;
pub mod guard;
pub mod plan;
pub mod refiner;
pub mod router;

pub use adapter::{to_transcript, StepOutcome, StoreToolCallRecorder, ToolCallRecord, ToolCallRecorder, ToolCallStatus, TranscriptEntry};
pub use cancel::{CancelMap, CancelToken};
pub use elicitation::{normalize_action, ElicitationService, HelperAwaiter};
pub use guard::GuardDecision;
pub use plan::{dedup_results, extract_json, parse_plan_from_text, resolve_placeholders, run_plan, PlanRunOutcome};
pub use refiner::Refiner;
pub use router::ElicitationRouter;
