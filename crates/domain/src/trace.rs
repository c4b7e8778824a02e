use serde::Serialize;

/// Structured trace events emitted across the coordination core.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ElicitationRecorded {
        conversation_id: String,
        elicitation_id: String,
        root_conversation_id: String,
    },
    ElicitationDuplicated {
        root_conversation_id: String,
        source_conversation_id: String,
        elicitation_id: String,
    },
    ElicitationResolved {
        elicitation_id: String,
        action: String,
        wait_ms: u64,
    },
    ElicitationWaitTimedOut {
        elicitation_id: String,
        waited_ms: u64,
    },
    RouterDelivered {
        conversation_id: String,
        elicitation_id: String,
    },
    RouterStale {
        conversation_id: String,
        elicitation_id: String,
    },
    SchemaRefined {
        schema_kind: String,
        fields_annotated: usize,
        preset_matched: Option<String>,
    },
    PlanStepStarted {
        plan_id: String,
        step_index: usize,
        tool: String,
    },
    PlanStepFinished {
        plan_id: String,
        step_index: usize,
        tool: String,
        duration_ms: u64,
        deduped: bool,
    },
    DuplicateGuardBlocked {
        plan_id: String,
        step_index: usize,
        tool: String,
        reason: String,
    },
    ConfigValidated {
        errors: usize,
        warnings: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sa_event");
    }
}
