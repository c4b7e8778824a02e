use crate::schema::RequestedSchema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

// ── Conversation / Turn ─────────────────────────────────────────────

/// A conversation node. Conversations form a strict tree via `parent_id`;
/// the root is the unique ancestor with no parent. A conversation's
/// lifetime exceeds any single plan execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_turn_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn root() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            last_turn_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn child_of(parent: &Conversation) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: Some(parent.id.clone()),
            last_turn_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A single user→assistant exchange within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub conversation_id: String,
    pub turn_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
}

impl Turn {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            turn_id: Uuid::new_v4().to_string(),
            parent_message_id: None,
        }
    }
}

// ── Message ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Control,
}

/// Message lifecycle / resolution status. The empty string is a valid
/// value (ordinary messages carry no status at all) and is preserved
/// verbatim rather than folded into an `Option`, matching the persisted
/// form the store round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[serde(rename = "")]
    None,
    Pending,
    Accepted,
    Rejected,
    Cancel,
    Summary,
    Summarized,
}

impl Default for MessageStatus {
    fn default() -> Self {
        MessageStatus::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    pub role: Role,
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Usually plain text; JSON-encoded when `kind == Control`.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elicitation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_id: Option<String>,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// A control message carrying a pending Elicitation, per the
    /// invariant: role=assistant, type=text for user-directed prompts,
    /// role=tool, type=control for tool-initiated ones.
    pub fn elicitation_prompt(
        conversation_id: impl Into<String>,
        elicitation_id: impl Into<String>,
        content: impl Into<String>,
        from_tool: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            turn_id: None,
            parent_message_id: None,
            role: if from_tool { Role::Tool } else { Role::Assistant },
            kind: if from_tool {
                MessageType::Control
            } else {
                MessageType::Text
            },
            content: content.into(),
            elicitation_id: Some(elicitation_id.into()),
            payload_id: None,
            status: MessageStatus::Pending,
            tool_name: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ── Elicitation ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElicitationState {
    Pending,
    Accepted,
    Rejected,
    Cancel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Elicitation {
    pub id: String,
    /// Free-text human-readable prompt.
    pub message: String,
    pub requested_schema: RequestedSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub state: ElicitationState,
    pub created_at: DateTime<Utc>,
}

impl Elicitation {
    pub fn new(message: impl Into<String>, requested_schema: RequestedSchema) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message: message.into(),
            requested_schema,
            callback_url: None,
            state: ElicitationState::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, ElicitationState::Pending)
    }
}

/// Action a resolver took on an Elicitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Accept,
    Decline,
    Cancel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitResult {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ── Plan / Step ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Tool,
    Elicitation,
    ClarifyIntent,
    Abort,
    Noop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepType,
    /// Tool name when `kind == Tool`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub args: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<Elicitation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_budget: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

impl Step {
    pub fn tool(name: impl Into<String>, args: HashMap<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: StepType::Tool,
            name: name.into(),
            args,
            reason: None,
            content: None,
            elicitation: None,
            retry_budget: None,
            response_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intention: Option<String>,
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<Elicitation>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            intention: None,
            steps,
            elicitation: None,
        }
    }
}

/// The record of a tool invocation's outcome within a plan run. Renamed
/// from the bare "Result" the data model names it, to avoid clashing
/// with `std::result::Result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub id: String,
    pub name: String,
    pub args: HashMap<String, Value>,
    /// The tool's textual output.
    #[serde(default)]
    pub result: String,
    /// Empty on success.
    #[serde(default)]
    pub error: String,
    /// Whether this result has been fed back to the LLM.
    #[serde(default)]
    pub seen: bool,
}

impl StepResult {
    pub fn ok(id: impl Into<String>, name: impl Into<String>, args: HashMap<String, Value>, result: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
            result: result.into(),
            error: String::new(),
            seen: false,
        }
    }

    pub fn failed(id: impl Into<String>, name: impl Into<String>, args: HashMap<String, Value>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
            result: String::new(),
            error: error.into(),
            seen: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}

// ── Execution trace ─────────────────────────────────────────────────

/// Per-step execution record, written skeleton-first (before execution
/// starts) and updated once it completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub plan_id: String,
    pub step_index: usize,
    pub request: Value,
    #[serde(default)]
    pub response: Value,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionTrace {
    pub fn started(plan_id: impl Into<String>, step_index: usize, request: Value) -> Self {
        Self {
            plan_id: plan_id.into(),
            step_index,
            request,
            response: Value::Null,
            started_at: Utc::now(),
            ended_at: None,
            success: false,
            error: None,
        }
    }

    pub fn finish(&mut self, response: Value, success: bool, error: Option<String>) {
        self.response = response;
        self.ended_at = Some(Utc::now());
        self.success = success;
        self.error = error;
    }
}

// ── Duplicate guard state ───────────────────────────────────────────

/// Tracks recent tool invocations within a single plan run so the
/// executor can short-circuit pathological repeat/alternation loops.
#[derive(Debug, Clone, Default)]
pub struct DuplicateGuardState {
    pub last_key: Option<String>,
    pub consecutive_count: usize,
    pub window: VecDeque<String>,
    pub results_by_key: HashMap<String, StepResult>,
}

impl DuplicateGuardState {
    pub fn new() -> Self {
        Self::default()
    }
}
