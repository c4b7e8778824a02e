//! Transcript Adapter (boundary): converts persisted `Message` records into
//! the in-memory entries higher layers consume, and records tool-call
//! start/finish against the store so those entries can carry a Step-Outcome.
//!
//! A tool call's record is carried as the JSON content of its own
//! `Message` — consistent with `Message`'s existing invariant that content
//! is JSON-encoded whenever `kind == Control` — so no separate storage
//! concept is needed beyond the store's existing message/payload contract.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use sa_domain::error::Result;
use sa_domain::model::{Message, MessageStatus, MessageType, Role};
use sa_store::{ConversationStore, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Started,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub message_id: String,
    pub tool_name: String,
    pub status: ToolCallStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_payload_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_payload_id: Option<String>,
}

/// Per-tool-call outcome surfaced on its transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub id: String,
    pub tool_name: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub elapsed_ms: Option<i64>,
    pub request_payload_id: Option<String>,
    pub response_payload_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub conversation_id: String,
    pub parent_message_id: Option<String>,
    pub role: Role,
    pub kind: MessageType,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_outcome: Option<StepOutcome>,
}

/// Records at-least-once start/finish tool-call events against the store,
/// each linked to a synthesized tool `Message` in the transcript.
#[async_trait::async_trait]
pub trait ToolCallRecorder: Send + Sync {
    async fn start(&self, conversation_id: &str, turn_id: &str, tool_name: &str, request: &Value) -> Result<ToolCallRecord>;
    async fn finish(&self, record: ToolCallRecord, response: &Value, success: bool) -> Result<()>;
}

pub struct StoreToolCallRecorder {
    store: Arc<dyn ConversationStore>,
}

impl StoreToolCallRecorder {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl ToolCallRecorder for StoreToolCallRecorder {
    async fn start(&self, conversation_id: &str, turn_id: &str, tool_name: &str, request: &Value) -> Result<ToolCallRecord> {
        let message_id = Uuid::new_v4().to_string();
        let request_payload_id = Some(self.store.patch_payload(Payload {
            id: Uuid::new_v4().to_string(),
            message_id: message_id.clone(),
            data: request.clone(),
        })?);

        let record = ToolCallRecord {
            id: Uuid::new_v4().to_string(),
            message_id: message_id.clone(),
            tool_name: tool_name.to_string(),
            status: ToolCallStatus::Started,
            started_at: Utc::now(),
            ended_at: None,
            request_payload_id,
            response_payload_id: None,
        };

        let now = Utc::now();
        let message = Message {
            id: message_id,
            conversation_id: conversation_id.to_string(),
            turn_id: Some(turn_id.to_string()),
            parent_message_id: None,
            role: Role::Tool,
            kind: MessageType::Control,
            content: serde_json::to_string(&record)?,
            elicitation_id: None,
            payload_id: record.request_payload_id.clone(),
            status: MessageStatus::None,
            tool_name: Some(tool_name.to_string()),
            created_at: now,
            updated_at: now,
        };
        self.store.patch_message(message)?;

        Ok(record)
    }

    async fn finish(&self, mut record: ToolCallRecord, response: &Value, success: bool) -> Result<()> {
        let response_payload_id = Some(self.store.patch_payload(Payload {
            id: Uuid::new_v4().to_string(),
            message_id: record.message_id.clone(),
            data: response.clone(),
        })?);

        record.status = if success { ToolCallStatus::Completed } else { ToolCallStatus::Failed };
        record.ended_at = Some(Utc::now());
        record.response_payload_id = response_payload_id;

        let mut message = self.store.get_message(&record.message_id)?;
        message.content = serde_json::to_string(&record)?;
        message.payload_id = record.response_payload_id.clone().or(record.request_payload_id.clone());
        message.updated_at = Utc::now();
        self.store.patch_message(message)?;

        Ok(())
    }
}

/// Interim messages — pending prompts not yet resolved one way or another —
/// are dropped; everything else becomes a transcript entry, with tool-call
/// messages carrying a `StepOutcome` when their content decodes as one.
pub fn to_transcript(messages: Vec<Message>) -> Vec<TranscriptEntry> {
    messages
        .into_iter()
        .filter(|m| m.status != MessageStatus::Pending)
        .map(|m| {
            let step_outcome = tool_call_record_from(&m).map(|record| StepOutcome {
                id: record.id,
                tool_name: record.tool_name,
                success: record.status == ToolCallStatus::Completed,
                started_at: record.started_at,
                ended_at: record.ended_at,
                elapsed_ms: record.ended_at.map(|end| (end - record.started_at).num_milliseconds()),
                request_payload_id: record.request_payload_id,
                response_payload_id: record.response_payload_id,
            });

            TranscriptEntry {
                id: m.id,
                conversation_id: m.conversation_id,
                parent_message_id: m.parent_message_id,
                role: m.role,
                kind: m.kind,
                content: m.content,
                created_at: m.created_at,
                step_outcome,
            }
        })
        .collect()
}

fn tool_call_record_from(message: &Message) -> Option<ToolCallRecord> {
    if message.role != Role::Tool || message.kind != MessageType::Control {
        return None;
    }
    serde_json::from_str(&message.content).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_store::JsonConversationStore;

    fn store() -> (Arc<dyn ConversationStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ConversationStore> = Arc::new(JsonConversationStore::open(dir.path()).unwrap());
        (store, dir)
    }

    fn plain_message(conversation_id: &str, status: MessageStatus) -> Message {
        let now = Utc::now();
        Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            turn_id: None,
            parent_message_id: None,
            role: Role::User,
            kind: MessageType::Text,
            content: "hello".into(),
            elicitation_id: None,
            payload_id: None,
            status,
            tool_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn interim_pending_messages_are_dropped() {
        let settled = plain_message("conv-1", MessageStatus::None);
        let pending = plain_message("conv-1", MessageStatus::Pending);
        let entries = to_transcript(vec![settled.clone(), pending]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, settled.id);
    }

    #[test]
    fn tool_message_without_a_record_has_no_step_outcome() {
        let mut message = plain_message("conv-1", MessageStatus::None);
        message.role = Role::Tool;
        message.kind = MessageType::Control;
        message.content = "not json".into();
        let entries = to_transcript(vec![message]);
        assert!(entries[0].step_outcome.is_none());
    }

    #[tokio::test]
    async fn recorder_round_trip_produces_a_completed_step_outcome() {
        let (store, _dir) = store();
        let recorder = StoreToolCallRecorder::new(store.clone());

        let request = serde_json::json!({ "expression": "1+1" });
        let record = recorder.start("conv-1", "turn-1", "calc", &request).await.unwrap();
        let response = serde_json::json!({ "result": "2" });
        recorder.finish(record.clone(), &response, true).await.unwrap();

        let message = store.get_message(&record.message_id).unwrap();
        let entries = to_transcript(vec![message]);
        let outcome = entries[0].step_outcome.as_ref().expect("expected a step outcome");
        assert!(outcome.success);
        assert_eq!(outcome.tool_name, "calc");
        assert!(outcome.ended_at.is_some());
    }

    #[tokio::test]
    async fn recorder_round_trip_marks_failure() {
        let (store, _dir) = store();
        let recorder = StoreToolCallRecorder::new(store.clone());

        let request = serde_json::json!({ "text": "x" });
        let record = recorder.start("conv-1", "turn-1", "echo", &request).await.unwrap();
        recorder.finish(record.clone(), &Value::Null, false).await.unwrap();

        let message = store.get_message(&record.message_id).unwrap();
        let entries = to_transcript(vec![message]);
        let outcome = entries[0].step_outcome.as_ref().unwrap();
        assert!(!outcome.success);
    }
}
