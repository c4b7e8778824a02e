//! Conversation store.
//!
//! Persists conversation/turn metadata in `conversations.json` and
//! messages/payloads in their own index files under the configured data
//! directory, all guarded by a single in-memory `RwLock` and flushed to
//! disk on every mutation — the same shape as the teacher's session
//! store, generalized from sessions to conversations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use sa_domain::error::{Error, Result};
use sa_domain::model::{Conversation, Message, Turn};

/// A persisted payload blob, linked to a message via `message_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub id: String,
    pub message_id: String,
    pub data: serde_json::Value,
}

/// Collaborator contract the coordination core depends on — never the
/// concrete file format.
pub trait ConversationStore: Send + Sync {
    fn get_conversation(&self, id: &str) -> Result<Conversation>;
    fn patch_conversations(&self, updates: Vec<Conversation>) -> Result<()>;
    fn get_turn(&self, conversation_id: &str, turn_id: &str) -> Result<Turn>;
    fn patch_turn(&self, turn: Turn) -> Result<()>;
    fn get_message(&self, id: &str) -> Result<Message>;
    fn get_message_by_elicitation(&self, conversation_id: &str, elicitation_id: &str) -> Result<Message>;
    fn patch_message(&self, message: Message) -> Result<()>;
    fn patch_payload(&self, payload: Payload) -> Result<String>;
    fn delete_message(&self, conversation_id: &str, message_id: &str) -> Result<()>;
    fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConversationIndex {
    conversations: HashMap<String, Conversation>,
    turns: HashMap<String, Turn>,
}

/// JSON-file-backed `ConversationStore`.
pub struct JsonConversationStore {
    data_dir: PathBuf,
    index: RwLock<ConversationIndex>,
    messages: RwLock<HashMap<String, Message>>,
    payloads: RwLock<HashMap<String, Payload>>,
    /// elicitation_id -> message_id, rebuilt on load and kept live on patch.
    by_elicitation: RwLock<HashMap<String, String>>,
}

fn turn_key(conversation_id: &str, turn_id: &str) -> String {
    format!("{conversation_id}:{turn_id}")
}

impl JsonConversationStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        std::fs::create_dir_all(data_dir.join("transcripts"))?;

        let index = load_json(&data_dir.join("conversations.json")).unwrap_or_default();
        let messages: HashMap<String, Message> =
            load_json(&data_dir.join("messages.json")).unwrap_or_default();
        let payloads: HashMap<String, Payload> =
            load_json(&data_dir.join("payloads.json")).unwrap_or_default();

        let mut by_elicitation = HashMap::new();
        for msg in messages.values() {
            if let Some(elic) = &msg.elicitation_id {
                by_elicitation.insert(elic.clone(), msg.id.clone());
            }
        }

        tracing::info!(
            conversations = index.conversations.len(),
            messages = messages.len(),
            path = %data_dir.display(),
            "conversation store loaded"
        );

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            index: RwLock::new(index),
            messages: RwLock::new(messages),
            payloads: RwLock::new(payloads),
            by_elicitation: RwLock::new(by_elicitation),
        })
    }

    fn flush_index(&self) -> Result<()> {
        write_json(&self.data_dir.join("conversations.json"), &*self.index.read())
    }

    fn flush_messages(&self) -> Result<()> {
        write_json(&self.data_dir.join("messages.json"), &*self.messages.read())
    }

    fn flush_payloads(&self) -> Result<()> {
        write_json(&self.data_dir.join("payloads.json"), &*self.payloads.read())
    }
}

impl ConversationStore for JsonConversationStore {
    fn get_conversation(&self, id: &str) -> Result<Conversation> {
        self.index
            .read()
            .conversations
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("conversation {id}")))
    }

    fn patch_conversations(&self, updates: Vec<Conversation>) -> Result<()> {
        {
            let mut index = self.index.write();
            for conv in updates {
                index.conversations.insert(conv.id.clone(), conv);
            }
        }
        self.flush_index()
    }

    fn get_turn(&self, conversation_id: &str, turn_id: &str) -> Result<Turn> {
        self.index
            .read()
            .turns
            .get(&turn_key(conversation_id, turn_id))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("turn {conversation_id}/{turn_id}")))
    }

    fn patch_turn(&self, turn: Turn) -> Result<()> {
        {
            let mut index = self.index.write();
            let key = turn_key(&turn.conversation_id, &turn.turn_id);
            index.turns.insert(key, turn);
        }
        self.flush_index()
    }

    fn get_message(&self, id: &str) -> Result<Message> {
        self.messages
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("message {id}")))
    }

    fn get_message_by_elicitation(&self, conversation_id: &str, elicitation_id: &str) -> Result<Message> {
        let message_id = self
            .by_elicitation
            .read()
            .get(elicitation_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("elicitation {elicitation_id}")))?;
        let msg = self.get_message(&message_id)?;
        if msg.conversation_id != conversation_id {
            return Err(Error::NotFound(format!(
                "elicitation {elicitation_id} not in conversation {conversation_id}"
            )));
        }
        Ok(msg)
    }

    fn patch_message(&self, message: Message) -> Result<()> {
        {
            let mut messages = self.messages.write();
            if let Some(elic) = &message.elicitation_id {
                self.by_elicitation
                    .write()
                    .insert(elic.clone(), message.id.clone());
            }
            messages.insert(message.id.clone(), message);
        }
        self.flush_messages()
    }

    fn patch_payload(&self, mut payload: Payload) -> Result<String> {
        if payload.id.is_empty() {
            payload.id = uuid::Uuid::new_v4().to_string();
        }
        let id = payload.id.clone();
        {
            let mut payloads = self.payloads.write();
            payloads.insert(id.clone(), payload);
        }
        self.flush_payloads()?;
        Ok(id)
    }

    fn delete_message(&self, conversation_id: &str, message_id: &str) -> Result<()> {
        {
            let mut messages = self.messages.write();
            match messages.get(message_id) {
                Some(msg) if msg.conversation_id == conversation_id => {
                    if let Some(elic) = &msg.elicitation_id {
                        self.by_elicitation.write().remove(elic);
                    }
                    messages.remove(message_id);
                }
                Some(_) => {
                    return Err(Error::NotFound(format!(
                        "message {message_id} not in conversation {conversation_id}"
                    )))
                }
                None => return Err(Error::NotFound(format!("message {message_id}"))),
            }
        }
        self.flush_messages()
    }

    fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let mut out: Vec<Message> = self
            .messages
            .read()
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.created_at);
        Ok(out)
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed index file");
            None
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}
