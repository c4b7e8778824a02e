//! Elicitation Service: records a pending elicitation as a control
//! message, duplicates it into the root conversation so nested runs
//! surface to the top-level UI, waits for its resolution, and resolves
//! it from an inbound callback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use uuid::Uuid;

use sa_domain::config::ElicitationConfig;
use sa_domain::error::{Error, Result};
use sa_domain::model::{
    Action, Conversation, ElicitResult, Elicitation, Message, MessageStatus, MessageType, Role, Turn,
};
use sa_domain::trace::TraceEvent;
use sa_store::{ConversationStore, Payload};

use crate::cancel::CancelToken;
use crate::refiner::Refiner;
use crate::router::ElicitationRouter;

/// Maps free-form action tokens onto the canonical three-valued set.
pub fn normalize_action(token: &str) -> Action {
    match token.trim().to_ascii_lowercase().as_str() {
        "accept" | "accepted" | "approve" | "approved" | "yes" | "y" => Action::Accept,
        "cancel" | "canceled" | "cancelled" => Action::Cancel,
        _ => Action::Decline,
    }
}

/// Optional external resolver consulted concurrently with a blocked
/// `wait`. Implementations might prompt a human operator or another
/// agent; the service never depends on a concrete one.
#[async_trait::async_trait]
pub trait HelperAwaiter: Send + Sync {
    async fn await_elicitation(&self, elicitation: &Elicitation) -> Result<ElicitResult>;
}

pub struct ElicitationService {
    store: Arc<dyn ConversationStore>,
    router: Arc<ElicitationRouter>,
    refiner: Arc<Refiner>,
    config: ElicitationConfig,
    helper_awaiter: Option<Arc<dyn HelperAwaiter>>,
}

impl ElicitationService {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        router: Arc<ElicitationRouter>,
        refiner: Arc<Refiner>,
        config: ElicitationConfig,
    ) -> Self {
        Self {
            store,
            router,
            refiner,
            config,
            helper_awaiter: None,
        }
    }

    pub fn with_helper_awaiter(mut self, awaiter: Arc<dyn HelperAwaiter>) -> Self {
        self.helper_awaiter = Some(awaiter);
        self
    }

    /// §4.3.1 — record a new pending elicitation as a control message.
    pub fn record(
        &self,
        conversation_id: &str,
        turn_id: &str,
        parent_message_id: Option<String>,
        role: Role,
        mut elicitation: Elicitation,
    ) -> Result<Message> {
        if conversation_id.is_empty() || turn_id.is_empty() {
            return Err(Error::Input("conversation_id and turn_id are required".into()));
        }

        if elicitation.id.is_empty() {
            elicitation.id = Uuid::new_v4().to_string();
        }
        self.refiner.refine(&mut elicitation.requested_schema);
        if elicitation.callback_url.is_none() {
            elicitation.callback_url = Some(
                self.config
                    .callback_url_template
                    .replace("{conv}", conversation_id)
                    .replace("{elic}", &elicitation.id),
            );
        }

        let from_tool = role == Role::Tool;
        let content = serde_json::to_string(&elicitation)?;
        let mut message = Message::elicitation_prompt(conversation_id, elicitation.id.clone(), content, from_tool);
        message.turn_id = Some(turn_id.to_string());
        message.parent_message_id = parent_message_id;

        self.store.patch_message(message.clone())?;

        TraceEvent::ElicitationRecorded {
            conversation_id: conversation_id.to_string(),
            elicitation_id: elicitation.id.clone(),
            root_conversation_id: self.walk_to_root(conversation_id).map(|c| c.id).unwrap_or_else(|_| conversation_id.to_string()),
        }
        .emit();

        Ok(message)
    }

    /// §4.3.2 — duplicate a recorded message into the root conversation.
    /// Returns `None` when `message` already lives in the root.
    pub fn duplicate_to_root(&self, message: &Message) -> Result<Option<Message>> {
        let root = self.walk_to_root(&message.conversation_id)?;
        if root.id == message.conversation_id {
            return Ok(None);
        }

        let turn_id = match &root.last_turn_id {
            Some(id) => id.clone(),
            None => {
                let turn = Turn::new(root.id.clone());
                self.store.patch_turn(turn.clone())?;
                let mut root_updated = root.clone();
                root_updated.last_turn_id = Some(turn.turn_id.clone());
                self.store.patch_conversations(vec![root_updated])?;
                turn.turn_id
            }
        };

        let now = chrono::Utc::now();
        let mut duplicate = message.clone();
        duplicate.id = Uuid::new_v4().to_string();
        duplicate.conversation_id = root.id.clone();
        duplicate.turn_id = Some(turn_id);
        duplicate.parent_message_id = None;
        duplicate.created_at = now;
        duplicate.updated_at = now;
        self.store.patch_message(duplicate.clone())?;

        let mut original = message.clone();
        original.parent_message_id = Some(duplicate.id.clone());
        original.updated_at = now;
        self.store.patch_message(original)?;

        TraceEvent::ElicitationDuplicated {
            root_conversation_id: root.id,
            source_conversation_id: message.conversation_id.clone(),
            elicitation_id: message.elicitation_id.clone().unwrap_or_default(),
        }
        .emit();

        Ok(Some(duplicate))
    }

    fn walk_to_root(&self, conversation_id: &str) -> Result<Conversation> {
        let mut current = self.store.get_conversation(conversation_id)?;
        loop {
            if current.is_root() {
                return Ok(current);
            }
            let parent_id = current.parent_id.clone().expect("non-root has a parent");
            match self.store.get_conversation(&parent_id) {
                Ok(parent) => current = parent,
                Err(e) => {
                    if self.config.root_walk.closest_non_root_on_failure {
                        return Ok(current);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// §4.3.3 — block until the router delivers a resolution, the
    /// optional helper awaiter resolves it, or `cancel` fires.
    pub async fn wait(
        &self,
        conversation_id: &str,
        elicitation_id: &str,
        cancel: CancelToken,
    ) -> Result<ElicitResult> {
        let rx = self.router.register(conversation_id, elicitation_id);

        if let Some(awaiter) = self.helper_awaiter.clone() {
            let store = self.store.clone();
            let router = self.router.clone();
            let config = self.config.clone();
            let conv = conversation_id.to_string();
            let elic = elicitation_id.to_string();
            tokio::spawn(async move {
                run_helper_round(store, router, config, awaiter, conv, elic).await;
            });
        }

        let started = Instant::now();
        let poll_cancel = async {
            loop {
                if cancel.is_cancelled() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        };

        tokio::select! {
            received = rx => {
                match received {
                    Ok(result) => {
                        TraceEvent::ElicitationResolved {
                            elicitation_id: elicitation_id.to_string(),
                            action: action_label(result.action).to_string(),
                            wait_ms: started.elapsed().as_millis() as u64,
                        }
                        .emit();
                        Ok(result)
                    }
                    Err(_) => Err(Error::Internal("elicitation router sender dropped".into())),
                }
            }
            _ = poll_cancel => {
                self.router.remove(conversation_id, elicitation_id);
                Err(Error::Policy("elicitation wait was cancelled".into()))
            }
        }
    }

    /// §4.3.4 — resolve from an inbound callback.
    pub fn resolve(
        &self,
        conversation_id: &str,
        elicitation_id: &str,
        action_token: &str,
        payload: Option<HashMap<String, Value>>,
        reason: Option<String>,
    ) -> Result<bool> {
        if conversation_id.is_empty() || elicitation_id.is_empty() {
            return Err(Error::Input("conversation_id and elicitation_id are required".into()));
        }
        let action = normalize_action(action_token);
        resolve_impl(&*self.store, &self.router, conversation_id, elicitation_id, action, payload, reason)
    }
}

fn action_label(action: Action) -> &'static str {
    match action {
        Action::Accept => "accept",
        Action::Decline => "decline",
        Action::Cancel => "cancel",
    }
}

async fn run_helper_round(
    store: Arc<dyn ConversationStore>,
    router: Arc<ElicitationRouter>,
    config: ElicitationConfig,
    awaiter: Arc<dyn HelperAwaiter>,
    conversation_id: String,
    elicitation_id: String,
) {
    let message = match store.get_message_by_elicitation(&conversation_id, &elicitation_id) {
        Ok(m) => m,
        Err(_) => return,
    };
    let elicitation: Elicitation = match serde_json::from_str(&message.content) {
        Ok(e) => e,
        Err(_) => return,
    };

    let timeout = Duration::from_secs(config.helper_wait_seconds);
    match tokio::time::timeout(timeout, awaiter.await_elicitation(&elicitation)).await {
        Ok(Ok(result)) => {
            let _ = resolve_impl(
                &*store,
                &router,
                &conversation_id,
                &elicitation_id,
                result.action,
                result.payload,
                result.reason,
            );
        }
        Ok(Err(_)) => {}
        Err(_) => {
            TraceEvent::ElicitationWaitTimedOut {
                elicitation_id,
                waited_ms: timeout.as_millis() as u64,
            }
            .emit();
        }
    }
}

fn resolve_impl(
    store: &dyn ConversationStore,
    router: &ElicitationRouter,
    conversation_id: &str,
    elicitation_id: &str,
    action: Action,
    payload: Option<HashMap<String, Value>>,
    reason: Option<String>,
) -> Result<bool> {
    let mut message = store.get_message_by_elicitation(conversation_id, elicitation_id)?;

    message.status = match action {
        Action::Accept => MessageStatus::Accepted,
        Action::Decline => MessageStatus::Rejected,
        Action::Cancel => MessageStatus::Cancel,
    };
    message.updated_at = chrono::Utc::now();

    if action == Action::Accept {
        if let Some(payload_map) = &payload {
            let payload_id = store.patch_payload(Payload {
                id: String::new(),
                message_id: message.id.clone(),
                data: serde_json::to_value(payload_map)?,
            })?;
            message.payload_id = Some(payload_id);
        }
    }

    let transient_parent_id = message.parent_message_id.clone();
    let originator_was_assistant = message.role == Role::Assistant;
    let turn_id = message.turn_id.clone();

    store.patch_message(message)?;

    if action == Action::Decline && originator_was_assistant {
        if let Some(reason_text) = &reason {
            let now = chrono::Utc::now();
            let decline_message = Message {
                id: Uuid::new_v4().to_string(),
                conversation_id: conversation_id.to_string(),
                turn_id,
                parent_message_id: None,
                role: Role::User,
                kind: MessageType::Text,
                content: serde_json::json!({ "declineReason": reason_text }).to_string(),
                elicitation_id: None,
                payload_id: None,
                status: MessageStatus::None,
                tool_name: None,
                created_at: now,
                updated_at: now,
            };
            store.patch_message(decline_message)?;
        }
    }

    let delivered = router.accept(
        conversation_id,
        elicitation_id,
        ElicitResult { action, payload, reason },
    );

    if let Some(parent_id) = transient_parent_id {
        if let Ok(parent_msg) = store.get_message(&parent_id) {
            let _ = store.delete_message(&parent_msg.conversation_id, &parent_id);
        }
    }

    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::schema::RequestedSchema;
    use sa_store::JsonConversationStore;

    fn service(store: Arc<dyn ConversationStore>) -> ElicitationService {
        ElicitationService::new(
            store,
            Arc::new(ElicitationRouter::new()),
            Arc::new(Refiner::with_no_presets()),
            ElicitationConfig::default(),
        )
    }

    fn new_store() -> (Arc<dyn ConversationStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ConversationStore> = Arc::new(JsonConversationStore::open(dir.path()).unwrap());
        (store, dir)
    }

    #[test]
    fn normalize_action_maps_known_tokens() {
        assert_eq!(normalize_action("Approved"), Action::Accept);
        assert_eq!(normalize_action("y"), Action::Accept);
        assert_eq!(normalize_action("cancelled"), Action::Cancel);
        assert_eq!(normalize_action("nope"), Action::Decline);
        assert_eq!(normalize_action(""), Action::Decline);
    }

    #[test]
    fn record_assigns_fresh_id_and_defaults_callback_url() {
        let (store, _dir) = new_store();
        let conv = Conversation::root();
        store.patch_conversations(vec![conv.clone()]).unwrap();
        let svc = service(store.clone());

        let elicitation = Elicitation::new("confirm?", RequestedSchema::object());
        let msg = svc
            .record(&conv.id, "turn-1", None, Role::Assistant, elicitation)
            .unwrap();

        assert_eq!(msg.status, MessageStatus::Pending);
        assert_eq!(msg.kind, MessageType::Text);
        let stored: Elicitation = serde_json::from_str(&msg.content).unwrap();
        assert!(!stored.id.is_empty());
        assert!(stored.callback_url.unwrap().contains(&stored.id));
    }

    #[test]
    fn record_from_tool_role_is_control_type() {
        let (store, _dir) = new_store();
        let conv = Conversation::root();
        store.patch_conversations(vec![conv.clone()]).unwrap();
        let svc = service(store.clone());

        let elicitation = Elicitation::new("need input", RequestedSchema::object());
        let msg = svc
            .record(&conv.id, "turn-1", None, Role::Tool, elicitation)
            .unwrap();
        assert_eq!(msg.kind, MessageType::Control);
        assert_eq!(msg.role, Role::Tool);
    }

    #[test]
    fn duplicate_to_root_is_noop_at_root() {
        let (store, _dir) = new_store();
        let conv = Conversation::root();
        store.patch_conversations(vec![conv.clone()]).unwrap();
        let svc = service(store.clone());

        let elicitation = Elicitation::new("confirm?", RequestedSchema::object());
        let msg = svc
            .record(&conv.id, "turn-1", None, Role::Assistant, elicitation)
            .unwrap();

        assert!(svc.duplicate_to_root(&msg).unwrap().is_none());
    }

    #[test]
    fn duplicate_to_root_copies_and_links_parent() {
        let (store, _dir) = new_store();
        let root = Conversation::root();
        let child = Conversation::child_of(&root);
        store.patch_conversations(vec![root.clone(), child.clone()]).unwrap();
        let svc = service(store.clone());

        let elicitation = Elicitation::new("confirm?", RequestedSchema::object());
        let msg = svc
            .record(&child.id, "turn-1", None, Role::Assistant, elicitation)
            .unwrap();

        let duplicate = svc.duplicate_to_root(&msg).unwrap().expect("expected a duplicate");
        assert_eq!(duplicate.conversation_id, root.id);

        let original_updated = store.get_message(&msg.id).unwrap();
        assert_eq!(original_updated.parent_message_id, Some(duplicate.id));
    }

    #[tokio::test]
    async fn wait_then_resolve_accept_delivers_result() {
        let (store, _dir) = new_store();
        let conv = Conversation::root();
        store.patch_conversations(vec![conv.clone()]).unwrap();
        let svc = Arc::new(service(store.clone()));

        let elicitation = Elicitation::new("confirm?", RequestedSchema::object());
        let msg = svc
            .record(&conv.id, "turn-1", None, Role::Assistant, elicitation)
            .unwrap();
        let elicitation_id = msg.elicitation_id.clone().unwrap();

        let waiter = {
            let svc = svc.clone();
            let conv_id = conv.id.clone();
            let elic_id = elicitation_id.clone();
            tokio::spawn(async move { svc.wait(&conv_id, &elic_id, CancelToken::new()).await })
        };

        tokio::task::yield_now().await;
        svc.resolve(&conv.id, &elicitation_id, "approve", None, None).unwrap();

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result.action, Action::Accept);

        let updated = store.get_message(&msg.id).unwrap();
        assert_eq!(updated.status, MessageStatus::Accepted);
    }

    #[tokio::test]
    async fn wait_cancelled_removes_registration_and_errors() {
        let (store, _dir) = new_store();
        let conv = Conversation::root();
        store.patch_conversations(vec![conv.clone()]).unwrap();
        let svc = service(store.clone());

        let elicitation = Elicitation::new("confirm?", RequestedSchema::object());
        let msg = svc
            .record(&conv.id, "turn-1", None, Role::Assistant, elicitation)
            .unwrap();
        let elicitation_id = msg.elicitation_id.unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = svc.wait(&conv.id, &elicitation_id, cancel).await;
        assert!(result.is_err());
    }

    #[test]
    fn resolve_decline_with_reason_appends_user_message() {
        let (store, _dir) = new_store();
        let conv = Conversation::root();
        store.patch_conversations(vec![conv.clone()]).unwrap();
        let svc = service(store.clone());

        let elicitation = Elicitation::new("confirm?", RequestedSchema::object());
        let msg = svc
            .record(&conv.id, "turn-1", None, Role::Assistant, elicitation)
            .unwrap();
        let elicitation_id = msg.elicitation_id.clone().unwrap();

        svc.resolve(
            &conv.id,
            &elicitation_id,
            "decline",
            None,
            Some("not today".into()),
        )
        .unwrap();

        let messages = store.list_messages(&conv.id).unwrap();
        let decline_msg = messages
            .iter()
            .find(|m| m.content.contains("declineReason"))
            .expect("expected a decline-reason message");
        assert_eq!(decline_msg.role, Role::User);
    }

    #[test]
    fn resolve_missing_elicitation_is_not_found() {
        let (store, _dir) = new_store();
        let conv = Conversation::root();
        store.patch_conversations(vec![conv.clone()]).unwrap();
        let svc = service(store.clone());

        let err = svc.resolve(&conv.id, "nope", "accept", None, None).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
