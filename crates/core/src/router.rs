//! Elicitation Router: delivers exactly one resolution per elicitation to
//! whichever in-process waiter is currently registered for it, or drops
//! the resolution silently (logging a stale-delivery trace event) when
//! nothing is waiting.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::oneshot;

use sa_domain::model::ElicitResult;
use sa_domain::trace::TraceEvent;

type Key = (String, String);

/// In-process, single-capacity delivery map keyed by `(conversation_id,
/// elicitation_id)`. A waiter registers a channel; `accept` consumes it
/// and sends at most once.
#[derive(Default)]
pub struct ElicitationRouter {
    waiters: RwLock<HashMap<Key, oneshot::Sender<ElicitResult>>>,
}

impl ElicitationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter and returns the receiving half. Replaces any
    /// previous registration for the same key (the old waiter's receiver
    /// will simply observe a dropped sender).
    pub fn register(&self, conversation_id: &str, elicitation_id: &str) -> oneshot::Receiver<ElicitResult> {
        let (tx, rx) = oneshot::channel();
        self.waiters
            .write()
            .insert((conversation_id.to_string(), elicitation_id.to_string()), tx);
        rx
    }

    /// Removes a registration without delivering anything, e.g. after a
    /// wait times out or is cancelled locally.
    pub fn remove(&self, conversation_id: &str, elicitation_id: &str) {
        self.waiters
            .write()
            .remove(&(conversation_id.to_string(), elicitation_id.to_string()));
    }

    /// Delivers `result` to the registered waiter, if any. Returns `true`
    /// if a waiter was present and the send succeeded.
    pub fn accept(&self, conversation_id: &str, elicitation_id: &str, result: ElicitResult) -> bool {
        let key = (conversation_id.to_string(), elicitation_id.to_string());
        let sender = self.waiters.write().remove(&key);
        match sender {
            Some(tx) => {
                let delivered = tx.send(result).is_ok();
                if delivered {
                    TraceEvent::RouterDelivered {
                        conversation_id: conversation_id.to_string(),
                        elicitation_id: elicitation_id.to_string(),
                    }
                    .emit();
                } else {
                    TraceEvent::RouterStale {
                        conversation_id: conversation_id.to_string(),
                        elicitation_id: elicitation_id.to_string(),
                    }
                    .emit();
                }
                delivered
            }
            None => {
                TraceEvent::RouterStale {
                    conversation_id: conversation_id.to_string(),
                    elicitation_id: elicitation_id.to_string(),
                }
                .emit();
                false
            }
        }
    }

    pub fn is_registered(&self, conversation_id: &str, elicitation_id: &str) -> bool {
        self.waiters
            .read()
            .contains_key(&(conversation_id.to_string(), elicitation_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::model::Action;

    #[tokio::test]
    async fn accept_delivers_to_registered_waiter() {
        let router = ElicitationRouter::new();
        let rx = router.register("conv-1", "elic-1");
        let delivered = router.accept(
            "conv-1",
            "elic-1",
            ElicitResult {
                action: Action::Accept,
                payload: None,
                reason: None,
            },
        );
        assert!(delivered);
        let result = rx.await.unwrap();
        assert_eq!(result.action, Action::Accept);
    }

    #[tokio::test]
    async fn accept_without_waiter_returns_false() {
        let router = ElicitationRouter::new();
        let delivered = router.accept(
            "conv-1",
            "elic-1",
            ElicitResult {
                action: Action::Decline,
                payload: None,
                reason: None,
            },
        );
        assert!(!delivered);
    }

    #[tokio::test]
    async fn accept_is_exactly_once() {
        let router = ElicitationRouter::new();
        let _rx = router.register("conv-1", "elic-1");
        let first = router.accept(
            "conv-1",
            "elic-1",
            ElicitResult {
                action: Action::Accept,
                payload: None,
                reason: None,
            },
        );
        let second = router.accept(
            "conv-1",
            "elic-1",
            ElicitResult {
                action: Action::Accept,
                payload: None,
                reason: None,
            },
        );
        assert!(first);
        assert!(!second);
    }

    #[test]
    fn remove_clears_registration() {
        let router = ElicitationRouter::new();
        let _rx = router.register("conv-1", "elic-1");
        assert!(router.is_registered("conv-1", "elic-1"));
        router.remove("conv-1", "elic-1");
        assert!(!router.is_registered("conv-1", "elic-1"));
    }
}
