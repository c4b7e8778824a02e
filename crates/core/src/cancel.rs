//! Per-run cancellation tokens with group fan-out, generalized from the
//! teacher's per-session `CancelMap` to per-request keys. Every blocking
//! operation in the coordination core (elicitation wait, helper awaiter)
//! observes a `CancelToken` that cascades from the outermost request.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks active cancellation tokens per run key, with group support for
/// cascading parent→child cancellation (a plan run's tool call spawning
/// a nested elicitation wait, for instance).
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
    groups: Mutex<HashMap<String, HashSet<String>>>,
}

impl Default for CancelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelMap {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            groups: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, run_key: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(run_key.to_owned(), token.clone());
        token
    }

    pub fn cancel(&self, run_key: &str) -> bool {
        let found = if let Some(token) = self.tokens.lock().get(run_key) {
            token.cancel();
            true
        } else {
            false
        };

        if let Some(children) = self.groups.lock().get(run_key) {
            let tokens = self.tokens.lock();
            for child_key in children {
                if let Some(child_token) = tokens.get(child_key) {
                    child_token.cancel();
                }
            }
        }

        found
    }

    pub fn remove(&self, run_key: &str) {
        self.tokens.lock().remove(run_key);
        self.groups.lock().remove(run_key);
    }

    pub fn is_running(&self, run_key: &str) -> bool {
        self.tokens.lock().contains_key(run_key)
    }

    pub fn add_to_group(&self, parent_key: &str, child_key: &str) {
        self.groups
            .lock()
            .entry(parent_key.to_owned())
            .or_default()
            .insert(child_key.to_owned());
    }

    pub fn remove_from_group(&self, parent_key: &str, child_key: &str) {
        let mut groups = self.groups.lock();
        if let Some(children) = groups.get_mut(parent_key) {
            children.remove(child_key);
            if children.is_empty() {
                groups.remove(parent_key);
            }
        }
    }
}
