//! Duplicate Guard: blocks pathological repeat/alternation patterns
//! within a single plan run before a tool is re-invoked.

use std::collections::HashMap;

use serde_json::Value;

use sa_domain::config::DuplicateGuardConfig;
use sa_domain::model::{DuplicateGuardState, StepResult};

/// A step was blocked, or the prior result for the same call should be
/// reused without re-invoking the tool.
pub enum GuardDecision {
    Proceed,
    ReuseResult(StepResult),
    Block { reason: String },
}

/// Canonical key for a tool call: name + recursively key-sorted args JSON,
/// used both for dedup lookups and duplicate-guard windowing.
pub fn canonical_key(name: &str, args: &HashMap<String, Value>) -> String {
    let canonical_args = canonicalize(&serde_json::to_value(args).unwrap_or(Value::Null));
    format!("{name}:{canonical_args}")
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(String, Value)> =
                map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Evaluates whether a tool call identified by `key` should proceed,
/// reuse a prior successful result, or be blocked, and updates `state`
/// to reflect this call regardless of the decision.
pub fn evaluate(
    state: &mut DuplicateGuardState,
    config: &DuplicateGuardConfig,
    repeat_allowed_tools: &[String],
    tool_name: &str,
    key: &str,
) -> GuardDecision {
    let repeat_allowed = repeat_allowed_tools.iter().any(|t| t == tool_name);

    if !repeat_allowed {
        if let Some(prior) = state.results_by_key.get(key) {
            if prior.is_success() {
                record(state, config, key);
                return GuardDecision::ReuseResult(prior.clone());
            }
        }
    }

    let would_be_consecutive = state.last_key.as_deref() == Some(key);
    let next_consecutive = if would_be_consecutive { state.consecutive_count + 1 } else { 1 };
    if !repeat_allowed && next_consecutive >= config.consecutive_limit {
        record(state, config, key);
        return GuardDecision::Block {
            reason: format!("{tool_name} called {next_consecutive} times in a row"),
        };
    }

    // The last `window_size` invocations including this one — state.window
    // already holds at most `window_size` entries, so pushing the current
    // key and dropping the oldest keeps this a true sliding window instead
    // of growing to `window_size + 1`.
    let mut window_with_this: Vec<&str> = state.window.iter().map(|s| s.as_str()).collect();
    window_with_this.push(key);
    if window_with_this.len() > config.window_size {
        window_with_this.remove(0);
    }

    let occurrences = window_with_this.iter().filter(|k| **k == key).count();
    if !repeat_allowed && occurrences >= config.frequency_threshold {
        record(state, config, key);
        return GuardDecision::Block {
            reason: format!("{tool_name} called {occurrences} times within the last {} steps", config.window_size),
        };
    }

    if !repeat_allowed && window_with_this.len() == config.window_size {
        let distinct: std::collections::BTreeSet<&str> = window_with_this.iter().copied().collect();
        if distinct.len() == 2 {
            record(state, config, key);
            return GuardDecision::Block {
                reason: format!("{tool_name} is alternating between two calls without progress"),
            };
        }
    }

    record(state, config, key);
    GuardDecision::Proceed
}

fn record(state: &mut DuplicateGuardState, config: &DuplicateGuardConfig, key: &str) {
    if state.last_key.as_deref() == Some(key) {
        state.consecutive_count += 1;
    } else {
        state.consecutive_count = 1;
    }
    state.last_key = Some(key.to_string());
    state.window.push_back(key.to_string());
    while state.window.len() > config.window_size {
        state.window.pop_front();
    }
}

/// Records a successful result for future short-circuiting.
pub fn remember_result(state: &mut DuplicateGuardState, key: &str, result: StepResult) {
    state.results_by_key.insert(key.to_string(), result);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DuplicateGuardConfig {
        DuplicateGuardConfig {
            window_size: 8,
            consecutive_limit: 3,
            frequency_threshold: 4,
        }
    }

    fn args(text: &str) -> HashMap<String, Value> {
        let mut m = HashMap::new();
        m.insert("text".into(), Value::String(text.into()));
        m
    }

    #[test]
    fn canonical_key_is_stable_under_key_order() {
        let mut a = HashMap::new();
        a.insert("b".to_string(), Value::from(2));
        a.insert("a".to_string(), Value::from(1));
        let key1 = canonical_key("tool", &a);

        let mut b = HashMap::new();
        b.insert("a".to_string(), Value::from(1));
        b.insert("b".to_string(), Value::from(2));
        let key2 = canonical_key("tool", &b);

        assert_eq!(key1, key2);
    }

    #[test]
    fn consecutive_calls_block_at_limit() {
        let mut state = DuplicateGuardState::new();
        let cfg = config();
        let key = canonical_key("echo", &args("x"));
        assert!(matches!(evaluate(&mut state, &cfg, &[], "echo", &key), GuardDecision::Proceed));
        assert!(matches!(evaluate(&mut state, &cfg, &[], "echo", &key), GuardDecision::Proceed));
        assert!(matches!(
            evaluate(&mut state, &cfg, &[], "echo", &key),
            GuardDecision::Block { .. }
        ));
    }

    #[test]
    fn repeat_allowed_tool_never_blocks_on_consecutive() {
        let mut state = DuplicateGuardState::new();
        let cfg = config();
        let key = canonical_key("calc", &args("1+1"));
        let allowed = vec!["calc".to_string()];
        for _ in 0..10 {
            assert!(matches!(
                evaluate(&mut state, &cfg, &allowed, "calc", &key),
                GuardDecision::Proceed
            ));
        }
    }

    #[test]
    fn prior_success_short_circuits_with_reuse() {
        let mut state = DuplicateGuardState::new();
        let cfg = config();
        let key = canonical_key("echo", &args("x"));
        remember_result(&mut state, &key, StepResult::ok("1", "echo", args("x"), "x"));
        match evaluate(&mut state, &cfg, &[], "echo", &key) {
            GuardDecision::ReuseResult(r) => assert_eq!(r.result, "x"),
            _ => panic!("expected reuse"),
        }
    }

    #[test]
    fn alternation_between_two_keys_blocks_once_window_fills() {
        let mut state = DuplicateGuardState::new();
        let cfg = config();
        let key_a = canonical_key("echo", &args("a"));
        let key_b = canonical_key("echo", &args("b"));
        let sequence = [
            &key_a, &key_b, &key_a, &key_b, &key_a, &key_b, &key_a, &key_b,
        ];
        let mut last_decision_blocked = false;
        for key in sequence {
            last_decision_blocked =
                matches!(evaluate(&mut state, &cfg, &[], "echo", key), GuardDecision::Block { .. });
        }
        assert!(last_decision_blocked);
    }

    #[test]
    fn frequency_threshold_blocks_before_alternation_check_when_both_apply() {
        let mut state = DuplicateGuardState::new();
        let cfg = config();
        let key_a = canonical_key("echo", &args("a"));
        let key_b = canonical_key("echo", &args("b"));
        // key_a reaches 4 occurrences by the 7th call, before the window is
        // even full — frequency fires without needing the alternation rule's
        // full-window precondition.
        let sequence = [&key_a, &key_b, &key_a, &key_b, &key_a, &key_b, &key_a];
        let mut blocked_reason = String::new();
        for key in sequence {
            if let GuardDecision::Block { reason } = evaluate(&mut state, &cfg, &[], "echo", key) {
                blocked_reason = reason;
            }
        }
        assert!(blocked_reason.contains("within the last") || blocked_reason.contains("alternating"));
    }
}
