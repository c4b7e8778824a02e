//! Plan Executor: runs a Plan's steps against the tool registry, honoring
//! placeholder substitution, the Duplicate Guard, and surfacing
//! Elicitations when a step needs one.

use std::collections::HashMap;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use sa_domain::config::{PlanConfig, ToolPolicy};
use sa_domain::error::{Error, Result};
use sa_domain::model::{DuplicateGuardState, Elicitation, ExecutionTrace, Plan, Step, StepResult, StepType};
use sa_domain::schema::{Property, RequestedSchema};
use sa_domain::trace::TraceEvent;
use sa_tools::ToolRegistry;

use crate::guard::{self, GuardDecision};

const HARD_STEP_CAP: usize = 1000;

pub struct PlanRunOutcome {
    pub results: Vec<StepResult>,
    pub elicitation: Option<Elicitation>,
    pub traces: Vec<ExecutionTrace>,
}

/// §4.4 — `runPlan`. `prior` carries results from earlier plan runs in the
/// same conversation so placeholder indices stay stable across turns.
/// `policy` gates every tool dispatch (§1, §6); a denied tool aborts the
/// run with `Error::Policy`, same as an explicit `abort` step.
pub async fn run_plan(
    plan: &Plan,
    tools: &dyn ToolRegistry,
    prior: Vec<StepResult>,
    plan_config: &PlanConfig,
    policy: &ToolPolicy,
) -> Result<PlanRunOutcome> {
    let mut results = prior;
    let mut traces = Vec::new();
    let mut guard_state = DuplicateGuardState::new();
    let placeholder_re = placeholder_regex();

    if plan.steps.is_empty() {
        return Ok(PlanRunOutcome {
            results: dedup_results(results),
            elicitation: plan.elicitation.clone(),
            traces,
        });
    }

    let step_limit = plan.steps.len().min(plan_config.max_steps.min(HARD_STEP_CAP));

    for (index, step) in plan.steps.iter().take(step_limit).enumerate() {
        match step.kind {
            StepType::Noop => continue,
            StepType::Abort => {
                return Err(Error::Policy(
                    step.reason.clone().unwrap_or_else(|| "plan aborted".into()),
                ));
            }
            StepType::Elicitation => {
                let elicitation = step
                    .elicitation
                    .clone()
                    .ok_or_else(|| Error::Schema("elicitation step missing its elicitation payload".into()))?;
                return Ok(PlanRunOutcome {
                    results: dedup_results(results),
                    elicitation: Some(elicitation),
                    traces,
                });
            }
            StepType::ClarifyIntent => {
                let elicitation = step.elicitation.clone().unwrap_or_else(|| {
                    Elicitation::new(step.content.clone().unwrap_or_default(), RequestedSchema::object())
                });
                return Ok(PlanRunOutcome {
                    results: dedup_results(results),
                    elicitation: Some(elicitation),
                    traces,
                });
            }
            StepType::Tool => {
                if !policy.allows(&step.name) {
                    return Err(Error::Policy(format!("tool '{}' is not allowed by policy", step.name)));
                }

                let resolved_args = resolve_placeholders(&step.args, &results, &placeholder_re);
                let key = guard::canonical_key(&step.name, &resolved_args);

                match guard::evaluate(
                    &mut guard_state,
                    &plan_config.duplicate_guard,
                    &plan_config.repeat_allowed_tools,
                    &step.name,
                    &key,
                ) {
                    GuardDecision::Block { reason } => {
                        TraceEvent::DuplicateGuardBlocked {
                            plan_id: plan.id.clone(),
                            step_index: index,
                            tool: step.name.clone(),
                            reason: reason.clone(),
                        }
                        .emit();
                        let substituted = guard_state.results_by_key.get(&key).cloned().unwrap_or_else(|| {
                            StepResult::failed(step.id.clone(), step.name.clone(), resolved_args.clone(), reason.clone())
                        });
                        results.push(substituted);
                        continue;
                    }
                    GuardDecision::ReuseResult(prior_result) => {
                        let mut reused = prior_result;
                        reused.id = step.id.clone();
                        results.push(reused);
                        continue;
                    }
                    GuardDecision::Proceed => {}
                }

                let mut trace = ExecutionTrace::started(
                    plan.id.clone(),
                    index,
                    serde_json::to_value(&resolved_args).unwrap_or(Value::Null),
                );
                TraceEvent::PlanStepStarted {
                    plan_id: plan.id.clone(),
                    step_index: index,
                    tool: step.name.clone(),
                }
                .emit();
                let started_at = std::time::Instant::now();

                let outcome = tools.execute(&step.name, &resolved_args).await;
                let duration_ms = started_at.elapsed().as_millis() as u64;

                match outcome {
                    Ok(output) => {
                        trace.finish(Value::String(output.clone()), true, None);
                        traces.push(trace);
                        TraceEvent::PlanStepFinished {
                            plan_id: plan.id.clone(),
                            step_index: index,
                            tool: step.name.clone(),
                            duration_ms,
                            deduped: false,
                        }
                        .emit();
                        let result = StepResult::ok(step.id.clone(), step.name.clone(), resolved_args.clone(), output);
                        guard::remember_result(&mut guard_state, &key, result.clone());
                        results.push(result);
                    }
                    Err(e) => {
                        trace.finish(Value::Null, false, Some(e.to_string()));
                        traces.push(trace);
                        if let Some(missing) = unsatisfied_required_params(tools, &step.name, &resolved_args) {
                            let schema = schema_from_missing(&missing);
                            let elicitation = Elicitation::new(
                                format!("Missing required arguments for {}", step.name),
                                schema,
                            );
                            return Ok(PlanRunOutcome {
                                results: dedup_results(results),
                                elicitation: Some(elicitation),
                                traces,
                            });
                        }
                        let result = StepResult::failed(step.id.clone(), step.name.clone(), resolved_args.clone(), e.to_string());
                        results.push(result);
                    }
                }
            }
        }
    }

    Ok(PlanRunOutcome {
        results: dedup_results(results),
        elicitation: None,
        traces,
    })
}

fn unsatisfied_required_params(tools: &dyn ToolRegistry, name: &str, args: &HashMap<String, Value>) -> Option<Vec<String>> {
    let def = tools.get_definition(name)?;
    let required = def.parameters.get("required")?.as_array()?;
    let missing: Vec<String> = required
        .iter()
        .filter_map(|v| v.as_str())
        .filter(|param| !args.contains_key(*param))
        .map(|s| s.to_string())
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(missing)
    }
}

fn schema_from_missing(missing: &[String]) -> RequestedSchema {
    let mut schema = RequestedSchema::object();
    for name in missing {
        schema.properties.insert(
            name.clone(),
            Property {
                kind: Some("string".into()),
                ..Default::default()
            },
        );
    }
    schema.required = missing.to_vec();
    schema
}

/// §4.4.3 — keep only the last occurrence of each `(name, canonical-args)`
/// pair, preserving the chronological order of those last occurrences.
pub fn dedup_results(results: Vec<StepResult>) -> Vec<StepResult> {
    let mut last_index: HashMap<String, usize> = HashMap::new();
    for (i, r) in results.iter().enumerate() {
        let key = guard::canonical_key(&r.name, &r.args);
        last_index.insert(key, i);
    }
    let mut keep: Vec<usize> = last_index.into_values().collect();
    keep.sort_unstable();
    keep.into_iter().map(|i| results[i].clone()).collect()
}

fn placeholder_regex() -> Regex {
    Regex::new(r"^\$step\[(\d+)\]\.output(?:\.(.+))?$").unwrap()
}

/// §4.4.2 — substitutes `$step[N].output` / `$step[N].output.path` string
/// arguments with the referenced prior result. Recurses into nested
/// objects; arrays and other value types pass through unchanged.
pub fn resolve_placeholders(args: &HashMap<String, Value>, prior: &[StepResult], re: &Regex) -> HashMap<String, Value> {
    args.iter().map(|(k, v)| (k.clone(), resolve_value(v, prior, re))).collect()
}

fn resolve_value(value: &Value, prior: &[StepResult], re: &Regex) -> Value {
    match value {
        Value::String(s) => resolve_string(s, prior, re),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), resolve_value(v, prior, re))).collect()),
        other => other.clone(),
    }
}

fn resolve_string(s: &str, prior: &[StepResult], re: &Regex) -> Value {
    let Some(caps) = re.captures(s) else {
        return Value::String(s.to_string());
    };
    let Ok(index) = caps[1].parse::<usize>() else {
        return Value::String(s.to_string());
    };
    let Some(result) = prior.get(index) else {
        return Value::String(s.to_string());
    };

    match caps.get(2) {
        None => Value::String(result.result.clone()),
        Some(path) => {
            if let Ok(parsed) = serde_json::from_str::<Value>(&result.result) {
                if let Some(found) = walk_path(&parsed, path.as_str()) {
                    return found;
                }
            }
            Value::String(s.to_string())
        }
    }
}

fn walk_path(value: &Value, path: &str) -> Option<Value> {
    let mut current = value;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current.clone())
}

// ── JSON extraction from free-form LLM text (§4.4.5) ────────────────

/// Strips a leading fenced code block if present, extracts the outermost
/// `{...}` or `[...]` (preferring objects), and JSON-decodes it. Returns
/// `None` — not an error — when no brace/bracket pair is found.
pub fn extract_json(text: &str) -> Option<Value> {
    let stripped = strip_fenced_block(text);
    let candidate = extract_outermost(&stripped)?;
    serde_json::from_str(&candidate).ok()
}

fn strip_fenced_block(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest,
        };
        return match rest.rfind("```") {
            Some(end) => rest[..end].trim().to_string(),
            None => rest.trim().to_string(),
        };
    }
    trimmed.to_string()
}

fn extract_outermost(text: &str) -> Option<String> {
    bracket_span(text, '{', '}').or_else(|| bracket_span(text, '[', ']'))
}

fn bracket_span(text: &str, open: char, close: char) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.iter().position(|&c| c == open)?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for (i, &c) in chars.iter().enumerate().skip(start) {
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(chars[start..=i].iter().collect());
            }
        }
    }
    None
}

// ── Plan parsing from LLM output ────────────────────────────────────

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    intention: Option<String>,
    #[serde(default)]
    steps: Vec<RawStep>,
    #[serde(default)]
    elicitation: Option<Elicitation>,
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(rename = "type")]
    kind: StepType,
    #[serde(default)]
    name: String,
    #[serde(default)]
    args: HashMap<String, Value>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    elicitation: Option<Elicitation>,
}

/// Parses a `Plan` out of free-form LLM text via [`extract_json`],
/// assigning fresh step ids since the model only names type/args.
pub fn parse_plan_from_text(text: &str) -> Result<Option<Plan>> {
    let Some(value) = extract_json(text) else {
        return Ok(None);
    };
    let raw: RawPlan = serde_json::from_value(value)?;
    let steps = raw
        .steps
        .into_iter()
        .map(|s| Step {
            id: Uuid::new_v4().to_string(),
            kind: s.kind,
            name: s.name,
            args: s.args,
            reason: s.reason,
            content: s.content,
            elicitation: s.elicitation,
            retry_budget: None,
            response_id: None,
        })
        .collect();
    Ok(Some(Plan {
        id: Uuid::new_v4().to_string(),
        intention: raw.intention,
        steps,
        elicitation: raw.elicitation,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::DuplicateGuardConfig;
    use sa_tools::builtin::{CalcTool, EchoTool, FailOnceTool};
    use sa_tools::InMemoryToolRegistry;
    use std::sync::Arc;

    fn permissive_policy() -> ToolPolicy {
        ToolPolicy::default()
    }

    fn registry() -> InMemoryToolRegistry {
        let registry = InMemoryToolRegistry::new();
        registry.register(Arc::new(CalcTool));
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(FailOnceTool::new()));
        registry
    }

    fn plan_config() -> PlanConfig {
        PlanConfig {
            max_steps: 1000,
            duplicate_guard: DuplicateGuardConfig {
                window_size: 8,
                consecutive_limit: 3,
                frequency_threshold: 4,
            },
            repeat_allowed_tools: vec!["calc".into()],
        }
    }

    fn text_arg(value: &str) -> HashMap<String, Value> {
        let mut m = HashMap::new();
        m.insert("text".into(), Value::String(value.into()));
        m
    }

    #[tokio::test]
    async fn runs_tool_steps_in_order() {
        let plan = Plan::new(vec![Step::tool("echo", text_arg("a")), Step::tool("echo", text_arg("b"))]);
        let outcome = run_plan(&plan, &registry(), Vec::new(), &plan_config(), &permissive_policy()).await.unwrap();
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].result, "a");
        assert_eq!(outcome.results[1].result, "b");
    }

    #[tokio::test]
    async fn placeholder_substitutes_whole_prior_result() {
        let mut step2 = Step::tool("echo", HashMap::new());
        step2.args.insert("text".into(), Value::String("$step[0].output".into()));
        let plan = Plan::new(vec![Step::tool("echo", text_arg("hello")), step2]);
        let outcome = run_plan(&plan, &registry(), Vec::new(), &plan_config(), &permissive_policy()).await.unwrap();
        assert_eq!(outcome.results[1].result, "hello");
    }

    #[tokio::test]
    async fn placeholder_resolves_json_path() {
        let mut step1 = Step::tool("echo", HashMap::new());
        step1.args.insert("text".into(), Value::String(r#"{"nested":{"value":"deep"}}"#.into()));
        let mut step2 = Step::tool("echo", HashMap::new());
        step2.args.insert("text".into(), Value::String("$step[0].output.nested.value".into()));
        let plan = Plan::new(vec![step1, step2]);
        let outcome = run_plan(&plan, &registry(), Vec::new(), &plan_config(), &permissive_policy()).await.unwrap();
        assert_eq!(outcome.results[1].result, "deep");
    }

    #[test]
    fn placeholder_out_of_range_index_is_left_as_is() {
        let re = placeholder_regex();
        let resolved = resolve_string("$step[5].output", &[], &re);
        assert_eq!(resolved, Value::String("$step[5].output".into()));
    }

    #[test]
    fn non_matching_string_passes_through() {
        let re = placeholder_regex();
        let resolved = resolve_string("plain text", &[], &re);
        assert_eq!(resolved, Value::String("plain text".into()));
    }

    #[test]
    fn arrays_pass_through_unresolved() {
        let re = placeholder_regex();
        let arr = Value::Array(vec![Value::String("$step[0].output".into())]);
        let resolved = resolve_value(&arr, &[], &re);
        assert_eq!(resolved, arr);
    }

    #[tokio::test]
    async fn abort_step_fails_the_plan() {
        let mut abort_step = Step::tool("unused", HashMap::new());
        abort_step.kind = StepType::Abort;
        abort_step.reason = Some("user cancelled".into());
        let plan = Plan::new(vec![abort_step]);
        let err = run_plan(&plan, &registry(), Vec::new(), &plan_config(), &permissive_policy()).await.unwrap_err();
        assert_eq!(err.kind(), "policy");
    }

    #[tokio::test]
    async fn denied_tool_aborts_the_plan_with_policy_error() {
        let plan = Plan::new(vec![Step::tool("echo", text_arg("hi"))]);
        let policy = ToolPolicy {
            allow: vec![],
            deny: vec!["echo".into()],
        };
        let err = run_plan(&plan, &registry(), Vec::new(), &plan_config(), &policy).await.unwrap_err();
        assert_eq!(err.kind(), "policy");
    }

    #[tokio::test]
    async fn noop_step_consumes_slot_without_effect() {
        let mut noop_step = Step::tool("unused", HashMap::new());
        noop_step.kind = StepType::Noop;
        let plan = Plan::new(vec![noop_step, Step::tool("echo", text_arg("after"))]);
        let outcome = run_plan(&plan, &registry(), Vec::new(), &plan_config(), &permissive_policy()).await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].result, "after");
    }

    #[tokio::test]
    async fn clarify_intent_without_elicitation_falls_back_to_content() {
        let mut step = Step::tool("unused", HashMap::new());
        step.kind = StepType::ClarifyIntent;
        step.content = Some("what did you mean?".into());
        let plan = Plan::new(vec![step]);
        let outcome = run_plan(&plan, &registry(), Vec::new(), &plan_config(), &permissive_policy()).await.unwrap();
        assert_eq!(outcome.elicitation.unwrap().message, "what did you mean?");
    }

    #[tokio::test]
    async fn missing_required_tool_arg_synthesizes_elicitation() {
        let plan = Plan::new(vec![Step::tool("echo", HashMap::new())]);
        let outcome = run_plan(&plan, &registry(), Vec::new(), &plan_config(), &permissive_policy()).await.unwrap();
        let elicitation = outcome.elicitation.expect("expected a synthesized elicitation");
        assert!(elicitation.requested_schema.properties.contains_key("text"));
        assert!(elicitation.requested_schema.required.contains(&"text".to_string()));
    }

    #[tokio::test]
    async fn duplicate_guard_blocks_and_substitutes_prior_result() {
        let steps: Vec<Step> = (0..4).map(|_| Step::tool("echo", text_arg("same"))).collect();
        let plan = Plan::new(steps);
        let outcome = run_plan(&plan, &registry(), Vec::new(), &plan_config(), &permissive_policy()).await.unwrap();
        // Third consecutive identical call is blocked; its substituted result
        // still carries the successful prior output.
        assert_eq!(outcome.results[2].result, "same");
        assert!(outcome.results[2].is_success());
    }

    #[tokio::test]
    async fn dedup_keeps_last_occurrence_per_tool_and_args() {
        let plan = Plan::new(vec![
            Step::tool("echo", text_arg("a")),
            Step::tool("calc", {
                let mut m = HashMap::new();
                m.insert("expression".into(), Value::String("1+1".into()));
                m
            }),
            Step::tool("echo", text_arg("a")),
        ]);
        let outcome = run_plan(&plan, &registry(), Vec::new(), &plan_config(), &permissive_policy()).await.unwrap();
        // two distinct (name, args) keys survive dedup: echo("a") and calc(1+1)
        assert_eq!(outcome.results.len(), 2);
    }

    #[test]
    fn extract_json_strips_fenced_block() {
        let text = "```json\n{\"a\": 1}\n```";
        let value = extract_json(text).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn extract_json_prefers_object_over_array() {
        let text = "here is [1,2] and also {\"a\":1}";
        let value = extract_json(text).unwrap();
        assert!(value.is_object());
    }

    #[test]
    fn extract_json_returns_none_without_braces() {
        assert!(extract_json("just a plain reply").is_none());
    }

    #[test]
    fn parse_plan_from_text_assigns_step_ids() {
        let text = r#"{"intention":"do it","steps":[{"type":"tool","name":"echo","args":{"text":"hi"}}]}"#;
        let plan = parse_plan_from_text(text).unwrap().unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert!(!plan.steps[0].id.is_empty());
        assert_eq!(plan.steps[0].name, "echo");
    }
}
