//! `/v1/plans/run` — runs a Plan's steps against the tool registry.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use sa_core::run_plan;
use sa_domain::config::ToolPolicy;
use sa_domain::model::{Elicitation, Plan, StepResult};

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunPlanRequest {
    pub plan: Plan,
    /// Results from earlier plan runs in the same conversation, so
    /// `$step[N].output` placeholders keep resolving across turns.
    #[serde(default)]
    pub prior: Vec<StepResult>,
    /// Allow/deny policy gating this run's tool dispatches. Absent or
    /// empty means unrestricted, matching `ToolPolicy`'s own default.
    #[serde(default)]
    pub policy: ToolPolicy,
}

#[derive(Debug, Serialize)]
pub struct RunPlanResponse {
    pub results: Vec<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<Elicitation>,
}

pub async fn run_plan_handler(State(state): State<AppState>, Json(req): Json<RunPlanRequest>) -> Result<Json<RunPlanResponse>, ApiError> {
    let outcome = run_plan(&req.plan, state.tools.as_ref(), req.prior, &state.config.plan, &req.policy).await?;
    Ok(Json(RunPlanResponse {
        results: outcome.results,
        elicitation: outcome.elicitation,
    }))
}
