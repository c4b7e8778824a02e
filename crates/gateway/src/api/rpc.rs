//! The three MCP-flavored methods, each exposed as its own flat REST
//! route rather than a JSON-RPC envelope — the rest of this surface is
//! flat REST, so the method names are kept for familiarity but the
//! transport isn't.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use sa_core::CancelToken;
use sa_domain::llm::LlmRequest;
use sa_domain::model::{Elicitation, Role};

use crate::api::error::ApiError;
use crate::state::AppState;

pub async fn list_roots(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "roots": [
            {
                "uri": format!("file://{}", state.config.store.data_dir.display()),
                "name": "conversations",
            }
        ]
    }))
}

pub async fn create_message(State(state): State<AppState>, Json(req): Json<LlmRequest>) -> Result<Json<Value>, ApiError> {
    let response = state.llm.generate(req).await?;
    Ok(Json(json!({ "text": response.text, "usage": response.usage })))
}

#[derive(Debug, Deserialize)]
pub struct CreateElicitationRequest {
    pub conversation_id: String,
    pub turn_id: String,
    #[serde(default)]
    pub parent_message_id: Option<String>,
    #[serde(default = "default_role")]
    pub role: Role,
    pub elicitation: Elicitation,
}

fn default_role() -> Role {
    Role::Assistant
}

/// Blocks for the lifetime of the request — MCP's `elicitation/create`
/// is itself a blocking call, so there's no separate poll route for it.
pub async fn create_elicitation(State(state): State<AppState>, Json(req): Json<CreateElicitationRequest>) -> Result<Json<Value>, ApiError> {
    let message = state
        .elicitation
        .record(&req.conversation_id, &req.turn_id, req.parent_message_id, req.role, req.elicitation)?;
    state.elicitation.duplicate_to_root(&message)?;

    let elicitation_id = message
        .elicitation_id
        .clone()
        .ok_or_else(|| sa_domain::Error::Internal("recorded message is missing its elicitation id".into()))?;

    let result = state
        .elicitation
        .wait(&req.conversation_id, &elicitation_id, CancelToken::new())
        .await?;

    Ok(Json(json!({
        "action": result.action,
        "payload": result.payload,
        "reason": result.reason,
    })))
}
