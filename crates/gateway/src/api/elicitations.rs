//! Elicitation introspection and resolution.
//!
//! `get_elicitation` reads the persisted state back out of its control
//! message; `resolve_elicitation` is the inbound callback a client
//! posts to once the user has acted on a pending elicitation.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use sa_domain::model::Elicitation;

use crate::api::error::ApiError;
use crate::state::AppState;

pub async fn get_elicitation(
    State(state): State<AppState>,
    Path((conversation_id, elicitation_id)): Path<(String, String)>,
) -> Result<Json<Elicitation>, ApiError> {
    let message = state.store.get_message_by_elicitation(&conversation_id, &elicitation_id)?;
    let elicitation: Elicitation = serde_json::from_str(&message.content)
        .map_err(|e| sa_domain::Error::Schema(format!("stored elicitation content did not decode: {e}")))?;
    Ok(Json(elicitation))
}

#[derive(Debug, Deserialize)]
pub struct ResolveElicitationRequest {
    pub action: String,
    #[serde(default)]
    pub payload: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn resolve_elicitation(
    State(state): State<AppState>,
    Path((conversation_id, elicitation_id)): Path<(String, String)>,
    Json(req): Json<ResolveElicitationRequest>,
) -> Result<Json<Value>, ApiError> {
    let delivered = state
        .elicitation
        .resolve(&conversation_id, &elicitation_id, &req.action, req.payload, req.reason)?;
    Ok(Json(serde_json::json!({ "delivered": delivered })))
}
