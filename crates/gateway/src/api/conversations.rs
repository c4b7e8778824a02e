//! Read-only conversation introspection: the conversation record itself
//! and its transcript.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use sa_core::to_transcript;

use crate::api::error::ApiError;
use crate::state::AppState;

pub async fn get_conversation(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let conversation = state.store.get_conversation(&id)?;
    Ok(Json(json!(conversation)))
}

pub async fn get_messages(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let messages = state.store.list_messages(&id)?;
    let entries = to_transcript(messages);
    Ok(Json(json!({ "messages": entries })))
}
