//! Liveness and self-description routes. Both are public — no bearer
//! token required — so load balancers and API explorers can reach them
//! without credentials.

use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// A hand-written summary of the exposed surface, not a generated
/// OpenAPI document — enough for a caller to discover route shapes
/// without digging through source.
pub async fn openapi_spec() -> impl IntoResponse {
    Json(json!({
        "openapi": "3.0.0",
        "info": { "title": "serialagent gateway", "version": env!("CARGO_PKG_VERSION") },
        "paths": {
            "/v1/health": { "get": { "summary": "liveness check" } },
            "/v1/roots/list": { "post": { "summary": "list the conversation store's roots" } },
            "/v1/sampling/createMessage": { "post": { "summary": "single-shot LLM completion" } },
            "/v1/elicitation/create": { "post": { "summary": "record, surface, and block on an elicitation" } },
            "/v1/plans/run": { "post": { "summary": "run a plan's steps against the tool registry" } },
            "/v1/conversations/{id}": { "get": { "summary": "fetch a conversation" } },
            "/v1/conversations/{id}/messages": { "get": { "summary": "fetch a conversation's transcript" } },
            "/v1/elicitations/{conv}/{elic}": { "get": { "summary": "fetch a persisted elicitation" } },
            "/v1/api/conversations/{conv}/elicitation/{elic}": { "post": { "summary": "resolve a pending elicitation" } }
        }
    }))
}
