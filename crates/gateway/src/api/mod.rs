//! Router assembly: a public group (health, self-description) and a
//! bearer-token-protected group (everything that touches the
//! coordination core), merged and traced.

pub mod auth;
pub mod conversations;
pub mod elicitations;
pub mod error;
pub mod health;
pub mod plans;
pub mod rpc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/v1/health", get(health::health))
        .route("/v1/openapi.json", get(health::openapi_spec));

    let protected = Router::new()
        .route("/v1/roots/list", post(rpc::list_roots))
        .route("/v1/sampling/createMessage", post(rpc::create_message))
        .route("/v1/elicitation/create", post(rpc::create_elicitation))
        .route("/v1/plans/run", post(plans::run_plan_handler))
        .route("/v1/conversations/:id", get(conversations::get_conversation))
        .route("/v1/conversations/:id/messages", get(conversations::get_messages))
        .route("/v1/elicitations/:conv/:elic", get(elicitations::get_elicitation))
        .route(
            "/v1/api/conversations/:conv/elicitation/:elic",
            post(elicitations::resolve_elicitation),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_token));

    public.merge(protected).layer(TraceLayer::new_for_http()).with_state(state)
}
