//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the call endpoints, the relay WebSocket and OpenAPI documentation.

use crate::{
    handlers::{self, MakeCallResponse},
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::make_call, handlers::twiml_endpoint),
    components(schemas(MakeCallResponse)),
    tags(
        (name = "Call Relay", description = "Phone call relay between Twilio ConversationRelay and a language model")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route(
            "/make-call",
            get(handlers::make_call).post(handlers::make_call),
        )
        .route(
            "/twiml",
            post(handlers::twiml_endpoint).get(handlers::twiml_endpoint),
        )
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
