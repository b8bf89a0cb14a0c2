//! Axum handlers for the HTTP surface used by the telephony provider.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::{state::AppState, twiml};

/// Outcome of an outbound call request.
///
/// Failures are reported in the body with a `200` status.
#[derive(Serialize, ToSchema, Debug, PartialEq)]
#[serde(untagged)]
pub enum MakeCallResponse {
    Initiated { message: String, call_sid: String },
    Failed { error: String },
}

/// Place a call to the configured destination number.
#[utoipa::path(
    method(get, post),
    path = "/make-call",
    responses(
        (status = 200, description = "Call initiated, or the provider error", body = MakeCallResponse)
    )
)]
pub async fn make_call(State(state): State<Arc<AppState>>) -> Json<MakeCallResponse> {
    let callback_url = state.config.twiml_url();
    let to = &state.config.twilio.target_number;

    match state.call_trigger.trigger(to, &callback_url).await {
        Ok(call_sid) => Json(MakeCallResponse::Initiated {
            message: "Call initiated".to_string(),
            call_sid,
        }),
        Err(e) => {
            error!(error = %e, "Failed to initiate call");
            Json(MakeCallResponse::Failed {
                error: e.to_string(),
            })
        }
    }
}

/// Call-control instructions connecting the call to the relay WebSocket.
#[utoipa::path(
    method(get, post),
    path = "/twiml",
    responses(
        (status = 200, description = "TwiML document", content_type = "text/xml", body = String)
    )
)]
pub async fn twiml_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let xml = twiml::render(&state.config.relay_target());
    ([(header::CONTENT_TYPE, "text/xml")], xml)
}
