use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::{json, Value};

use crate::error::ProxyError;
use crate::merge::apply_request_overrides;
use crate::state::AppState;

use super::{non_streaming, streaming};

/// `/v1/chat/completions` handler: validate, augment, forward, translate.
pub(crate) async fn handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match handle_chat(&state, &body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle_chat(state: &AppState, body: &Bytes) -> Result<Response, ProxyError> {
    let mut request: Value = serde_json::from_slice(body).map_err(|err| {
        ProxyError::InvalidRequest(format!("Invalid chat completion request body: {err}"))
    })?;

    // Validation happens before any upstream call: a malformed request must
    // never reach the upstream service.
    let client_model = probe_request(&request)?;
    let resolved_model = state.model_table.resolve(&client_model).to_string();
    let display_enabled = state.config.reasoning.display_enabled_for(&resolved_model);
    let stream = request
        .get("stream")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    augment_request(&mut request, &state.config.reasoning, &resolved_model);
    let upstream_body = Bytes::from(serde_json::to_vec(&request).map_err(|err| {
        ProxyError::InvalidRequest(format!("Failed to encode upstream request: {err}"))
    })?);

    let request_id = state.request_uuid(state.next_request_seq());
    tracing::info!(
        %request_id,
        model = %client_model,
        resolved_model = %resolved_model,
        stream,
        reasoning_display = display_enabled,
        "chat completion request"
    );

    if stream {
        streaming::handle_streaming_request(state, upstream_body, display_enabled).await
    } else {
        non_streaming::handle_non_streaming_request(state, upstream_body, &client_model, display_enabled)
            .await
    }
}

/// Check the inbound request shape and return the requested model name.
///
/// Only the documented checks are applied: `model` must be a string and
/// `messages` a non-empty array. Message elements are not validated.
fn probe_request(request: &Value) -> Result<String, ProxyError> {
    let model = request
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| ProxyError::InvalidRequest("'model' must be a string".to_string()))?;

    let messages = request
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| ProxyError::InvalidRequest("'messages' must be an array".to_string()))?;
    if messages.is_empty() {
        return Err(ProxyError::InvalidRequest(
            "'messages' must not be empty".to_string(),
        ));
    }

    Ok(model.to_string())
}

/// Build the outgoing request body: resolved model, defaults, then the
/// override fragment chain.
fn augment_request(
    request: &mut Value,
    reasoning: &crate::config::ReasoningConfig,
    resolved_model: &str,
) {
    if let Some(body) = request.as_object_mut() {
        body.insert(
            "model".to_string(),
            Value::String(resolved_model.to_string()),
        );
        body.entry("temperature").or_insert(json!(0.6));
        body.entry("max_tokens").or_insert(json!(1024));
    }
    apply_request_overrides(request, reasoning, resolved_model);
}
