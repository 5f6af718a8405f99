use axum::response::Response;
use bytes::Bytes;
use serde_json::{json, Value};

use crate::config::ReasoningConfig;
use crate::error::{upstream_error_message, ProxyError};
use crate::reasoning::{extract_from_message, think_block};
use crate::state::AppState;

use super::verbatim_upstream_response;

#[inline]
fn ok_json_response(body_bytes: Bytes) -> Response {
    let mut response = Response::new(axum::body::Body::from(body_bytes));
    *response.status_mut() = http::StatusCode::OK;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    response
}

pub(crate) async fn handle_non_streaming_request(
    state: &AppState,
    upstream_body: Bytes,
    client_model: &str,
    display: bool,
) -> Result<Response, ProxyError> {
    let response = state
        .transport
        .send(
            state.upstream.chat_completions_url(),
            state.upstream.static_headers(),
            upstream_body,
        )
        .await?;

    let status = response.status();
    let content_type = response.headers().get(http::header::CONTENT_TYPE).cloned();
    let body_bytes = response.bytes().await.map_err(|err| {
        ProxyError::Transport(format!("Failed to read upstream response body: {err}"))
    })?;

    if status.is_client_error() {
        return Ok(verbatim_upstream_response(status, content_type, body_bytes));
    }
    if !status.is_success() {
        return Err(ProxyError::Upstream {
            status: status.as_u16(),
            message: upstream_error_message(&body_bytes),
        });
    }

    // Best-effort parsing only: an unparseable success body is forwarded
    // untouched rather than rejected.
    let Ok(mut completion) = serde_json::from_slice::<Value>(&body_bytes) else {
        return Ok(ok_json_response(body_bytes));
    };

    translate_completion(
        &mut completion,
        client_model,
        display,
        &state.config.reasoning,
    );
    let encoded =
        serde_json::to_vec(&completion).unwrap_or_else(|_| body_bytes.to_vec());
    Ok(ok_json_response(Bytes::from(encoded)))
}

/// Single-pass translation of a complete (non-streamed) upstream response.
///
/// - echoes the client-requested model name,
/// - with display enabled, prepends the delimiter-wrapped reasoning block to
///   each choice's content,
/// - defaults a missing `finish_reason` to `"stop"` and a missing `usage`
///   to all-zero counters.
pub(crate) fn translate_completion(
    completion: &mut Value,
    client_model: &str,
    display: bool,
    reasoning: &ReasoningConfig,
) {
    if let Some(envelope) = completion.as_object_mut() {
        envelope.insert(
            "model".to_string(),
            Value::String(client_model.to_string()),
        );
        if envelope.get("usage").is_none_or(Value::is_null) {
            envelope.insert(
                "usage".to_string(),
                json!({"prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0}),
            );
        }
    }

    let Some(choices) = completion
        .get_mut("choices")
        .and_then(Value::as_array_mut)
    else {
        return;
    };

    for choice in choices {
        let Some(choice) = choice.as_object_mut() else {
            continue;
        };

        if display {
            if let Some(message) = choice.get_mut("message").and_then(Value::as_object_mut) {
                let extracted = extract_from_message(message).to_string();
                if !extracted.is_empty() {
                    let block = think_block(
                        &reasoning.think_open_tag,
                        &reasoning.think_close_tag,
                        &extracted,
                    );
                    let existing = message
                        .get("content")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    let content = format!("{block}{existing}");
                    message.insert("content".to_string(), Value::String(content));
                }
            }
        }

        if choice.get("finish_reason").is_none_or(Value::is_null) {
            choice.insert("finish_reason".to_string(), Value::String("stop".to_string()));
        }
    }
}
