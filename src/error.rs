use serde_json::{json, Value};

/// Canonical error type used across all modules.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ProxyError {
    /// HTTP status code carried by the downstream error envelope.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::InvalidRequest(_) => 400,
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::Config(_) | ProxyError::Transport(_) => 500,
        }
    }
}

/// Build the downstream error envelope.
///
/// Every error the proxy originates uses the same shape, with the HTTP
/// status mirrored into the numeric `code` field.
#[must_use]
pub fn error_payload(message: &str, code: u16) -> Value {
    json!({
        "error": {
            "message": message,
            "type": "invalid_request_error",
            "code": code,
        }
    })
}

/// Format an error as (status, JSON body) for the downstream client.
#[must_use]
pub fn format_error(err: &ProxyError) -> (http::StatusCode, Value) {
    let code = err.status_code();
    let status =
        http::StatusCode::from_u16(code).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
    let message = match err {
        ProxyError::InvalidRequest(msg)
        | ProxyError::Config(msg)
        | ProxyError::Transport(msg) => msg.clone(),
        ProxyError::Upstream { message, .. } => message.clone(),
    };
    (status, error_payload(&message, code))
}

impl axum::response::IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        use axum::response::IntoResponse;
        let (status, body) = format_error(&self);
        (status, axum::Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Upstream error body handling
// ---------------------------------------------------------------------------

const MAX_MESSAGE_LEN: usize = 500;

fn truncated(msg: &str) -> String {
    if msg.len() > MAX_MESSAGE_LEN {
        let mut end = MAX_MESSAGE_LEN;
        while !msg.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &msg[..end])
    } else {
        msg.to_string()
    }
}

/// Extract the best available message from an upstream failure body.
///
/// Lookup order: a bare JSON string body, `error.message`, a top-level
/// `message`, the raw body text, then a generic fallback. Messages are
/// truncated to avoid relaying unbounded upstream payloads.
#[must_use]
pub fn upstream_error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(msg) = value.as_str() {
            return truncated(msg);
        }
        if let Some(msg) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
        {
            return truncated(msg);
        }
        if let Some(msg) = value.get("message").and_then(Value::as_str) {
            return truncated(msg);
        }
    }

    let raw = String::from_utf8_lossy(body);
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        "Upstream request failed".to_string()
    } else {
        truncated(trimmed)
    }
}
