pub(crate) mod chat;
pub(crate) mod health;
pub(crate) mod models;
pub(crate) mod non_streaming;
pub(crate) mod streaming;

use axum::response::Response;

/// Forward an upstream response downstream without translation.
///
/// Used for upstream client-error-class (4xx) responses: the engine does not
/// reinterpret upstream error payloads as success, so status and body pass
/// through verbatim.
pub(crate) fn verbatim_upstream_response(
    status: http::StatusCode,
    content_type: Option<http::HeaderValue>,
    body_bytes: bytes::Bytes,
) -> Response {
    let mut response = Response::new(axum::body::Body::from(body_bytes));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        content_type.unwrap_or_else(|| http::HeaderValue::from_static("application/json")),
    );
    response
}
