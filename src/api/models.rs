use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use bytes::Bytes;
use serde_json::json;

use crate::routing::ModelTable;
use crate::state::AppState;
use crate::util::unix_now_secs;

/// Serve the startup-prebuilt model list.
///
/// The alias table is fixed at startup, so the body never changes.
pub(crate) fn handler(State(state): State<Arc<AppState>>) -> Response {
    let mut response = Response::new(axum::body::Body::from(state.models_response_body()));
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    response
}

/// Build the `/v1/models` response body from the alias table: every
/// client-facing alias plus every upstream model name, deduplicated.
pub(crate) fn build_models_response_body(table: &ModelTable) -> Bytes {
    let created = unix_now_secs();
    let ids: BTreeSet<&str> = table
        .entries()
        .flat_map(|(alias, model)| [alias, model])
        .collect();

    let data: Vec<_> = ids
        .into_iter()
        .map(|id| {
            json!({
                "id": id,
                "object": "model",
                "created": created,
                "owned_by": "reasonify",
            })
        })
        .collect();

    let body = json!({"object": "list", "data": data});
    Bytes::from(serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec()))
}
