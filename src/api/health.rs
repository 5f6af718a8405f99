use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and config summary.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "reasonify is running",
        "config": {
            "upstream_base_url": config.upstream.base_url,
            "model_aliases_count": config.upstream.model_aliases.len(),
            "reasoning": {
                "display_models": config.reasoning.display_models,
                "think_open_tag": config.reasoning.think_open_tag,
                "think_close_tag": config.reasoning.think_close_tag,
                "always_hint_thinking": config.reasoning.always_hint_thinking,
            }
        }
    }))
}
