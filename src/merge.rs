use serde_json::Value;

use crate::config::ReasoningConfig;
use crate::reasoning::thinking_hint;

/// Recursively merge `source` into `target`.
///
/// Rules:
/// - mapping into mapping merges key-by-key, recursing when both sides of a
///   key are mappings;
/// - any other pairing replaces the target value with a copy of the source
///   value — arrays are replaced wholesale, never concatenated;
/// - a `Null` source is treated as an absent fragment and leaves `target`
///   untouched.
///
/// Source trees are cloned on insert, so configuration fragments stay
/// pristine across requests.
pub fn deep_merge(target: &mut Value, source: &Value) {
    if source.is_null() {
        return;
    }
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(key) {
                    Some(target_value)
                        if target_value.is_object() && source_value.is_object() =>
                    {
                        deep_merge(target_value, source_value);
                    }
                    _ => {
                        target_map.insert(key.clone(), source_value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

/// Apply the configured override fragments to an outgoing request body.
///
/// Precedence, later merges winning on conflicting leaf keys:
/// 1. the thinking-mode hint (when `always_hint_thinking` is set),
/// 2. the global top-level fragment,
/// 3. the per-resolved-model top-level fragment,
/// 4. the global extra-body fragment,
/// 5. the per-resolved-model extra-body fragment.
///
/// Extra-body fragments land on the wire-level top level of the request,
/// which is where an OpenAI-client `extra_body` ends up after serialization.
pub fn apply_request_overrides(body: &mut Value, reasoning: &ReasoningConfig, model: &str) {
    if reasoning.always_hint_thinking {
        deep_merge(body, &thinking_hint());
    }
    deep_merge(body, &reasoning.request_overrides);
    if let Some(fragment) = reasoning.model_request_overrides.get(model) {
        deep_merge(body, fragment);
    }
    deep_merge(body, &reasoning.extra_body);
    if let Some(fragment) = reasoning.model_extra_body.get(model) {
        deep_merge(body, fragment);
    }
}
