use serde_json::{json, Map, Value};

/// Recognized reasoning field names, in priority order.
///
/// Upstream providers disagree on the field that carries deliberation text;
/// adding a provider means appending its field name here, not adding a code
/// path.
pub const REASONING_FIELDS: [&str; 4] = ["reasoning_content", "reasoning", "thinking", "thought"];

/// Remove every recognized reasoning field from a streaming delta and return
/// the concatenation of their non-empty string values, in list order.
///
/// The fields are removed whether or not display is enabled for the request —
/// reasoning must never leak to the client inside a delta. Calling this twice
/// on the same delta returns an empty string.
pub fn extract_from_delta(delta: &mut Map<String, Value>) -> String {
    let mut extracted = String::new();
    for field in REASONING_FIELDS {
        if let Some(value) = delta.remove(field) {
            if let Some(text) = value.as_str() {
                extracted.push_str(text);
            }
        }
    }
    extracted
}

/// Return the first recognized reasoning field holding a non-empty string in
/// a complete (non-streamed) message, or `""` when none is present.
///
/// Non-destructive: in single-shot responses the reasoning field coexists
/// with the normal content.
#[must_use]
pub fn extract_from_message(message: &Map<String, Value>) -> &str {
    for field in REASONING_FIELDS {
        if let Some(text) = message.get(field).and_then(Value::as_str) {
            if !text.is_empty() {
                return text;
            }
        }
    }
    ""
}

/// Wrap accumulated reasoning text in the configured delimiter tags.
#[must_use]
pub fn think_block(open_tag: &str, close_tag: &str, reasoning: &str) -> String {
    let mut block =
        String::with_capacity(open_tag.len() + close_tag.len() + reasoning.len() + 4);
    block.push_str(open_tag);
    block.push('\n');
    block.push_str(reasoning);
    block.push('\n');
    block.push_str(close_tag);
    block.push_str("\n\n");
    block
}

/// The request-side hint that asks a thinking-capable upstream to emit its
/// reasoning channel.
#[must_use]
pub fn thinking_hint() -> Value {
    json!({"chat_template_kwargs": {"enable_thinking": true}})
}
