use bytes::Bytes;
use serde_json::{json, Map, Value};

use super::sse::{data_frame, done_frame};
use super::SseFrame;
use crate::reasoning::{extract_from_delta, think_block};

/// Per-session streaming translator.
///
/// Sits between the upstream frame stream and the client. With reasoning
/// display enabled it accumulates reasoning deltas until the first
/// content-bearing frame, then emits the whole buffer once as a single
/// delimiter-wrapped chunk. With display disabled it strips reasoning
/// fields from every delta. Either way, recognized reasoning fields never
/// reach the client inside a delta.
///
/// Session invariants: the accumulator is appended to only while
/// `reasoning_emitted` is false; `[DONE]` is forwarded exactly once and
/// no frame is processed after it.
pub struct ReasoningTranscoder {
    display: bool,
    open_tag: String,
    close_tag: String,
    reasoning: String,
    reasoning_emitted: bool,
    done_sent: bool,
    envelope: Option<ChunkEnvelope>,
}

/// Envelope fields of the most recent upstream chunk, reused when a chunk is
/// synthesized (the upstream may already be past its last data frame).
struct ChunkEnvelope {
    id: Value,
    created: Value,
    model: Value,
}

impl ReasoningTranscoder {
    #[must_use]
    pub fn new(display: bool, open_tag: &str, close_tag: &str) -> Self {
        Self {
            display,
            open_tag: open_tag.to_string(),
            close_tag: close_tag.to_string(),
            reasoning: String::new(),
            reasoning_emitted: false,
            done_sent: false,
            envelope: None,
        }
    }

    /// Process one upstream frame and append downstream SSE bytes to `output`.
    pub fn transcode_frame_into(&mut self, frame: &SseFrame, output: &mut Vec<Bytes>) {
        if self.done_sent {
            return;
        }
        match frame {
            SseFrame::Done => {
                if self.display && !self.reasoning_emitted && !self.reasoning.is_empty() {
                    // The model finished without ever emitting displayable
                    // content; flush the block before the terminal sentinel.
                    let block = self.reasoning_block_chunk();
                    output.push(encode_chunk(&block));
                    self.reasoning_emitted = true;
                }
                output.push(Bytes::from(done_frame()));
                self.done_sent = true;
            }
            SseFrame::Data(payload) => self.transcode_data_frame(payload, output),
        }
    }

    fn transcode_data_frame(&mut self, payload: &str, output: &mut Vec<Bytes>) {
        let Ok(mut chunk) = serde_json::from_str::<Value>(payload) else {
            // Non-JSON payload (vendor keep-alive): forward byte-for-byte in
            // the downstream line format.
            output.push(Bytes::from(data_frame(payload)));
            return;
        };

        self.remember_envelope(&chunk);

        let Some((extracted, has_content)) = sanitize_first_delta(&mut chunk) else {
            // No delta to translate; forward the payload untouched.
            output.push(Bytes::from(data_frame(payload)));
            return;
        };

        if !self.display {
            output.push(encode_chunk(&chunk));
            return;
        }

        if !self.reasoning_emitted && !extracted.is_empty() {
            self.reasoning.push_str(&extracted);
        }

        if !has_content && !extracted.is_empty() && !has_finish_reason(&chunk) {
            // Pure reasoning with nothing to display alongside.
            return;
        }

        if has_content && !self.reasoning_emitted && !self.reasoning.is_empty() {
            let block = self.reasoning_block_chunk();
            output.push(encode_chunk(&block));
            self.reasoning_emitted = true;
        }

        output.push(encode_chunk(&chunk));
    }

    fn remember_envelope(&mut self, chunk: &Value) {
        if chunk.get("id").is_some() || chunk.get("model").is_some() {
            self.envelope = Some(ChunkEnvelope {
                id: chunk.get("id").cloned().unwrap_or(Value::Null),
                created: chunk.get("created").cloned().unwrap_or(Value::Null),
                model: chunk.get("model").cloned().unwrap_or(Value::Null),
            });
        }
    }

    fn reasoning_block_chunk(&self) -> Value {
        let content = think_block(&self.open_tag, &self.close_tag, &self.reasoning);
        let (id, created, model) = match &self.envelope {
            Some(envelope) => (
                envelope.id.clone(),
                envelope.created.clone(),
                envelope.model.clone(),
            ),
            None => (Value::Null, Value::Null, Value::Null),
        };
        json!({
            "id": id,
            "object": "chat.completion.chunk",
            "created": created,
            "model": model,
            "choices": [{
                "index": 0,
                "delta": {"content": content},
                "finish_reason": null,
            }],
        })
    }
}

/// Strip reasoning fields from `choices[0].delta` and report what was found.
///
/// Returns `None` when the chunk has no delta object. Otherwise returns the
/// extracted reasoning text and whether the delta carries non-empty content.
/// When the sanitized delta is left without a content string, an explicit
/// empty string is inserted so strict downstream parsers always see the key.
fn sanitize_first_delta(chunk: &mut Value) -> Option<(String, bool)> {
    let delta = first_choice_delta(chunk)?;
    let extracted = extract_from_delta(delta);
    let has_content = delta
        .get("content")
        .and_then(Value::as_str)
        .is_some_and(|text| !text.is_empty());
    if delta.get("content").is_none_or(Value::is_null) {
        delta.insert("content".to_string(), Value::String(String::new()));
    }
    Some((extracted, has_content))
}

fn first_choice_delta(chunk: &mut Value) -> Option<&mut Map<String, Value>> {
    chunk
        .get_mut("choices")?
        .as_array_mut()?
        .get_mut(0)?
        .get_mut("delta")?
        .as_object_mut()
}

fn has_finish_reason(chunk: &Value) -> bool {
    chunk
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("finish_reason"))
        .is_some_and(|reason| !reason.is_null())
}

fn encode_chunk(chunk: &Value) -> Bytes {
    let encoded = serde_json::to_string(chunk).unwrap_or_else(|_| String::from("{}"));
    Bytes::from(data_frame(&encoded))
}
