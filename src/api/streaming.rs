use axum::response::Response;
use bytes::Bytes;
use futures_util::StreamExt;
use smallvec::SmallVec;

use crate::error::{upstream_error_message, ProxyError};
use crate::state::AppState;
use crate::stream::sse::sse_frame_stream;
use crate::stream::ReasoningTranscoder;

use super::verbatim_upstream_response;

#[inline]
fn sse_ok_response(body: axum::body::Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}

/// FIFO of translated frames not yet handed to the body stream. One upstream
/// frame can yield up to two downstream frames (synthesized block + data).
struct PendingBytes {
    chunks: SmallVec<[Bytes; 4]>,
    head: usize,
}

impl PendingBytes {
    #[inline]
    fn with_capacity(capacity: usize) -> Self {
        let mut chunks = SmallVec::new();
        chunks.reserve(capacity);
        Self { chunks, head: 0 }
    }

    #[inline]
    fn pop_front(&mut self) -> Option<Bytes> {
        if self.head >= self.chunks.len() {
            return None;
        }
        let chunk = std::mem::take(&mut self.chunks[self.head]);
        self.head += 1;
        if self.head == self.chunks.len() {
            self.chunks.clear();
            self.head = 0;
        }
        Some(chunk)
    }

    #[inline]
    fn extend_from(&mut self, frame_chunks: &mut Vec<Bytes>) {
        if frame_chunks.is_empty() {
            return;
        }
        self.chunks.reserve(frame_chunks.len());
        self.chunks.extend(frame_chunks.drain(..));
    }
}

#[inline]
fn emit_from_chunks(frame_chunks: &mut Vec<Bytes>, pending: &mut PendingBytes) -> Option<Bytes> {
    match frame_chunks.len() {
        0 => None,
        1 => frame_chunks.pop(),
        _ => {
            pending.extend_from(frame_chunks);
            pending.pop_front()
        }
    }
}

pub(crate) async fn handle_streaming_request(
    state: &AppState,
    upstream_body: Bytes,
    display: bool,
) -> Result<Response, ProxyError> {
    let response = state
        .transport
        .send_stream(
            state.upstream.chat_completions_url(),
            state.upstream.static_headers(),
            upstream_body,
        )
        .await?;

    let status = response.status();
    if status.is_client_error() {
        let content_type = response.headers().get(http::header::CONTENT_TYPE).cloned();
        let body_bytes = response.bytes().await.map_err(|err| {
            ProxyError::Transport(format!("Failed to read upstream error body: {err}"))
        })?;
        return Ok(verbatim_upstream_response(status, content_type, body_bytes));
    }
    if !status.is_success() {
        let body_bytes = response.bytes().await.map_err(|err| {
            ProxyError::Transport(format!("Failed to read upstream error body: {err}"))
        })?;
        return Err(ProxyError::Upstream {
            status: status.as_u16(),
            message: upstream_error_message(&body_bytes),
        });
    }

    let transcoder = ReasoningTranscoder::new(
        display,
        &state.config.reasoning.think_open_tag,
        &state.config.reasoning.think_close_tag,
    );
    Ok(build_translated_stream_response(
        response.bytes_stream(),
        transcoder,
    ))
}

/// Drive one streaming session: upstream bytes -> frames -> transcoder ->
/// downstream SSE body.
///
/// Dropping the returned response body (client disconnect) drops the unfold
/// state and the upstream body stream with it, releasing the session. When
/// the upstream ends — cleanly or on a transport error — the downstream body
/// simply ends; the streaming protocol has no mid-stream error frame.
pub(crate) fn build_translated_stream_response<E>(
    byte_stream: impl futures_util::Stream<Item = Result<Bytes, E>> + Send + 'static,
    transcoder: ReasoningTranscoder,
) -> Response
where
    E: std::fmt::Debug + Send + 'static,
{
    let frames = sse_frame_stream(byte_stream);
    let output_stream = futures_util::stream::unfold(
        (
            Box::pin(frames),
            transcoder,
            Vec::<Bytes>::with_capacity(4),
            PendingBytes::with_capacity(4),
            false,
        ),
        |(mut frame_stream, mut transcoder, mut frame_chunks, mut pending, mut finished)| async move {
            loop {
                if let Some(chunk) = pending.pop_front() {
                    return Some((
                        chunk,
                        (frame_stream, transcoder, frame_chunks, pending, finished),
                    ));
                }
                if finished {
                    return None;
                }
                if let Some(frame) = frame_stream.as_mut().next().await {
                    transcoder.transcode_frame_into(&frame, &mut frame_chunks);
                    if let Some(chunk) = emit_from_chunks(&mut frame_chunks, &mut pending) {
                        return Some((
                            chunk,
                            (frame_stream, transcoder, frame_chunks, pending, finished),
                        ));
                    }
                } else {
                    finished = true;
                }
            }
        },
    );

    let body = axum::body::Body::from_stream(
        output_stream.map(Ok::<Bytes, std::convert::Infallible>),
    );
    sse_ok_response(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sse_bytes(frames: &[&str]) -> Vec<Result<Bytes, std::convert::Infallible>> {
        frames
            .iter()
            .map(|frame| Ok(Bytes::from(format!("data: {frame}\n\n"))))
            .collect()
    }

    async fn collect_body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    #[tokio::test]
    async fn test_stream_response_order_with_display() {
        let chunk = |delta: serde_json::Value| {
            json!({
                "id": "chatcmpl-1",
                "object": "chat.completion.chunk",
                "created": 1,
                "model": "deepseek-r1",
                "choices": [{"index": 0, "delta": delta, "finish_reason": null}],
            })
            .to_string()
        };
        let source = futures_util::stream::iter(sse_bytes(&[
            &chunk(json!({"reasoning_content": "ab"})),
            &chunk(json!({"reasoning_content": "cd"})),
            &chunk(json!({"content": "hi"})),
            "[DONE]",
        ]));
        let response = build_translated_stream_response(
            source,
            ReasoningTranscoder::new(true, "<think>", "</think>"),
        );
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        let body = collect_body(response).await;
        let think_pos = body.find("<think>\\nabcd\\n</think>").expect("think block");
        let content_pos = body.find("\"hi\"").expect("content frame");
        let done_pos = body.find("data: [DONE]").expect("done frame");
        assert!(think_pos < content_pos);
        assert!(content_pos < done_pos);
        assert!(!body.contains("reasoning_content"));
    }

    #[tokio::test]
    async fn test_stream_ends_cleanly_without_done_on_upstream_eof() {
        let source = futures_util::stream::iter(sse_bytes(&[
            r#"{"choices":[{"index":0,"delta":{"content":"partial"}}]}"#,
        ]));
        let response = build_translated_stream_response(
            source,
            ReasoningTranscoder::new(false, "<think>", "</think>"),
        );
        let body = collect_body(response).await;
        assert!(body.contains("partial"));
        // No synthesized error envelope and no synthesized terminal frame.
        assert!(!body.contains("[DONE]"));
        assert!(!body.contains("error"));
    }
}
