/// SSE frame reader, encoder helpers, and stream utilities.
///
/// The upstream speaks the OpenAI streaming dialect: one event per
/// `data: <payload>` line, blank-line separated, terminated by a
/// `data: [DONE]` sentinel. The reader splits on line boundaries only —
/// a frame is never emitted from a partial line, and trailing partial
/// lines are carried across chunk boundaries.
use super::SseFrame;
use futures_util::Stream;
use memchr::memchr_iter;
use std::collections::VecDeque;

const DONE_SENTINEL: &str = "[DONE]";
const DONE_FRAME: &str = "data: [DONE]\n\n";

// ---------------------------------------------------------------------------
// SseFrameReader — incremental line decoder
// ---------------------------------------------------------------------------

/// Incremental SSE frame reader.
///
/// Feed it raw text chunks (arriving at arbitrary byte boundaries) and it
/// yields fully-assembled [`SseFrame`]s. Lines that do not start with the
/// `data:` event prefix (blank separators, `:` comments, named-event lines)
/// are discarded silently.
pub struct SseFrameReader {
    buffer: String,
    read_offset: usize,
}

impl SseFrameReader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            read_offset: 0,
        }
    }

    /// Feed raw text and return any complete frames decoded from it.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseFrame> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed raw text and append complete frames into a caller-provided buffer.
    pub fn feed_into(&mut self, chunk: &str, out: &mut Vec<SseFrame>) {
        self.buffer.push_str(chunk);
        let mut processed_up_to = self.read_offset;
        let scan_start = processed_up_to;
        let bytes = self.buffer.as_bytes();
        for rel_pos in memchr_iter(b'\n', &bytes[scan_start..]) {
            let line_end = scan_start + rel_pos;
            let mut line = &self.buffer[processed_up_to..line_end];
            if let Some(stripped) = line.strip_suffix('\r') {
                line = stripped;
            }
            if let Some(frame) = classify_line(line) {
                out.push(frame);
            }
            processed_up_to = line_end + 1;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }
}

impl Default for SseFrameReader {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_line(line: &str) -> Option<SseFrame> {
    let payload = line.strip_prefix("data:")?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.trim() == DONE_SENTINEL {
        Some(SseFrame::Done)
    } else {
        Some(SseFrame::Data(payload.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

/// Format a downstream SSE frame (no event type, just data).
#[must_use]
pub fn data_frame(json: &str) -> String {
    let mut out = String::with_capacity(10 + json.len());
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    out
}

/// Format the `[DONE]` terminal frame as SSE text.
#[must_use]
pub fn done_frame() -> String {
    DONE_FRAME.to_owned()
}

// ---------------------------------------------------------------------------
// Stream utility
// ---------------------------------------------------------------------------

/// Split a byte stream into frames using [`SseFrameReader`].
///
/// Bytes arriving from an HTTP response body are decoded as UTF-8 (split
/// multi-byte sequences carried across chunk boundaries), fed into the
/// reader, and complete [`SseFrame`]s are yielded one at a time.
pub fn sse_frame_stream<S, E>(byte_stream: S) -> impl Stream<Item = SseFrame> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Debug + Send + 'static,
{
    use futures_util::StreamExt;

    futures_util::stream::unfold(
        (
            Box::pin(byte_stream),
            SseFrameReader::new(),
            Vec::<u8>::new(),
            Vec::<SseFrame>::with_capacity(8),
            VecDeque::<SseFrame>::with_capacity(8),
        ),
        |(mut stream, mut reader, mut remainder, mut parsed, mut pending)| async move {
            loop {
                if let Some(frame) = pending.pop_front() {
                    return Some((frame, (stream, reader, remainder, parsed, pending)));
                }

                let chunk = stream.as_mut().next().await?;
                if let Ok(bytes) = chunk {
                    feed_chunk(&mut reader, &mut remainder, bytes.as_ref(), &mut parsed);
                    if !parsed.is_empty() {
                        pending.extend(parsed.drain(..));
                        if let Some(first) = pending.pop_front() {
                            return Some((first, (stream, reader, remainder, parsed, pending)));
                        }
                    }
                }
                // Transport errors end the frame stream; the caller closes the
                // downstream body without an error envelope.
            }
        },
    )
}

fn feed_chunk(
    reader: &mut SseFrameReader,
    remainder: &mut Vec<u8>,
    bytes: &[u8],
    parsed: &mut Vec<SseFrame>,
) {
    if remainder.is_empty() {
        match std::str::from_utf8(bytes) {
            Ok(text) => reader.feed_into(text, parsed),
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                let text = std::str::from_utf8(&bytes[..valid_up_to]).unwrap_or_default();
                reader.feed_into(text, parsed);
                remainder.extend_from_slice(&bytes[valid_up_to..]);
            }
        }
        return;
    }

    remainder.extend_from_slice(bytes);
    match std::str::from_utf8(remainder.as_slice()) {
        Ok(text) => {
            reader.feed_into(text, parsed);
            remainder.clear();
        }
        Err(e) => {
            let valid_up_to = e.valid_up_to();
            let text = std::str::from_utf8(&remainder[..valid_up_to]).unwrap_or_default();
            reader.feed_into(text, parsed);
            remainder.drain(..valid_up_to);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
