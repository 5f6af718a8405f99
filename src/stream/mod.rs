pub mod sse;
pub mod transcoder;

pub use sse::{sse_frame_stream, SseFrameReader};
pub use transcoder::ReasoningTranscoder;

/// One decoded event from the upstream line-oriented stream.
///
/// `Data` carries the raw payload string for the caller to JSON-parse;
/// payloads that fail to parse degrade to raw passthrough downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Data(String),
    Done,
}
