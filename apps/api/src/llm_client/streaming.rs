//! Server-Sent Events parsing for streaming Messages API responses.
//!
//! Only the events that matter for free-text generation are surfaced:
//! - `content_block_delta` with a `text_delta` -> a text chunk
//! - `message_stop` (or a bare `[DONE]`) -> the end-of-stream chunk
//! - `error` -> a channel error
//!
//! Everything else (`message_start`, `ping`, `content_block_start`, ...) is skipped.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::patch::{ChunkReader, StreamChunk, StreamError};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SseEvent {
    ContentBlockDelta { delta: SseDelta },
    MessageStop,
    Error { error: SseErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SseDelta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct SseErrorBody {
    message: String,
}

/// Turns the `data:` payload of one SSE event into a chunk, if it carries one.
fn parse_event_data(data: &str) -> Option<Result<StreamChunk, StreamError>> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(StreamChunk::done()));
    }

    match serde_json::from_str::<SseEvent>(data) {
        Ok(SseEvent::ContentBlockDelta {
            delta: SseDelta::TextDelta { text },
        }) => Some(Ok(StreamChunk::text(text))),
        Ok(SseEvent::MessageStop) => Some(Ok(StreamChunk::done())),
        Ok(SseEvent::Error { error }) => Some(Err(StreamError::Channel(error.message))),
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to parse SSE event: {e} - Data: {data}");
            Some(Err(StreamError::Channel(format!("Malformed stream event: {e}"))))
        }
    }
}

/// Extracts the joined `data:` lines of a single raw SSE event block.
fn event_data(block: &str) -> Option<String> {
    let lines: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

struct SseState<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<StreamChunk, StreamError>>,
    finished: bool,
}

impl<S> SseState<S> {
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes.iter().filter(|&&b| b != b'\r'));
        self.drain_complete_events();
    }

    fn drain_complete_events(&mut self) {
        while let Some(pos) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            self.queue_block(&block);
        }
    }

    /// Flushes a trailing event that was not terminated by a blank line.
    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            let block = std::mem::take(&mut self.buffer);
            self.queue_block(&block);
        }
    }

    fn queue_block(&mut self, block: &[u8]) {
        // Events are split on complete blocks, so multi-byte characters are never cut.
        let block = String::from_utf8_lossy(block);
        if let Some(chunk) = event_data(&block).and_then(|data| parse_event_data(&data)) {
            self.pending.push_back(chunk);
        }
    }
}

/// Adapts a raw SSE byte stream into a reader of text chunks.
///
/// The reader ends right after the first end-of-stream chunk or error.
/// If the bytes run out first, it simply ends and the consumer reports truncation.
pub fn sse_text_stream<S, E>(bytes: S) -> ChunkReader
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = SseState {
        inner: Box::pin(bytes),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let stream = futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                let terminal = matches!(item, Ok(StreamChunk { done: true, .. }) | Err(_));
                if terminal {
                    st.finished = true;
                    st.pending.clear();
                }
                return Some((item, st));
            }
            if st.finished {
                return None;
            }

            match st.inner.next().await {
                Some(Ok(bytes)) => st.push_bytes(&bytes),
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(StreamError::Channel(e.to_string())), st));
                }
                None => {
                    debug!("SSE byte stream ended");
                    st.flush();
                    st.finished = true;
                }
            }
        }
    });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_stream(parts: Vec<&'static str>) -> impl Stream<Item = Result<Bytes, String>> + Send {
        futures::stream::iter(
            parts
                .into_iter()
                .map(|p| Ok::<_, String>(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(reader: ChunkReader) -> Vec<Result<StreamChunk, StreamError>> {
        reader.collect().await
    }

    const DELTA_HEL: &str = "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n";
    const DELTA_LO: &str = "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"lo\"}}\n\n";
    const PING: &str = "event: ping\ndata: {\"type\":\"ping\"}\n\n";
    const STOP: &str = "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n";

    #[tokio::test]
    async fn test_text_deltas_then_done() {
        let reader = sse_text_stream(byte_stream(vec![DELTA_HEL, PING, DELTA_LO, STOP]));
        let items = collect(reader).await;
        assert_eq!(
            items,
            vec![
                Ok(StreamChunk::text("Hel")),
                Ok(StreamChunk::text("lo")),
                Ok(StreamChunk::done()),
            ]
        );
    }

    #[tokio::test]
    async fn test_event_split_across_byte_chunks() {
        let (a, b) = DELTA_HEL.split_at(40);
        let reader = sse_text_stream(byte_stream(vec![a, b, STOP]));
        let items = collect(reader).await;
        assert_eq!(items[0], Ok(StreamChunk::text("Hel")));
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_crlf_line_endings() {
        let reader = sse_text_stream(byte_stream(vec![
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\r\n\r\n",
            "data: {\"type\":\"message_stop\"}\r\n\r\n",
        ]));
        let items = collect(reader).await;
        assert_eq!(items, vec![Ok(StreamChunk::text("Hi")), Ok(StreamChunk::done())]);
    }

    #[tokio::test]
    async fn test_error_event_ends_stream() {
        let reader = sse_text_stream(byte_stream(vec![
            DELTA_HEL,
            "event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
            DELTA_LO,
        ]));
        let items = collect(reader).await;
        assert_eq!(
            items,
            vec![
                Ok(StreamChunk::text("Hel")),
                Err(StreamError::Channel("Overloaded".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_error_surfaces_as_channel_error() {
        let parts: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(DELTA_HEL.as_bytes())),
            Err("connection reset".to_string()),
        ];
        let items = collect(sse_text_stream(futures::stream::iter(parts))).await;
        assert_eq!(items[1], Err(StreamError::Channel("connection reset".to_string())));
    }

    #[tokio::test]
    async fn test_missing_stop_just_ends() {
        let items = collect(sse_text_stream(byte_stream(vec![DELTA_HEL]))).await;
        assert_eq!(items, vec![Ok(StreamChunk::text("Hel"))]);
    }

    #[test]
    fn test_done_sentinel() {
        assert_eq!(parse_event_data("[DONE]"), Some(Ok(StreamChunk::done())));
        assert_eq!(parse_event_data("  "), None);
    }

    #[test]
    fn test_non_text_delta_is_skipped() {
        let data = r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{"}}"#;
        assert_eq!(parse_event_data(data), None);
    }
}
