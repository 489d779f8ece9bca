//! Accumulates incrementally generated text into a single value.
//!
//! The accumulator owns the reader it is given. The reader is dropped as soon
//! as the end-of-stream signal is seen, on the first channel error, on an
//! explicit `release()`, or when the accumulator itself is dropped. Whatever
//! text arrived before any of those stays readable.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use thiserror::Error;
use tracing::debug;

/// One unit from a generation channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub text: String,
    /// Set on the final chunk; `text` may be empty.
    pub done: bool,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }

    pub fn done() -> Self {
        Self {
            text: String::new(),
            done: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("Generation channel failed: {0}")]
    Channel(String),

    #[error("Generation channel closed before end of stream")]
    Truncated,

    #[error("Stream was released before completion")]
    Released,
}

/// A stream error together with the text received before it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error} (after {} bytes)", partial.len())]
pub struct StreamFailure {
    pub partial: String,
    pub error: StreamError,
}

pub type ChunkReader = Pin<Box<dyn Stream<Item = Result<StreamChunk, StreamError>> + Send>>;

pub struct StreamAccumulator {
    reader: Option<ChunkReader>,
    text: String,
    complete: bool,
}

impl StreamAccumulator {
    pub fn new(reader: ChunkReader) -> Self {
        Self {
            reader: Some(reader),
            text: String::new(),
            complete: false,
        }
    }

    /// Appends `chunk` and returns the accumulated text.
    pub fn on_chunk(&mut self, chunk: &str) -> &str {
        self.text.push_str(chunk);
        &self.text
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// True while the underlying reader is still held.
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Drops the reader. Safe to call at any point, any number of times.
    pub fn release(&mut self) {
        if self.reader.take().is_some() {
            debug!(
                "Released generation reader (complete={}, {} bytes)",
                self.complete,
                self.text.len()
            );
        }
    }

    /// Reads the next chunk from the channel.
    ///
    /// `Ok(Some(delta))` — text appended (may be empty on the final chunk).
    /// `Ok(None)` — the stream is complete; further calls keep returning `None`.
    /// `Err(_)` — the channel failed or closed early; the reader is released and
    /// the partial text stays available through [`text`](Self::text).
    pub async fn pull(&mut self) -> Result<Option<String>, StreamError> {
        if self.complete {
            return Ok(None);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Err(StreamError::Released);
        };

        match reader.next().await {
            Some(Ok(chunk)) => {
                self.on_chunk(&chunk.text);
                if chunk.done {
                    self.complete = true;
                    self.release();
                }
                Ok(Some(chunk.text))
            }
            Some(Err(e)) => {
                self.release();
                Err(e)
            }
            None => {
                self.release();
                Err(StreamError::Truncated)
            }
        }
    }

    /// Consumes the accumulator after a failed `pull`, pairing `error` with
    /// the text received before it.
    pub fn into_failure(self, error: StreamError) -> StreamFailure {
        StreamFailure {
            partial: self.into_text(),
            error,
        }
    }

    /// Consumes the accumulator, releasing the reader, and returns the text so far.
    pub fn into_text(mut self) -> String {
        self.release();
        std::mem::take(&mut self.text)
    }
}

impl Drop for StreamAccumulator {
    fn drop(&mut self) {
        if self.reader.is_some() && !self.complete {
            debug!(
                "Generation stream abandoned after {} bytes",
                self.text.len()
            );
        }
        self.release();
    }
}
