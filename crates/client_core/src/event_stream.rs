//! Incremental decoding of the backend's `text/event-stream` body.

use shared::{
    domain::{GenerationResult, GenerationStep},
    protocol::{StreamEventWire, StreamStatus},
};
use thiserror::Error;
use tracing::warn;

pub const DATA_MARKER: &[u8] = b"data:";
/// Longest unterminated line the decoder buffers before giving up.
pub const DEFAULT_MAX_LINE_BYTES: usize = 8 * 1024 * 1024;
pub const DEFAULT_STREAM_ERROR_MESSAGE: &str = "Video generation failed";

#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("event line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("event payload is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("event step {0} is outside 1..=5")]
    StepOutOfRange(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event stream line exceeds {limit} bytes")]
pub struct LineTooLong {
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Complete(GenerationResult),
    Failed(String),
}

/// A schema-checked stream event. `step` is `None` when absent or zero,
/// `progress` is `None` only when the field is absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedEvent {
    pub step: Option<GenerationStep>,
    pub progress: Option<u8>,
    pub outcome: Option<EventOutcome>,
}

impl DecodedEvent {
    pub fn progress(step: Option<GenerationStep>, progress: Option<u8>) -> Self {
        Self {
            step,
            progress,
            outcome: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}

pub fn decode_event(payload: &str) -> Result<DecodedEvent, EventDecodeError> {
    let wire: StreamEventWire = serde_json::from_str(payload)?;

    let step = match wire.step {
        None | Some(0) => None,
        Some(raw) => Some(
            u8::try_from(raw)
                .ok()
                .and_then(GenerationStep::from_ordinal)
                .ok_or(EventDecodeError::StepOutOfRange(raw))?,
        ),
    };
    let progress = wire
        .progress
        .map(|value| value.round().clamp(0.0, 100.0) as u8);

    let outcome = match wire.status {
        // A complete event without a usable result still carries progress.
        Some(StreamStatus::Complete) => match wire.result.map(|payload| payload.into_result()) {
            Some(Ok(result)) => Some(EventOutcome::Complete(result)),
            Some(Err(err)) => {
                warn!(error = %err, "ignoring complete status with an invalid result");
                None
            }
            None => {
                warn!("ignoring complete status without a result");
                None
            }
        },
        Some(StreamStatus::Error) => Some(EventOutcome::Failed(
            wire.message
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| DEFAULT_STREAM_ERROR_MESSAGE.to_string()),
        )),
        Some(StreamStatus::Other) | None => None,
    };

    Ok(DecodedEvent {
        step,
        progress,
        outcome,
    })
}

/// Splits raw body chunks into lines and decodes every `data:` line.
#[derive(Debug)]
pub struct EventStreamDecoder {
    /// Bytes received after the last newline; never contains `\n`. Kept as
    /// bytes so a UTF-8 sequence split across chunks is decoded only once
    /// the whole line has arrived.
    pending: Vec<u8>,
    max_line_bytes: usize,
}

impl Default for EventStreamDecoder {
    fn default() -> Self {
        Self::with_line_limit(DEFAULT_MAX_LINE_BYTES)
    }
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line_limit(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_bytes,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feeds one chunk and returns the results for every line it completed.
    /// Lines that are not `data:` lines produce nothing. Fails once a line
    /// grows past the limit without a newline.
    pub fn push(
        &mut self,
        chunk: &[u8],
    ) -> Result<Vec<Result<DecodedEvent, EventDecodeError>>, LineTooLong> {
        self.pending.extend_from_slice(chunk);

        let mut decoded = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.pending[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + offset;
            if end - consumed > self.max_line_bytes {
                return Err(LineTooLong {
                    limit: self.max_line_bytes,
                });
            }
            if let Some(event) = decode_line(&self.pending[consumed..end]) {
                decoded.push(event);
            }
            consumed = end + 1;
        }
        self.pending.drain(..consumed);

        if self.pending.len() > self.max_line_bytes {
            return Err(LineTooLong {
                limit: self.max_line_bytes,
            });
        }
        Ok(decoded)
    }

    /// Ends the stream. An unterminated trailing line is never parsed; the
    /// number of discarded bytes is returned.
    pub fn finish(self) -> usize {
        self.pending.len()
    }
}

fn decode_line(line: &[u8]) -> Option<Result<DecodedEvent, EventDecodeError>> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let payload = line.strip_prefix(DATA_MARKER)?;
    let payload = payload.strip_prefix(b" ").unwrap_or(payload);
    if payload.iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    Some(
        std::str::from_utf8(payload)
            .map_err(EventDecodeError::from)
            .and_then(decode_event),
    )
}

#[cfg(test)]
#[path = "tests/event_stream_tests.rs"]
mod tests;
