use std::time::Duration;

use reqwest::StatusCode;
use shared::error::{FailureKind, PayloadError, SessionFailure};
use thiserror::Error;

use crate::event_stream::LineTooLong;

pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate video. Please try again.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("API request failed: {reason}")]
    Status { status: StatusCode, reason: String },
    #[error("Unexpected response format from backend")]
    UnexpectedFormat { content_type: Option<String> },
    #[error("invalid JSON response from backend: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("invalid generation result: {0}")]
    InvalidPayload(#[from] PayloadError),
    #[error("Backend sent an oversized event: {0}")]
    OversizedEvent(#[from] LineTooLong),
    #[error("Generation stream ended before completion")]
    StreamEnded,
    #[error("Backend stopped responding for {}s", .0.as_secs())]
    Stalled(Duration),
}

impl GenerationError {
    pub fn status(status: StatusCode) -> Self {
        let reason = status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.as_str().to_string());
        Self::Status { status, reason }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            GenerationError::Transport(_) => FailureKind::Transport,
            GenerationError::Status { .. }
            | GenerationError::UnexpectedFormat { .. }
            | GenerationError::MalformedJson(_)
            | GenerationError::InvalidPayload(_)
            | GenerationError::OversizedEvent(_) => FailureKind::Protocol,
            GenerationError::StreamEnded | GenerationError::Stalled(_) => FailureKind::Stalled,
        }
    }

    pub fn into_failure(self) -> SessionFailure {
        let message = self.to_string();
        let message = if message.trim().is_empty() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            message
        };
        SessionFailure::new(self.kind(), message)
    }
}
