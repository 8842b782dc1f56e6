use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request could not be sent or the response could not be read.
    Transport,
    /// Non-success status, unknown content type or an invalid payload.
    Protocol,
    /// The backend reported `status: "error"` on the event stream.
    Backend,
    /// The event stream ended or went quiet without a terminal event.
    Stalled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl SessionFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("generation result has an empty videoUrl")]
    EmptyVideoUrl,
    #[error("generated image {index} has an empty reference")]
    EmptyImageReference { index: usize },
    #[error("cost field {field} must be a non-negative number, got {value}")]
    InvalidCost { field: &'static str, value: f64 },
}
