use serde::{Deserialize, Serialize};

use crate::{
    domain::{CostBreakdown, GenerationResult, ANGLE_COUNT},
    error::PayloadError,
};

/// Endpoint path appended to the configured backend URL.
pub const GENERATE_VIDEO_PATH: &str = "api/generate-video";

pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// How the backend chose to answer, read from the `Content-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    EventStream,
    Json,
}

impl ResponseKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains(EVENT_STREAM_CONTENT_TYPE) {
            Some(ResponseKind::EventStream)
        } else if content_type.contains(JSON_CONTENT_TYPE) {
            Some(ResponseKind::Json)
        } else {
            None
        }
    }
}

/// Final generation output as sent by the backend, either as the whole
/// `application/json` body or as the `result` of a `complete` stream event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPayload {
    pub generated_images: [String; ANGLE_COUNT],
    pub video_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub costs: Option<CostBreakdown>,
}

impl GenerationPayload {
    pub fn into_result(self) -> Result<GenerationResult, PayloadError> {
        if self.video_url.trim().is_empty() {
            return Err(PayloadError::EmptyVideoUrl);
        }
        if let Some(index) = self
            .generated_images
            .iter()
            .position(|image| image.trim().is_empty())
        {
            return Err(PayloadError::EmptyImageReference { index });
        }
        if let Some(costs) = &self.costs {
            for (field, value) in costs.fields() {
                if !value.is_finite() || value < 0.0 {
                    return Err(PayloadError::InvalidCost { field, value });
                }
            }
        }

        Ok(GenerationResult {
            video_url: self.video_url,
            images: self.generated_images,
            costs: self.costs,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Complete,
    Error,
    #[serde(other)]
    Other,
}

/// One `data:` payload of the event stream. Every field is optional on the
/// wire; the client decides what a combination means.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamEventWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StreamStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
