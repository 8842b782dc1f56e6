//! Validated image blobs handed to the generation controller.

use std::path::Path;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use shared::domain::{ImageMime, ImageSlot};
use thiserror::Error;

/// Largest accepted image, per file.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejected {
    #[error("Please upload JPG or PNG files only")]
    UnsupportedType { mime_type: String },
    #[error("File size must be less than 10MB")]
    TooLarge { size_bytes: u64 },
    #[error("failed to read image '{path}': {message}")]
    Unreadable { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    filename: String,
    mime: ImageMime,
    bytes: Bytes,
}

impl ImageUpload {
    pub fn new(
        filename: impl Into<String>,
        mime_type: &str,
        bytes: impl Into<Bytes>,
    ) -> Result<Self, UploadRejected> {
        let mime = ImageMime::from_mime_str(mime_type).ok_or_else(|| {
            UploadRejected::UnsupportedType {
                mime_type: mime_type.to_string(),
            }
        })?;
        let bytes = bytes.into();
        check_size(bytes.len() as u64)?;

        Ok(Self {
            filename: filename.into(),
            mime,
            bytes,
        })
    }

    /// Reads an image from disk, guessing its MIME type from the extension.
    /// The size limit is checked against file metadata before reading.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadRejected> {
        let path = path.as_ref();
        let unreadable = |err: std::io::Error| UploadRejected::Unreadable {
            path: path.display().to_string(),
            message: err.to_string(),
        };

        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream");
        if ImageMime::from_mime_str(mime_type).is_none() {
            return Err(UploadRejected::UnsupportedType {
                mime_type: mime_type.to_string(),
            });
        }

        let metadata = tokio::fs::metadata(path).await.map_err(unreadable)?;
        check_size(metadata.len())?;
        let bytes = tokio::fs::read(path).await.map_err(unreadable)?;

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Self::new(filename, mime_type, bytes)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime(&self) -> ImageMime {
        self.mime
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn to_part(&self) -> reqwest::Result<Part> {
        Part::stream_with_length(self.bytes.clone(), self.bytes.len() as u64)
            .file_name(self.filename.clone())
            .mime_str(self.mime.as_str())
    }
}

fn check_size(size_bytes: u64) -> Result<(), UploadRejected> {
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(UploadRejected::TooLarge { size_bytes });
    }
    Ok(())
}

/// Both images of one generation attempt. Immutable once a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInputs {
    pub front: ImageUpload,
    pub back: ImageUpload,
}

impl SessionInputs {
    pub fn from_parts(front: Option<ImageUpload>, back: Option<ImageUpload>) -> Option<Self> {
        Some(Self {
            front: front?,
            back: back?,
        })
    }

    pub fn get(&self, slot: ImageSlot) -> &ImageUpload {
        match slot {
            ImageSlot::Front => &self.front,
            ImageSlot::Back => &self.back,
        }
    }

    pub(crate) fn to_form(&self) -> reqwest::Result<Form> {
        let mut form = Form::new();
        for slot in [ImageSlot::Front, ImageSlot::Back] {
            form = form.part(slot.form_field(), self.get(slot).to_part()?);
        }
        Ok(form)
    }
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
