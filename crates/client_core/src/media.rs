//! Captured image payloads, upload validation and preview encoding.

use std::{io::Cursor, path::Path};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::ValidationError;

pub const IDENTIFIED_IMAGE_NAME: &str = "identified_flower.jpg";

#[derive(Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedImage")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

impl CapturedImage {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Reads a file and derives its MIME type from the extension, falling
    /// back to sniffing the content when the extension says nothing.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read image '{}'", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string())
            .or_else(|| sniff_mime_type(&bytes))
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Ok(Self::new(file_name, mime_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.mime_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }

    pub fn renamed(&self, file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..self.clone()
        }
    }

    pub fn preview(&self) -> PreviewImage {
        PreviewImage {
            data_url: format!(
                "data:{};base64,{}",
                self.mime_type,
                STANDARD.encode(&self.bytes)
            ),
            dimensions: probe_dimensions(&self.bytes),
        }
    }
}

/// Displayable form of a captured image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    pub data_url: String,
    /// `None` when the header could not be decoded.
    pub dimensions: Option<(u32, u32)>,
}

pub fn validate_upload(image: &CapturedImage, max_bytes: u64) -> Result<(), ValidationError> {
    if !image.is_image() {
        return Err(ValidationError::NotAnImage {
            mime_type: image.mime_type.clone(),
        });
    }
    if image.size() > max_bytes {
        return Err(ValidationError::TooLarge {
            size: image.size(),
            limit_mib: max_bytes / (1024 * 1024),
        });
    }
    Ok(())
}

fn sniff_mime_type(bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type().to_string())
}

fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
#[path = "tests/media_tests.rs"]
mod tests;
