//! Media capture provider abstraction.

use std::{io::Cursor, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;

use crate::media::CapturedImage;

const CAPTURE_JPEG_QUALITY: u8 = 90;
const CAPTURE_FILE_NAME: &str = "capture.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    /// Back camera.
    #[default]
    Environment,
    User,
}

impl FacingMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Environment => Self::User,
            Self::User => Self::Environment,
        }
    }
}

#[async_trait]
pub trait MediaCaptureProvider: Send + Sync {
    async fn open(&self, facing: FacingMode) -> Result<Box<dyn CameraStream>>;
}

pub trait CameraStream: Send + Sync {
    fn facing(&self) -> FacingMode;
    fn capture_frame(&self) -> Result<CapturedImage>;
    /// Releases the device. Calling it twice is a no-op.
    fn stop(&mut self);
    fn is_active(&self) -> bool;
}

pub struct MissingCaptureProvider;

#[async_trait]
impl MediaCaptureProvider for MissingCaptureProvider {
    async fn open(&self, _facing: FacingMode) -> Result<Box<dyn CameraStream>> {
        Err(anyhow!("no camera device available"))
    }
}

/// Serves one image file as the frame source for every stream it opens.
pub struct StillFrameCamera {
    frame_path: PathBuf,
}

impl StillFrameCamera {
    pub fn new(frame_path: impl Into<PathBuf>) -> Self {
        Self {
            frame_path: frame_path.into(),
        }
    }
}

#[async_trait]
impl MediaCaptureProvider for StillFrameCamera {
    async fn open(&self, facing: FacingMode) -> Result<Box<dyn CameraStream>> {
        let frame = tokio::fs::read(&self.frame_path).await.with_context(|| {
            format!("failed to open frame source '{}'", self.frame_path.display())
        })?;
        tracing::debug!(?facing, path = %self.frame_path.display(), "camera stream opened");
        Ok(Box::new(StillFrameStream {
            frame,
            facing,
            active: true,
        }))
    }
}

struct StillFrameStream {
    frame: Vec<u8>,
    facing: FacingMode,
    active: bool,
}

impl CameraStream for StillFrameStream {
    fn facing(&self) -> FacingMode {
        self.facing
    }

    fn capture_frame(&self) -> Result<CapturedImage> {
        if !self.active {
            return Err(anyhow!("camera stream already stopped"));
        }
        Ok(CapturedImage::new(
            CAPTURE_FILE_NAME,
            "image/jpeg",
            encode_jpeg_frame(&self.frame)?,
        ))
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            tracing::debug!(facing = ?self.facing, "camera stream stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Re-encodes a raw frame as JPEG, the way a canvas snapshot would.
pub fn encode_jpeg_frame(frame: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(frame).context("camera frame is not a decodable image")?;
    let rgb = decoded.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, CAPTURE_JPEG_QUALITY)
        .encode_image(&rgb)
        .context("failed to encode captured frame")?;
    Ok(out.into_inner())
}
