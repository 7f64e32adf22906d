use thiserror::Error;

use crate::session::{UiAction, UiMode};

/// Coarse grouping used by front ends to pick how a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Device,
    Service,
    State,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Please select an image file (JPG, PNG, or WEBP)")]
    NotAnImage { mime_type: String },
    #[error("File is too large. Maximum size is {limit_mib}MB.")]
    TooLarge { size: u64, limit_mib: u64 },
    #[error("Please select or capture an image first")]
    NoImage,
    #[error("Plant name is required")]
    MissingPlantName,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Unable to access the camera. Please make sure you have granted camera permissions. ({0})")]
    Camera(String),
    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },
    #[error("cannot {action:?} while {mode:?}")]
    InvalidTransition { mode: UiMode, action: UiAction },
    #[error("another request is still in progress")]
    Busy,
}

impl SessionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Camera(_) => ErrorCategory::Device,
            Self::Service { .. } => ErrorCategory::Service,
            Self::InvalidTransition { .. } | Self::Busy => ErrorCategory::State,
        }
    }

    pub(crate) fn service(operation: &'static str, err: &anyhow::Error) -> Self {
        Self::Service {
            operation,
            message: format!("{err:#}"),
        }
    }
}
