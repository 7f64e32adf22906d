use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the prediction and diary services on non-2xx.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub detail: String,
}

impl ApiError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResultRejected {
    #[error("identification result has an empty species")]
    EmptySpecies,
    #[error("identification confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}
