use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

pub mod camera;
pub mod error;
pub mod identity;
pub mod local_store;
pub mod media;
pub mod placeholder;
pub mod preferences;
pub mod render;
pub mod services;
pub mod session;
pub mod settings;

pub use camera::{FacingMode, MediaCaptureProvider, MissingCaptureProvider, StillFrameCamera};
pub use error::{ErrorCategory, SessionError, ValidationError};
pub use local_store::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use media::{CapturedImage, PreviewImage};
pub use render::{DiaryListView, ResultView};
pub use services::{ApiClient, DiaryService, DiarySubmission, PredictionService};
pub use session::{
    DiaryDraft, Notice, PanelVisibility, Section, SessionController, SessionEvent,
    SessionSnapshot, UiAction, UiMode,
};
pub use settings::{load_settings, ClientSettings, FailurePolicy};

/// Builds a controller backed by the HTTP services and the on-disk store.
pub fn connect(
    settings: &ClientSettings,
    camera: Arc<dyn MediaCaptureProvider>,
) -> Result<Arc<SessionController>> {
    let api = Arc::new(ApiClient::new(settings)?);
    let store_path = settings.store_path()?;
    let store = FileKeyValueStore::open(store_path.clone())
        .with_context(|| format!("failed to open local store '{}'", store_path.display()))?;
    info!(
        api = %api.base_url(),
        store = %store_path.display(),
        policy = ?settings.failure_policy,
        "session services ready"
    );
    Ok(SessionController::new_with_dependencies(
        settings,
        api.clone(),
        api,
        camera,
        Arc::new(store),
    ))
}
