//! Session controller: the UI mode state machine and its collaborators.
//!
//! All mutable session data lives in one [`SessionState`] behind an async
//! mutex. The mode is a single enum value, so the camera, preview, result and
//! diary modal can never be active at the same time. A `busy` flag is held
//! while an identify or diary submission is in flight; every transition is
//! refused with [`SessionError::Busy`] until it completes.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use shared::domain::{DiaryEntry, EntryId, IdentificationResult, Theme, UserId};
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::{
    camera::{CameraStream, FacingMode, MediaCaptureProvider},
    error::{ErrorCategory, SessionError, ValidationError},
    identity::{provision_identity, DEMO_USER_ID},
    local_store::KeyValueStore,
    media::{validate_upload, CapturedImage, PreviewImage, IDENTIFIED_IMAGE_NAME},
    placeholder::{placeholder_diary_entries, placeholder_result},
    preferences,
    render::{render_diary, render_result, DiaryListView, ResultView},
    services::{DiaryService, DiarySubmission, PredictionService},
    settings::{ClientSettings, FailurePolicy},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    Idle,
    CameraOpen,
    Previewing,
    ShowingResult,
    DiaryModalOpen,
    IdentificationFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    SelectFile,
    OpenCamera,
    SwitchCamera,
    Capture,
    CloseCamera,
    Identify,
    Retry,
    Retake,
    SaveToDiary,
    AddEntry,
    EditDraft,
    SubmitDiary,
    CancelDiary,
    NewIdentification,
}

/// Top-level page sections. Orthogonal to [`UiMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    #[default]
    Home,
    Diary,
    Learn,
    About,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PanelVisibility {
    pub camera: bool,
    pub preview: bool,
    pub result: bool,
    pub diary_modal: bool,
    pub error: bool,
}

impl PanelVisibility {
    pub fn for_mode(mode: UiMode) -> Self {
        let mut visibility = Self::default();
        match mode {
            UiMode::Idle => {}
            UiMode::CameraOpen => visibility.camera = true,
            UiMode::Previewing => visibility.preview = true,
            UiMode::ShowingResult => visibility.result = true,
            UiMode::DiaryModalOpen => visibility.diary_modal = true,
            UiMode::IdentificationFailed => {
                visibility.preview = true;
                visibility.error = true;
            }
        }
        visibility
    }

    pub fn active_panels(&self) -> usize {
        [self.camera, self.preview, self.result, self.diary_modal]
            .into_iter()
            .filter(|visible| *visible)
            .count()
    }
}

/// The diary modal's form fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiaryDraft {
    pub plant_name: String,
    pub flower_species: Option<String>,
    pub notes: String,
    pub image: Option<CapturedImage>,
}

impl DiaryDraft {
    pub fn prefilled_from(result: &IdentificationResult, image: Option<&CapturedImage>) -> Self {
        let notes = if result.care_tips.is_empty() {
            String::new()
        } else {
            format!("Care tips:\n- {}", result.care_tips.join("\n- "))
        };
        Self {
            plant_name: result.common_name().to_string(),
            flower_species: Some(result.species.clone()),
            notes,
            image: image.map(|image| image.renamed(IDENTIFIED_IMAGE_NAME)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub category: ErrorCategory,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    ModeChanged { from: UiMode, to: UiMode },
    Loading(bool),
    Notice(Notice),
    PreviewReady(PreviewImage),
    ResultReady(ResultView),
    DiaryRefreshed(DiaryListView),
    SectionChanged(Section),
    ThemeChanged(Theme),
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub mode: UiMode,
    pub section: Section,
    pub visibility: PanelVisibility,
    pub preview: Option<PreviewImage>,
    pub result: Option<ResultView>,
    pub draft: Option<DiaryDraft>,
    pub diary: Option<DiaryListView>,
    pub busy: bool,
    pub facing: FacingMode,
    pub last_error: Option<String>,
}

struct SessionState {
    mode: UiMode,
    modal_origin: Option<UiMode>,
    section: Section,
    captured: Option<CapturedImage>,
    preview: Option<PreviewImage>,
    last_result: Option<IdentificationResult>,
    last_error: Option<String>,
    draft: Option<DiaryDraft>,
    diary: Option<DiaryListView>,
    busy: bool,
    facing: FacingMode,
    camera: Option<Box<dyn CameraStream>>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            mode: UiMode::Idle,
            modal_origin: None,
            section: Section::Home,
            captured: None,
            preview: None,
            last_result: None,
            last_error: None,
            draft: None,
            diary: None,
            busy: false,
            facing: FacingMode::default(),
            camera: None,
        }
    }

    fn require(&self, allowed: &[UiMode], action: UiAction) -> Result<(), SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }
        if !allowed.contains(&self.mode) {
            return Err(SessionError::InvalidTransition {
                mode: self.mode,
                action,
            });
        }
        Ok(())
    }

    fn release_camera(&mut self) {
        if let Some(mut stream) = self.camera.take() {
            stream.stop();
        }
    }

    fn discard_identification(&mut self) {
        self.captured = None;
        self.preview = None;
        self.last_result = None;
        self.last_error = None;
    }
}

pub struct SessionController {
    prediction: Arc<dyn PredictionService>,
    diary: Arc<dyn DiaryService>,
    camera: Arc<dyn MediaCaptureProvider>,
    store: Arc<dyn KeyValueStore>,
    user_id: UserId,
    failure_policy: FailurePolicy,
    max_upload_bytes: u64,
    diary_refresh_delay: Duration,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new_with_dependencies(
        settings: &ClientSettings,
        prediction: Arc<dyn PredictionService>,
        diary: Arc<dyn DiaryService>,
        camera: Arc<dyn MediaCaptureProvider>,
        store: Arc<dyn KeyValueStore>,
    ) -> Arc<Self> {
        let user_id = provision_identity(store.as_ref()).unwrap_or_else(|err| {
            warn!(error = %err, "identity provisioning failed; using demo identity");
            UserId(DEMO_USER_ID.to_string())
        });
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            prediction,
            diary,
            camera,
            store,
            user_id,
            failure_policy: settings.failure_policy,
            max_upload_bytes: settings.max_upload_bytes,
            diary_refresh_delay: settings.diary_refresh_delay,
            inner: Mutex::new(SessionState::new()),
            events,
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn mode(&self) -> UiMode {
        self.inner.lock().await.mode
    }

    pub async fn visibility(&self) -> PanelVisibility {
        PanelVisibility::for_mode(self.inner.lock().await.mode)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.lock().await;
        SessionSnapshot {
            mode: state.mode,
            section: state.section,
            visibility: PanelVisibility::for_mode(state.mode),
            preview: state.preview.clone(),
            result: state.last_result.as_ref().map(render_result),
            draft: state.draft.clone(),
            diary: state.diary.clone(),
            busy: state.busy,
            facing: state.facing,
            last_error: state.last_error.clone(),
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn notify(&self, err: &SessionError) {
        warn!(category = ?err.category(), error = %err, "session notice");
        self.emit(SessionEvent::Notice(Notice {
            category: err.category(),
            message: err.to_string(),
        }));
    }

    fn transition(&self, state: &mut SessionState, to: UiMode) {
        let from = state.mode;
        if from == to {
            return;
        }
        state.mode = to;
        debug!(?from, ?to, "ui mode changed");
        self.emit(SessionEvent::ModeChanged { from, to });
    }

    /// Reports a refusal as a notice and hands the error back.
    fn reject(&self, err: SessionError) -> SessionError {
        self.notify(&err);
        err
    }

    /// File chosen or dropped. Invalid input leaves the mode unchanged.
    pub async fn select_file(&self, image: CapturedImage) -> Result<PreviewImage, SessionError> {
        let mut state = self.inner.lock().await;
        state
            .require(&[UiMode::Idle], UiAction::SelectFile)
            .map_err(|err| self.reject(err))?;
        validate_upload(&image, self.max_upload_bytes)
            .map_err(|err| self.reject(SessionError::Validation(err)))?;

        let preview = image.preview();
        info!(
            file = %image.file_name,
            mime = %image.mime_type,
            size = image.size(),
            "image selected"
        );
        state.captured = Some(image);
        state.preview = Some(preview.clone());
        self.transition(&mut state, UiMode::Previewing);
        self.emit(SessionEvent::PreviewReady(preview.clone()));
        Ok(preview)
    }

    pub async fn open_camera(&self) -> Result<(), SessionError> {
        let mut state = self.inner.lock().await;
        state
            .require(&[UiMode::Idle], UiAction::OpenCamera)
            .map_err(|err| self.reject(err))?;
        self.transition(&mut state, UiMode::CameraOpen);
        let facing = state.facing;
        self.start_stream(state, facing).await
    }

    /// Flips between the back and front camera, reopening the stream.
    pub async fn switch_camera(&self) -> Result<FacingMode, SessionError> {
        let mut state = self.inner.lock().await;
        state
            .require(&[UiMode::CameraOpen], UiAction::SwitchCamera)
            .map_err(|err| self.reject(err))?;
        state.facing = state.facing.toggled();
        let facing = state.facing;
        self.start_stream(state, facing).await?;
        Ok(facing)
    }

    /// Releases any held stream and acquires a new one. The session stays
    /// busy but unlocked while the provider is waiting on the device.
    async fn start_stream(
        &self,
        mut state: MutexGuard<'_, SessionState>,
        facing: FacingMode,
    ) -> Result<(), SessionError> {
        state.release_camera();
        state.busy = true;
        drop(state);

        let outcome = self.camera.open(facing).await;

        let mut state = self.inner.lock().await;
        state.busy = false;
        match outcome {
            Ok(stream) => {
                info!(?facing, "camera stream acquired");
                state.camera = Some(stream);
                Ok(())
            }
            Err(err) => {
                self.transition(&mut state, UiMode::Idle);
                Err(self.reject(SessionError::Camera(format!("{err:#}"))))
            }
        }
    }

    pub async fn capture(&self) -> Result<PreviewImage, SessionError> {
        let mut state = self.inner.lock().await;
        state
            .require(&[UiMode::CameraOpen], UiAction::Capture)
            .map_err(|err| self.reject(err))?;
        let frame = match state.camera.as_ref() {
            Some(stream) if stream.is_active() => stream.capture_frame(),
            _ => {
                return Err(self.reject(SessionError::Camera(
                    "no active camera stream".to_string(),
                )))
            }
        };
        let frame = frame.map_err(|err| self.reject(SessionError::Camera(format!("{err:#}"))))?;

        state.release_camera();
        let preview = frame.preview();
        state.captured = Some(frame);
        state.preview = Some(preview.clone());
        self.transition(&mut state, UiMode::Previewing);
        self.emit(SessionEvent::PreviewReady(preview.clone()));
        Ok(preview)
    }

    pub async fn close_camera(&self) -> Result<(), SessionError> {
        let mut state = self.inner.lock().await;
        state
            .require(&[UiMode::CameraOpen], UiAction::CloseCamera)
            .map_err(|err| self.reject(err))?;
        state.release_camera();
        self.transition(&mut state, UiMode::Idle);
        Ok(())
    }

    pub async fn identify(&self) -> Result<ResultView, SessionError> {
        self.run_identification(&[UiMode::Previewing], UiAction::Identify)
            .await
    }

    pub async fn retry_identification(&self) -> Result<ResultView, SessionError> {
        self.run_identification(&[UiMode::IdentificationFailed], UiAction::Retry)
            .await
    }

    async fn run_identification(
        &self,
        allowed: &[UiMode],
        action: UiAction,
    ) -> Result<ResultView, SessionError> {
        let image = {
            let mut state = self.inner.lock().await;
            state
                .require(allowed, action)
                .map_err(|err| self.reject(err))?;
            let Some(image) = state.captured.clone() else {
                return Err(self.reject(ValidationError::NoImage.into()));
            };
            state.busy = true;
            state.last_error = None;
            self.transition(&mut state, UiMode::Previewing);
            image
        };
        self.emit(SessionEvent::Loading(true));

        let outcome = self.prediction.predict(&image).await;

        let mut state = self.inner.lock().await;
        state.busy = false;
        self.emit(SessionEvent::Loading(false));

        let result = match outcome {
            Ok(result) => result,
            Err(err) if self.failure_policy == FailurePolicy::Placeholder => {
                let message = format!("{err:#}");
                warn!(error = %message, "prediction failed; showing placeholder result");
                placeholder_result()
            }
            Err(err) => {
                let err = SessionError::service("identification", &err);
                state.last_error = Some(err.to_string());
                self.transition(&mut state, UiMode::IdentificationFailed);
                return Err(self.reject(err));
            }
        };

        let view = render_result(&result);
        state.last_result = Some(result);
        self.transition(&mut state, UiMode::ShowingResult);
        self.emit(SessionEvent::ResultReady(view.clone()));
        Ok(view)
    }

    /// Discards the captured image and returns to the upload view.
    pub async fn retake(&self) -> Result<(), SessionError> {
        let mut state = self.inner.lock().await;
        state
            .require(
                &[UiMode::Previewing, UiMode::IdentificationFailed],
                UiAction::Retake,
            )
            .map_err(|err| self.reject(err))?;
        state.discard_identification();
        self.transition(&mut state, UiMode::Idle);
        Ok(())
    }

    pub async fn new_identification(&self) -> Result<(), SessionError> {
        let mut state = self.inner.lock().await;
        state
            .require(
                &[UiMode::ShowingResult, UiMode::IdentificationFailed],
                UiAction::NewIdentification,
            )
            .map_err(|err| self.reject(err))?;
        state.discard_identification();
        self.transition(&mut state, UiMode::Idle);
        Ok(())
    }

    /// Opens the diary modal pre-filled from the current result.
    pub async fn open_save_to_diary(&self) -> Result<DiaryDraft, SessionError> {
        let mut state = self.inner.lock().await;
        state
            .require(&[UiMode::ShowingResult], UiAction::SaveToDiary)
            .map_err(|err| self.reject(err))?;
        let draft = match state.last_result.as_ref() {
            Some(result) => DiaryDraft::prefilled_from(result, state.captured.as_ref()),
            None => DiaryDraft::default(),
        };
        state.draft = Some(draft.clone());
        state.modal_origin = Some(UiMode::ShowingResult);
        self.transition(&mut state, UiMode::DiaryModalOpen);
        Ok(draft)
    }

    /// Opens an empty diary modal; only the species is carried over from a
    /// held result.
    pub async fn open_add_entry(&self) -> Result<DiaryDraft, SessionError> {
        let mut state = self.inner.lock().await;
        state
            .require(&[UiMode::Idle, UiMode::ShowingResult], UiAction::AddEntry)
            .map_err(|err| self.reject(err))?;
        let draft = DiaryDraft {
            flower_species: state
                .last_result
                .as_ref()
                .map(|result| result.species.clone()),
            ..DiaryDraft::default()
        };
        state.draft = Some(draft.clone());
        state.modal_origin = Some(state.mode);
        self.transition(&mut state, UiMode::DiaryModalOpen);
        Ok(draft)
    }

    pub async fn update_draft(&self, draft: DiaryDraft) -> Result<(), SessionError> {
        let mut state = self.inner.lock().await;
        state
            .require(&[UiMode::DiaryModalOpen], UiAction::EditDraft)
            .map_err(|err| self.reject(err))?;
        state.draft = Some(draft);
        Ok(())
    }

    /// Closes the modal and returns to wherever it was opened from.
    pub async fn cancel_diary(&self) -> Result<(), SessionError> {
        let mut state = self.inner.lock().await;
        state
            .require(&[UiMode::DiaryModalOpen], UiAction::CancelDiary)
            .map_err(|err| self.reject(err))?;
        state.draft = None;
        let back_to = state.modal_origin.take().unwrap_or(UiMode::Idle);
        self.transition(&mut state, back_to);
        Ok(())
    }

    /// Submits the current draft and refreshes the diary list.
    pub async fn submit_diary(&self) -> Result<DiaryListView, SessionError> {
        let submission = {
            let mut state = self.inner.lock().await;
            state
                .require(&[UiMode::DiaryModalOpen], UiAction::SubmitDiary)
                .map_err(|err| self.reject(err))?;
            let draft = state.draft.clone().unwrap_or_default();
            let plant_name = draft.plant_name.trim().to_string();
            if plant_name.is_empty() {
                return Err(self.reject(ValidationError::MissingPlantName.into()));
            }
            if let Some(image) = &draft.image {
                validate_upload(image, self.max_upload_bytes)
                    .map_err(|err| self.reject(SessionError::Validation(err)))?;
            }
            state.busy = true;
            DiarySubmission {
                user_id: self.user_id.clone(),
                plant_name,
                notes: draft.notes,
                flower_species: draft
                    .flower_species
                    .map(|species| species.trim().to_string())
                    .filter(|species| !species.is_empty()),
                image: draft.image,
            }
        };
        self.emit(SessionEvent::Loading(true));

        let outcome = self.diary.create_entry(&submission).await;

        {
            let mut state = self.inner.lock().await;
            state.busy = false;
            self.emit(SessionEvent::Loading(false));
            match outcome {
                Ok(_) => {}
                Err(err) if self.failure_policy == FailurePolicy::Placeholder => {
                    let message = format!("{err:#}");
                    warn!(
                        error = %message,
                        delay_ms = self.diary_refresh_delay.as_millis() as u64,
                        "diary submission failed; closing modal and refreshing later"
                    );
                    self.close_modal_after_submit(&mut state);
                    drop(state);
                    tokio::time::sleep(self.diary_refresh_delay).await;
                    return self.refresh_diary().await;
                }
                Err(err) => {
                    let err = SessionError::service("diary submission", &err);
                    state.last_error = Some(err.to_string());
                    return Err(self.reject(err));
                }
            }
            self.close_modal_after_submit(&mut state);
        }

        // The entry is stored; a failed reload is only reported as a notice.
        match self.refresh_diary().await {
            Ok(view) => Ok(view),
            Err(_) => Ok(self
                .inner
                .lock()
                .await
                .diary
                .clone()
                .unwrap_or_else(|| render_diary(&[]))),
        }
    }

    fn close_modal_after_submit(&self, state: &mut SessionState) {
        state.draft = None;
        state.modal_origin = None;
        state.discard_identification();
        self.transition(state, UiMode::Idle);
    }

    /// Loads the user's diary and renders it.
    pub async fn refresh_diary(&self) -> Result<DiaryListView, SessionError> {
        self.emit(SessionEvent::Loading(true));
        let outcome = self.diary.list_entries(&self.user_id).await;
        self.emit(SessionEvent::Loading(false));

        let entries = match outcome {
            Ok(entries) => entries,
            Err(err) if self.failure_policy == FailurePolicy::Placeholder => {
                let message = format!("{err:#}");
                warn!(error = %message, "diary list failed; showing demo entries");
                placeholder_diary_entries()
            }
            Err(err) => return Err(self.reject(SessionError::service("diary list", &err))),
        };

        let view = render_diary(&entries);
        self.inner.lock().await.diary = Some(view.clone());
        self.emit(SessionEvent::DiaryRefreshed(view.clone()));
        Ok(view)
    }

    pub async fn diary_entry(&self, entry_id: &EntryId) -> Result<Option<DiaryEntry>, SessionError> {
        self.diary
            .get_entry(&self.user_id, entry_id)
            .await
            .map_err(|err| self.reject(SessionError::service("diary entry", &err)))
    }

    /// Switches page section; entering the diary reloads it.
    pub async fn navigate(&self, section: Section) -> Result<Option<DiaryListView>, SessionError> {
        {
            let mut state = self.inner.lock().await;
            state.section = section;
        }
        self.emit(SessionEvent::SectionChanged(section));
        if section == Section::Diary {
            return self.refresh_diary().await.map(Some);
        }
        Ok(None)
    }

    pub fn theme(&self) -> anyhow::Result<Theme> {
        preferences::load_theme(self.store.as_ref())
    }

    pub fn toggle_theme(&self) -> anyhow::Result<Theme> {
        let theme = preferences::toggle_theme(self.store.as_ref())
            .context("failed to persist theme preference")?;
        info!(theme = theme.as_str(), "theme changed");
        self.emit(SessionEvent::ThemeChanged(theme));
        Ok(theme)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.inner.get_mut().release_camera();
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
