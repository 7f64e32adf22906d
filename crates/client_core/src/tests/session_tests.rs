use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{domain::HealthStatus, protocol::CreateDiaryEntryResponse};
use tokio::sync::Notify;

use crate::local_store::MemoryKeyValueStore;

enum PredictBehavior {
    Succeed(IdentificationResult),
    Fail,
    Gated {
        started: Arc<Notify>,
        release: Arc<Notify>,
        result: IdentificationResult,
    },
}

struct FakePrediction {
    behavior: Mutex<PredictBehavior>,
    calls: AtomicUsize,
}

impl FakePrediction {
    fn new(behavior: PredictBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PredictionService for FakePrediction {
    async fn predict(&self, _image: &CapturedImage) -> Result<IdentificationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = {
            let behavior = self.behavior.lock().await;
            match &*behavior {
                PredictBehavior::Succeed(result) => return Ok(result.clone()),
                PredictBehavior::Fail => return Err(anyhow!("connection refused")),
                PredictBehavior::Gated {
                    started,
                    release,
                    result,
                } => (started.clone(), release.clone(), result.clone()),
            }
        };
        let (started, release, result) = gate;
        started.notify_one();
        release.notified().await;
        Ok(result)
    }
}

#[derive(Default)]
struct FakeDiary {
    entries: Mutex<Vec<DiaryEntry>>,
    submissions: Mutex<Vec<DiarySubmission>>,
    fail_create: bool,
    fail_list: bool,
}

impl FakeDiary {
    fn healthy() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_create: true,
            fail_list: true,
            ..Self::default()
        })
    }
}

#[async_trait]
impl DiaryService for FakeDiary {
    async fn list_entries(&self, _user_id: &UserId) -> Result<Vec<DiaryEntry>> {
        if self.fail_list {
            return Err(anyhow!("diary list request failed with status 500"));
        }
        Ok(self.entries.lock().await.clone())
    }

    async fn get_entry(&self, _user_id: &UserId, entry_id: &EntryId) -> Result<Option<DiaryEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .find(|entry| &entry.id == entry_id)
            .cloned())
    }

    async fn create_entry(&self, submission: &DiarySubmission) -> Result<CreateDiaryEntryResponse> {
        if self.fail_create {
            return Err(anyhow!("diary create request failed with status 503"));
        }
        let mut entries = self.entries.lock().await;
        let id = EntryId(format!("entry-{}", entries.len() + 1));
        entries.push(DiaryEntry {
            id: id.clone(),
            user_id: Some(submission.user_id.clone()),
            plant_name: submission.plant_name.clone(),
            flower_species: submission.flower_species.clone(),
            notes: submission.notes.clone(),
            image_url: submission
                .image
                .as_ref()
                .map(|image| format!("https://cdn.example/{}", image.file_name)),
            created_at: "2024-05-01T10:00:00".into(),
        });
        self.submissions.lock().await.push(submission.clone());
        Ok(CreateDiaryEntryResponse {
            success: true,
            entry_id: Some(id),
            message: "Diary entry created successfully".into(),
        })
    }
}

struct FakeStream {
    facing: FacingMode,
    active: bool,
    stops: Arc<AtomicUsize>,
}

impl CameraStream for FakeStream {
    fn facing(&self) -> FacingMode {
        self.facing
    }

    fn capture_frame(&self) -> Result<CapturedImage> {
        Ok(CapturedImage::new(
            "capture.jpg",
            "image/jpeg",
            vec![0xFF, 0xD8, 0xFF, 0xE0],
        ))
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

struct FakeCamera {
    available: bool,
    opens: AtomicUsize,
    stops: Arc<AtomicUsize>,
}

impl FakeCamera {
    fn new(available: bool) -> Arc<Self> {
        Arc::new(Self {
            available,
            opens: AtomicUsize::new(0),
            stops: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl MediaCaptureProvider for FakeCamera {
    async fn open(&self, facing: FacingMode) -> Result<Box<dyn CameraStream>> {
        if !self.available {
            return Err(anyhow!("permission denied"));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            facing,
            active: true,
            stops: Arc::clone(&self.stops),
        }))
    }
}

/// Holds `open` until released, like a camera waiting on a permission prompt.
struct PromptingCamera {
    inner: Arc<FakeCamera>,
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl MediaCaptureProvider for PromptingCamera {
    async fn open(&self, facing: FacingMode) -> Result<Box<dyn CameraStream>> {
        self.started.notify_one();
        self.release.notified().await;
        self.inner.open(facing).await
    }
}

fn settings(policy: FailurePolicy) -> ClientSettings {
    ClientSettings {
        failure_policy: policy,
        diary_refresh_delay: Duration::ZERO,
        ..ClientSettings::default()
    }
}

fn controller_with(
    policy: FailurePolicy,
    prediction: Arc<dyn PredictionService>,
    diary: Arc<dyn DiaryService>,
    camera: Arc<dyn MediaCaptureProvider>,
) -> Arc<SessionController> {
    SessionController::new_with_dependencies(
        &settings(policy),
        prediction,
        diary,
        camera,
        Arc::new(MemoryKeyValueStore::new()),
    )
}

fn tulip_result() -> IdentificationResult {
    IdentificationResult {
        species: "Red Tulip (Tulipa gesneriana)".into(),
        confidence: 0.76,
        health_status: HealthStatus::NeedsAttention,
        care_tips: vec![
            "Plant tulip bulbs in fall, about 6-8 inches deep".into(),
            "Allow foliage to yellow and die back naturally after flowering".into(),
        ],
    }
}

fn jpeg_upload(size: usize) -> CapturedImage {
    let mut bytes = vec![0u8; size];
    bytes[..4].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    CapturedImage::new("flower.jpg", "image/jpeg", bytes)
}

fn drain_notices(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::Notice(notice) = event {
            notices.push(notice);
        }
    }
    notices
}

#[tokio::test]
async fn valid_file_moves_idle_to_previewing() {
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        FakeDiary::healthy(),
        FakeCamera::new(true),
    );

    let preview = controller
        .select_file(jpeg_upload(1024))
        .await
        .expect("select");
    assert!(preview.data_url.starts_with("data:image/jpeg;base64,"));

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.mode, UiMode::Previewing);
    assert!(snapshot.visibility.preview);
    assert_eq!(snapshot.visibility.active_panels(), 1);
    assert_eq!(snapshot.preview, Some(preview));
}

#[tokio::test]
async fn invalid_uploads_leave_mode_unchanged_and_notify() {
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        FakeDiary::healthy(),
        FakeCamera::new(true),
    );
    let mut events = controller.subscribe_events();

    let oversized = controller
        .select_file(jpeg_upload(5 * 1024 * 1024 + 1))
        .await
        .expect_err("oversized");
    assert_eq!(oversized.category(), ErrorCategory::Validation);

    let not_image = controller
        .select_file(CapturedImage::new("a.pdf", "application/pdf", vec![1, 2, 3]))
        .await
        .expect_err("not an image");
    assert!(matches!(
        not_image,
        SessionError::Validation(ValidationError::NotAnImage { .. })
    ));

    assert_eq!(controller.mode().await, UiMode::Idle);
    let notices = drain_notices(&mut events);
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].message, "File is too large. Maximum size is 5MB.");
    assert_eq!(
        notices[1].message,
        "Please select an image file (JPG, PNG, or WEBP)"
    );
}

#[tokio::test]
async fn dropped_jpeg_with_failing_service_shows_placeholder_rose() {
    let controller = controller_with(
        FailurePolicy::Placeholder,
        FakePrediction::new(PredictBehavior::Fail),
        FakeDiary::healthy(),
        FakeCamera::new(true),
    );

    let preview = controller
        .select_file(jpeg_upload(2 * 1024 * 1024))
        .await
        .expect("select");
    assert!(!preview.data_url.is_empty());
    assert_eq!(controller.mode().await, UiMode::Previewing);

    let view = controller.identify().await.expect("identify");
    assert_eq!(view.species, "Pink Rose (Rosa)");
    assert_eq!(view.confidence_label(), "High Confidence");
    assert_eq!(view.health_label, "Healthy");
    assert_eq!(view.care_tips.len(), 4);

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.mode, UiMode::ShowingResult);
    assert!(snapshot.visibility.result && !snapshot.visibility.preview);
}

#[tokio::test]
async fn surfaced_failure_enters_error_state_and_retry_recovers() {
    let prediction = FakePrediction::new(PredictBehavior::Fail);
    let controller = controller_with(
        FailurePolicy::Surface,
        prediction.clone(),
        FakeDiary::healthy(),
        FakeCamera::new(true),
    );
    controller
        .select_file(jpeg_upload(2048))
        .await
        .expect("select");

    let err = controller.identify().await.expect_err("must fail");
    assert_eq!(err.category(), ErrorCategory::Service);
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.mode, UiMode::IdentificationFailed);
    assert!(snapshot.visibility.error);
    assert!(snapshot
        .last_error
        .as_deref()
        .is_some_and(|message| message.contains("connection refused")));

    *prediction.behavior.lock().await = PredictBehavior::Succeed(tulip_result());
    let view = controller.retry_identification().await.expect("retry");
    assert_eq!(view.confidence_label(), "Medium Confidence");
    assert_eq!(view.health_label, "Needs Attention");
    assert_eq!(controller.mode().await, UiMode::ShowingResult);
    assert_eq!(prediction.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn second_identify_while_pending_is_rejected() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let prediction = FakePrediction::new(PredictBehavior::Gated {
        started: started.clone(),
        release: release.clone(),
        result: tulip_result(),
    });
    let controller = controller_with(
        FailurePolicy::Surface,
        prediction.clone(),
        FakeDiary::healthy(),
        FakeCamera::new(true),
    );
    controller
        .select_file(jpeg_upload(2048))
        .await
        .expect("select");

    let pending = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.identify().await })
    };
    started.notified().await;

    assert!(controller.snapshot().await.busy);
    assert!(matches!(
        controller.identify().await,
        Err(SessionError::Busy)
    ));
    assert!(matches!(controller.retake().await, Err(SessionError::Busy)));

    release.notify_one();
    let view = pending.await.expect("join").expect("identify");
    assert_eq!(view.species, "Red Tulip (Tulipa gesneriana)");
    assert_eq!(prediction.calls.load(Ordering::SeqCst), 1);
    assert!(!controller.snapshot().await.busy);
}

#[tokio::test]
async fn camera_capture_freezes_frame_and_releases_stream() {
    let camera = FakeCamera::new(true);
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        FakeDiary::healthy(),
        camera.clone(),
    );

    controller.open_camera().await.expect("open");
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.mode, UiMode::CameraOpen);
    assert!(snapshot.visibility.camera);
    assert_eq!(snapshot.visibility.active_panels(), 1);

    let preview = controller.capture().await.expect("capture");
    assert!(preview.data_url.starts_with("data:image/jpeg;base64,"));
    assert_eq!(controller.mode().await, UiMode::Previewing);
    assert_eq!(camera.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn switching_camera_releases_previous_stream() {
    let camera = FakeCamera::new(true);
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        FakeDiary::healthy(),
        camera.clone(),
    );

    controller.open_camera().await.expect("open");
    let facing = controller.switch_camera().await.expect("switch");
    assert_eq!(facing, FacingMode::User);
    assert_eq!(camera.opens.load(Ordering::SeqCst), 2);
    assert_eq!(camera.stops.load(Ordering::SeqCst), 1);

    controller.close_camera().await.expect("close");
    assert_eq!(controller.mode().await, UiMode::Idle);
    assert_eq!(camera.stops.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn camera_denial_closes_camera_with_device_notice() {
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        FakeDiary::healthy(),
        FakeCamera::new(false),
    );
    let mut events = controller.subscribe_events();

    let err = controller.open_camera().await.expect_err("denied");
    assert_eq!(err.category(), ErrorCategory::Device);
    assert_eq!(controller.mode().await, UiMode::Idle);

    let notices = drain_notices(&mut events);
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.starts_with("Unable to access the camera."));
}

#[tokio::test]
async fn transitions_from_wrong_mode_are_refused() {
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        FakeDiary::healthy(),
        FakeCamera::new(true),
    );

    assert!(matches!(
        controller.identify().await,
        Err(SessionError::InvalidTransition {
            mode: UiMode::Idle,
            action: UiAction::Identify
        })
    ));
    assert!(controller.capture().await.is_err());
    assert!(controller.open_save_to_diary().await.is_err());
    assert!(controller.submit_diary().await.is_err());

    controller
        .select_file(jpeg_upload(64))
        .await
        .expect("select");
    assert!(controller.select_file(jpeg_upload(64)).await.is_err());
    assert!(controller.open_camera().await.is_err());
    assert_eq!(controller.mode().await, UiMode::Previewing);
}

#[tokio::test]
async fn save_to_diary_prefills_from_result_and_cancel_returns_to_result() {
    let controller = controller_with(
        FailurePolicy::Placeholder,
        FakePrediction::new(PredictBehavior::Fail),
        FakeDiary::healthy(),
        FakeCamera::new(true),
    );
    controller
        .select_file(jpeg_upload(512))
        .await
        .expect("select");
    controller.identify().await.expect("identify");

    let draft = controller.open_save_to_diary().await.expect("open modal");
    assert_eq!(draft.plant_name, "Pink Rose");
    assert_eq!(draft.flower_species.as_deref(), Some("Pink Rose (Rosa)"));
    assert!(draft
        .notes
        .starts_with("Care tips:\n- Roses thrive in full sun and well-drained soil\n- "));
    assert_eq!(
        draft.image.as_ref().map(|image| image.file_name.as_str()),
        Some("identified_flower.jpg")
    );

    let snapshot = controller.snapshot().await;
    assert!(snapshot.visibility.diary_modal);
    assert_eq!(snapshot.visibility.active_panels(), 1);

    controller.cancel_diary().await.expect("cancel");
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.mode, UiMode::ShowingResult);
    assert!(snapshot.result.is_some());
    assert!(snapshot.draft.is_none());
}

#[tokio::test]
async fn submitting_diary_entry_resets_session_and_refreshes_list() {
    let diary = FakeDiary::healthy();
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        diary.clone(),
        FakeCamera::new(true),
    );
    controller
        .select_file(jpeg_upload(512))
        .await
        .expect("select");
    controller.identify().await.expect("identify");
    let mut draft = controller.open_save_to_diary().await.expect("open modal");
    draft.notes = "Bought at the market".into();
    controller.update_draft(draft).await.expect("update");

    let view = controller.submit_diary().await.expect("submit");
    assert_eq!(view.cards().len(), 1);
    assert_eq!(view.cards()[0].title, "Red Tulip");

    let submissions = diary.submissions.lock().await.clone();
    assert_eq!(submissions.len(), 1);
    assert_eq!(&submissions[0].user_id, controller.user_id());
    assert_eq!(
        submissions[0].flower_species.as_deref(),
        Some("Red Tulip (Tulipa gesneriana)")
    );
    assert_eq!(submissions[0].notes, "Bought at the market");

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.mode, UiMode::Idle);
    assert!(snapshot.preview.is_none());
    assert!(snapshot.result.is_none());
    assert_eq!(snapshot.diary, Some(view));
}

#[tokio::test]
async fn blank_plant_name_keeps_modal_open() {
    let diary = FakeDiary::healthy();
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        diary.clone(),
        FakeCamera::new(true),
    );
    let draft = controller.open_add_entry().await.expect("open");
    assert_eq!(draft, DiaryDraft::default());
    controller
        .update_draft(DiaryDraft {
            plant_name: "   ".into(),
            ..DiaryDraft::default()
        })
        .await
        .expect("update");

    let err = controller.submit_diary().await.expect_err("rejected");
    assert!(matches!(
        err,
        SessionError::Validation(ValidationError::MissingPlantName)
    ));
    assert_eq!(controller.mode().await, UiMode::DiaryModalOpen);
    assert!(diary.submissions.lock().await.is_empty());
}

#[tokio::test]
async fn diary_failure_under_placeholder_policy_closes_modal_with_demo_entries() {
    let controller = controller_with(
        FailurePolicy::Placeholder,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        FakeDiary::failing(),
        FakeCamera::new(true),
    );
    controller.open_add_entry().await.expect("open");
    controller
        .update_draft(DiaryDraft {
            plant_name: "Fern".into(),
            notes: "shady corner".into(),
            ..DiaryDraft::default()
        })
        .await
        .expect("update");

    let view = controller.submit_diary().await.expect("placeholder refresh");
    assert_eq!(controller.mode().await, UiMode::Idle);
    assert_eq!(view.cards().len(), 2);
    assert_eq!(view.cards()[1].title, "Balcony Sunflower");
}

#[tokio::test]
async fn diary_failure_under_surface_policy_keeps_draft() {
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        FakeDiary::failing(),
        FakeCamera::new(true),
    );
    controller.open_add_entry().await.expect("open");
    let draft = DiaryDraft {
        plant_name: "Fern".into(),
        ..DiaryDraft::default()
    };
    controller.update_draft(draft.clone()).await.expect("update");

    let err = controller.submit_diary().await.expect_err("surfaced");
    assert_eq!(err.category(), ErrorCategory::Service);
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.mode, UiMode::DiaryModalOpen);
    assert_eq!(snapshot.draft, Some(draft));
    assert!(!snapshot.busy);
}

#[tokio::test]
async fn navigating_to_diary_refreshes_without_changing_mode() {
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        FakeDiary::healthy(),
        FakeCamera::new(true),
    );
    controller
        .select_file(jpeg_upload(64))
        .await
        .expect("select");

    let view = controller
        .navigate(Section::Diary)
        .await
        .expect("navigate")
        .expect("diary view");
    assert!(matches!(view, DiaryListView::Empty { .. }));
    assert!(controller
        .navigate(Section::Learn)
        .await
        .expect("navigate")
        .is_none());

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.section, Section::Learn);
    assert_eq!(snapshot.mode, UiMode::Previewing);
}

#[tokio::test]
async fn panels_stay_mutually_exclusive_through_a_full_session() {
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        FakeDiary::healthy(),
        FakeCamera::new(true),
    );
    let mut events = controller.subscribe_events();

    controller.open_camera().await.expect("open");
    controller.capture().await.expect("capture");
    controller.identify().await.expect("identify");
    controller.open_save_to_diary().await.expect("modal");
    controller.submit_diary().await.expect("submit");
    controller.open_camera().await.expect("reopen");
    controller.close_camera().await.expect("close");

    let mut visited = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::ModeChanged { to, .. } = event {
            assert!(PanelVisibility::for_mode(to).active_panels() <= 1);
            visited.push(to);
        }
    }
    assert_eq!(
        visited,
        vec![
            UiMode::CameraOpen,
            UiMode::Previewing,
            UiMode::ShowingResult,
            UiMode::DiaryModalOpen,
            UiMode::Idle,
            UiMode::CameraOpen,
            UiMode::Idle,
        ]
    );
}

#[tokio::test]
async fn theme_toggle_persists_through_controller() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let controller = SessionController::new_with_dependencies(
        &settings(FailurePolicy::Surface),
        FakePrediction::new(PredictBehavior::Fail),
        FakeDiary::healthy(),
        FakeCamera::new(true),
        store.clone(),
    );

    assert_eq!(controller.theme().expect("theme"), Theme::Light);
    assert_eq!(controller.toggle_theme().expect("toggle"), Theme::Dark);
    assert_eq!(store.get("theme").expect("get").as_deref(), Some("dark"));
    assert_eq!(controller.toggle_theme().expect("toggle"), Theme::Light);
    assert_eq!(store.get("theme").expect("get").as_deref(), Some("light"));
}

#[tokio::test]
async fn controllers_sharing_a_store_share_identity() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    let first = SessionController::new_with_dependencies(
        &settings(FailurePolicy::Surface),
        FakePrediction::new(PredictBehavior::Fail),
        FakeDiary::healthy(),
        FakeCamera::new(true),
        store.clone(),
    );
    let second = SessionController::new_with_dependencies(
        &settings(FailurePolicy::Surface),
        FakePrediction::new(PredictBehavior::Fail),
        FakeDiary::healthy(),
        FakeCamera::new(true),
        store,
    );
    assert_eq!(first.user_id(), second.user_id());
    assert!(first.user_id().as_str().starts_with("user_"));
}

#[tokio::test]
async fn pending_camera_permission_keeps_session_responsive() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let camera = Arc::new(PromptingCamera {
        inner: FakeCamera::new(true),
        started: started.clone(),
        release: release.clone(),
    });
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        FakeDiary::healthy(),
        camera,
    );

    let pending = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.open_camera().await })
    };
    started.notified().await;

    let snapshot = tokio::time::timeout(Duration::from_secs(1), controller.snapshot())
        .await
        .expect("snapshot while camera is opening");
    assert_eq!(snapshot.mode, UiMode::CameraOpen);
    assert!(snapshot.busy);
    assert!(matches!(
        tokio::time::timeout(Duration::from_secs(1), controller.close_camera())
            .await
            .expect("close while camera is opening"),
        Err(SessionError::Busy)
    ));

    release.notify_one();
    pending.await.expect("join").expect("open");
    assert!(!controller.snapshot().await.busy);
    controller.capture().await.expect("capture");
    assert_eq!(controller.mode().await, UiMode::Previewing);
}

#[tokio::test]
async fn stored_entry_is_reported_saved_when_reload_fails() {
    let diary = Arc::new(FakeDiary {
        fail_list: true,
        ..FakeDiary::default()
    });
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        diary.clone(),
        FakeCamera::new(true),
    );
    let mut events = controller.subscribe_events();
    controller.open_add_entry().await.expect("open");
    controller
        .update_draft(DiaryDraft {
            plant_name: "Fern".into(),
            ..DiaryDraft::default()
        })
        .await
        .expect("update");

    let view = controller.submit_diary().await.expect("entry saved");
    assert!(matches!(view, DiaryListView::Empty { .. }));
    assert_eq!(diary.entries.lock().await.len(), 1);
    assert_eq!(controller.mode().await, UiMode::Idle);

    let notices = drain_notices(&mut events);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].category, ErrorCategory::Service);
    assert!(notices[0].message.starts_with("diary list failed"));
}

#[tokio::test]
async fn retake_discards_preview_and_returns_to_idle() {
    let controller = controller_with(
        FailurePolicy::Surface,
        FakePrediction::new(PredictBehavior::Succeed(tulip_result())),
        FakeDiary::healthy(),
        FakeCamera::new(true),
    );
    controller
        .select_file(jpeg_upload(256))
        .await
        .expect("select");

    controller.retake().await.expect("retake");
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.mode, UiMode::Idle);
    assert!(snapshot.preview.is_none());
    assert!(snapshot.result.is_none());
    assert!(snapshot.last_error.is_none());
    assert!(matches!(
        controller.identify().await,
        Err(SessionError::InvalidTransition {
            mode: UiMode::Idle,
            action: UiAction::Identify
        })
    ));
}

#[tokio::test]
async fn new_identification_resets_after_result_and_after_failure() {
    let prediction = FakePrediction::new(PredictBehavior::Succeed(tulip_result()));
    let controller = controller_with(
        FailurePolicy::Surface,
        prediction.clone(),
        FakeDiary::healthy(),
        FakeCamera::new(true),
    );

    controller
        .select_file(jpeg_upload(256))
        .await
        .expect("select");
    controller.identify().await.expect("identify");
    controller
        .new_identification()
        .await
        .expect("reset from result");
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.mode, UiMode::Idle);
    assert!(snapshot.preview.is_none());
    assert!(snapshot.result.is_none());
    assert!(controller.identify().await.is_err());

    *prediction.behavior.lock().await = PredictBehavior::Fail;
    controller
        .select_file(jpeg_upload(256))
        .await
        .expect("select again");
    controller.identify().await.expect_err("service down");
    assert!(controller.snapshot().await.last_error.is_some());
    controller
        .new_identification()
        .await
        .expect("reset from failure");
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.mode, UiMode::Idle);
    assert!(snapshot.preview.is_none());
    assert!(snapshot.result.is_none());
    assert!(snapshot.last_error.is_none());
    assert!(matches!(
        controller.identify().await,
        Err(SessionError::InvalidTransition { .. })
    ));
}
