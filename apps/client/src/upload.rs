/// Resume upload orchestration.
///
/// Drives a selected file through the three-phase hand-off (request target,
/// transfer bytes, confirm completion) and reconciles the optimistic local
/// phase with the authoritative record fetched from the resume service.
/// The phase machine is client-local and independent of the server-side
/// record status; the two are kept as separate fields and the server value
/// wins whenever a fresh fetch completes.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::errors::ClientError;
use crate::models::resume::{
    DownloadUrlResponse, ResumeListResponse, ResumeRecord, ResumeStatus, UploadUrlResponse,
};
use crate::transfer::{TransferError, Transport};

/// Storage policy bound; the authoritative check is server-side.
const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
const ACCEPTED_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];

pub const NO_RESUME_SENTINEL: &str = "No resume uploaded";

/// Client-local view of one in-flight upload attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UploadPhase {
    #[default]
    Idle,
    FileSelected,
    RequestingTarget,
    Transferring,
    Confirming,
    Done,
    Failed(FailureReason),
}

/// Why an attempt failed. Kept separate from the error type so the phase
/// machine stays cheap to clone and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    PresignMissing,
    StorageRejected,
    ConfirmRejected,
    Unauthenticated,
    Transport,
}

impl FailureReason {
    fn from_error(err: &ClientError) -> Self {
        match err {
            ClientError::PresignMissing => FailureReason::PresignMissing,
            ClientError::StorageRejected { .. } => FailureReason::StorageRejected,
            ClientError::ConfirmRejected => FailureReason::ConfirmRejected,
            ClientError::Unauthenticated
            | ClientError::Transfer(TransferError::Unauthenticated) => {
                FailureReason::Unauthenticated
            }
            _ => FailureReason::Transport,
        }
    }
}

#[derive(Debug, Clone)]
struct SelectedFile {
    name: String,
    bytes: Bytes,
    content_type: &'static str,
}

fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Default)]
struct UploadState {
    phase: UploadPhase,
    selected: Option<SelectedFile>,
    /// Status reported by the server on the last fetch. Always preferred
    /// over the optimistic value once present.
    server_status: Option<ResumeStatus>,
    /// Client-anticipated status set after a successful confirm, superseded
    /// by the next authoritative fetch.
    optimistic_status: Option<ResumeStatus>,
    latest: Option<ResumeRecord>,
}

pub struct UploadOrchestrator {
    transport: Arc<dyn Transport>,
    /// Monotonically increasing attempt id. Phase writes carry the id of
    /// the attempt that produced them and are discarded when superseded,
    /// replacing any reliance on incidental scheduling order.
    attempt: AtomicU64,
    state: Mutex<UploadState>,
}

impl UploadOrchestrator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            attempt: AtomicU64::new(0),
            state: Mutex::new(UploadState::default()),
        }
    }

    pub fn phase(&self) -> UploadPhase {
        self.state.lock().expect("upload state poisoned").phase.clone()
    }

    /// Registers a user-selected file. No network effect. A new selection
    /// implicitly abandons any in-flight attempt: the attempt id advances
    /// and stale completions are fenced out on arrival.
    pub fn select_file(&self, name: &str, bytes: Bytes) -> Result<(), ClientError> {
        let extension = name
            .rsplit('.')
            .next()
            .filter(|ext| *ext != name)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ClientError::Validation(
                "only .pdf, .doc and .docx files are accepted".to_string(),
            ));
        }
        if bytes.is_empty() {
            return Err(ClientError::Validation("selected file is empty".to_string()));
        }
        if bytes.len() > MAX_FILE_BYTES {
            return Err(ClientError::Validation(
                "file exceeds the 10 MiB upload limit".to_string(),
            ));
        }

        self.attempt.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().expect("upload state poisoned");
        state.selected = Some(SelectedFile {
            name: name.to_string(),
            content_type: content_type_for(&extension),
            bytes,
        });
        state.phase = UploadPhase::FileSelected;
        Ok(())
    }

    /// Runs the three-phase hand-off for the currently selected file and
    /// returns the identifier of the created record. Phases are strictly
    /// sequential; the confirmation is never issued before the direct
    /// upload has returned success for this attempt.
    pub async fn upload(&self) -> Result<Uuid, ClientError> {
        let attempt = self.attempt.load(Ordering::SeqCst);
        let file = self
            .state
            .lock()
            .expect("upload state poisoned")
            .selected
            .clone()
            .ok_or_else(|| ClientError::Validation("no file selected".to_string()))?;

        match self.run_attempt(attempt, &file).await {
            Ok(resume_id) => Ok(resume_id),
            Err(err) => {
                self.fail(attempt, &err);
                Err(err)
            }
        }
    }

    async fn run_attempt(&self, attempt: u64, file: &SelectedFile) -> Result<Uuid, ClientError> {
        self.set_phase(attempt, UploadPhase::RequestingTarget);
        let raw = self
            .transport
            .request_json(
                Method::POST,
                "/api/resume/upload-url",
                Some(json!({
                    "filename": file.name,
                    "file_size": file.bytes.len(),
                    "content_type": file.content_type,
                })),
                &[],
            )
            .await?;
        let presign: UploadUrlResponse =
            serde_json::from_value(raw).map_err(TransferError::Decode)?;
        let target = presign.into_target().ok_or(ClientError::PresignMissing)?;
        debug!(
            "upload target for {} valid for {}s",
            target.resume_id, target.expires_in
        );

        self.set_phase(attempt, UploadPhase::Transferring);
        self.transport
            .direct_upload(&target, file.bytes.clone(), &file.name)
            .await
            .map_err(|err| match err {
                TransferError::Upload { status, .. } => ClientError::StorageRejected { status },
                other => ClientError::Transfer(other),
            })?;

        self.set_phase(attempt, UploadPhase::Confirming);
        self.transport
            .notify_status(target.resume_id, "uploaded", Some(1.0))
            .await
            .map_err(|_| ClientError::ConfirmRejected)?;

        if self.set_phase(attempt, UploadPhase::Done) {
            let mut state = self.state.lock().expect("upload state poisoned");
            // Anticipate the asynchronous server-side parsing; the
            // authoritative fetch below supersedes this.
            state.optimistic_status = Some(ResumeStatus::Processing);
            state.selected = None;
        }

        // Read-your-writes: re-query the authoritative list instead of
        // patching local state, so concurrent server-side mutation wins.
        if self.attempt.load(Ordering::SeqCst) == attempt {
            if let Err(err) = self.refresh().await {
                warn!("post-upload refresh failed: {err}");
            }
        }

        Ok(target.resume_id)
    }

    /// Applies a phase transition unless the attempt has been superseded by
    /// a newer file selection.
    fn set_phase(&self, attempt: u64, phase: UploadPhase) -> bool {
        if self.attempt.load(Ordering::SeqCst) != attempt {
            debug!("discarding phase update from superseded attempt {attempt}");
            return false;
        }
        self.state.lock().expect("upload state poisoned").phase = phase;
        true
    }

    /// Converts a failed attempt into a user-visible terminal phase. The
    /// selected file is retained so the user can retry; the displayed
    /// resume status is untouched, so a failed attempt never shows a false
    /// "processing" state.
    fn fail(&self, attempt: u64, err: &ClientError) {
        if self.attempt.load(Ordering::SeqCst) != attempt {
            debug!("discarding failure from superseded attempt {attempt}");
            return;
        }
        error!("upload attempt failed: {err}");
        let mut state = self.state.lock().expect("upload state poisoned");
        state.phase = UploadPhase::Failed(FailureReason::from_error(err));
    }

    /// Read path: fetches the most recent record (page size 1, offset 0)
    /// and derives display state purely from server truth.
    pub async fn refresh(&self) -> Result<Option<ResumeRecord>, ClientError> {
        let raw = self
            .transport
            .request_json(
                Method::GET,
                "/api/resume/",
                None,
                &[("skip", "0".to_string()), ("limit", "1".to_string())],
            )
            .await?;
        let list: ResumeListResponse = serde_json::from_value(raw).map_err(TransferError::Decode)?;
        let latest = list.resumes.into_iter().next();

        let mut state = self.state.lock().expect("upload state poisoned");
        state.server_status = latest.as_ref().map(|record| record.status);
        // Fresh server truth supersedes optimism, preventing drift if a
        // confirmation was silently lost upstream.
        state.optimistic_status = None;
        state.latest = latest.clone();
        Ok(latest)
    }

    /// Display status: server truth when fetched, the optimistic value
    /// while a confirmation settles, else the empty-state sentinel.
    pub fn display_status(&self) -> String {
        let state = self.state.lock().expect("upload state poisoned");
        state
            .server_status
            .or(state.optimistic_status)
            .map(|status| status.label().to_string())
            .unwrap_or_else(|| NO_RESUME_SENTINEL.to_string())
    }

    pub fn latest_record(&self) -> Option<ResumeRecord> {
        self.state.lock().expect("upload state poisoned").latest.clone()
    }

    /// Download path: requests a short-lived address for the given record.
    /// A response without an address is a hard failure, never silently
    /// ignored.
    pub async fn download_url(&self, resume_id: Uuid) -> Result<String, ClientError> {
        let raw = self
            .transport
            .request_json(
                Method::GET,
                &format!("/api/resume/{resume_id}/download"),
                None,
                &[],
            )
            .await?;
        let response: DownloadUrlResponse =
            serde_json::from_value(raw).map_err(TransferError::Decode)?;
        response
            .url
            .filter(|url| !url.is_empty())
            .ok_or(ClientError::DownloadUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::models::resume::UploadTarget;

    const RESUME_ID: &str = "5f6f9f2e-7f90-4f4e-9a84-1f9c30f0a001";

    /// Instrumented transport: records call order, serves scripted
    /// responses, and can inject latency on the target-request step.
    struct FakeTransport {
        calls: Mutex<Vec<&'static str>>,
        presign: Value,
        presign_delay: Option<Duration>,
        storage_reject: Option<u16>,
        confirm_reject: bool,
        list: Value,
        download: Value,
    }

    impl FakeTransport {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                presign: json!({
                    "resume_id": RESUME_ID,
                    "upload_url": "https://storage.example/bucket",
                    "upload_fields": { "key": "resumes/u1/abc.pdf", "policy": "p" },
                    "expires_in": 600,
                }),
                presign_delay: None,
                storage_reject: None,
                confirm_reject: false,
                list: json!({
                    "resumes": [{
                        "id": RESUME_ID,
                        "original_filename": "abc.pdf",
                        "file_size": 3,
                        "status": "uploaded",
                        "upload_progress": 1.0,
                        "uploaded_at": "2025-11-02T10:00:00Z",
                    }],
                    "total": 1,
                }),
                download: json!({ "url": "https://storage.example/signed-get", "expires_in": 600 }),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().expect("calls lock").push(call);
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn request_json(
            &self,
            _method: Method,
            path: &str,
            _body: Option<Value>,
            _query: &[(&str, String)],
        ) -> Result<Value, TransferError> {
            if path == "/api/resume/upload-url" {
                if let Some(delay) = self.presign_delay {
                    tokio::time::sleep(delay).await;
                }
                self.record("presign");
                return Ok(self.presign.clone());
            }
            if path == "/api/resume/" {
                self.record("list");
                return Ok(self.list.clone());
            }
            if path.ends_with("/download") {
                self.record("download");
                return Ok(self.download.clone());
            }
            Err(TransferError::Http {
                status: 404,
                body: format!("unexpected path {path}"),
            })
        }

        async fn direct_upload(
            &self,
            target: &UploadTarget,
            _file_bytes: Bytes,
            _file_name: &str,
        ) -> Result<(), TransferError> {
            self.record("upload");
            // Every presign field must arrive verbatim.
            assert_eq!(
                target.fields.get("key").map(String::as_str),
                Some("resumes/u1/abc.pdf")
            );
            assert_eq!(target.fields.get("policy").map(String::as_str), Some("p"));
            if let Some(status) = self.storage_reject {
                return Err(TransferError::Upload {
                    status,
                    raw_body: "<Error>AccessDenied</Error>".to_string(),
                });
            }
            Ok(())
        }

        async fn notify_status(
            &self,
            _resume_id: Uuid,
            status: &str,
            progress: Option<f64>,
        ) -> Result<Value, TransferError> {
            self.record("notify");
            assert_eq!(status, "uploaded");
            assert_eq!(progress, Some(1.0));
            if self.confirm_reject {
                return Err(TransferError::Http {
                    status: 500,
                    body: "confirm failed".to_string(),
                });
            }
            Ok(json!({ "status": "uploaded" }))
        }
    }

    fn orchestrator(fake: FakeTransport) -> (Arc<FakeTransport>, UploadOrchestrator) {
        let fake = Arc::new(fake);
        let orchestrator = UploadOrchestrator::new(fake.clone());
        (fake, orchestrator)
    }

    fn select_pdf(orchestrator: &UploadOrchestrator) {
        orchestrator
            .select_file("abc.pdf", Bytes::from_static(b"pdf"))
            .expect("select");
    }

    #[tokio::test]
    async fn test_happy_path_runs_phases_in_order_and_returns_the_presign_id() {
        let (fake, orchestrator) = orchestrator(FakeTransport::new());
        select_pdf(&orchestrator);

        let resume_id = orchestrator.upload().await.expect("upload");
        assert_eq!(resume_id.to_string(), RESUME_ID);
        assert_eq!(fake.calls(), vec!["presign", "upload", "notify", "list"]);
        assert_eq!(orchestrator.phase(), UploadPhase::Done);

        // Re-fetched record matches the presign id and is at least uploaded.
        let latest = orchestrator.latest_record().expect("record");
        assert_eq!(latest.id, resume_id);
        assert_eq!(latest.status, ResumeStatus::Uploaded);
        assert_eq!(orchestrator.display_status(), "uploaded");
    }

    #[tokio::test]
    async fn test_presign_without_fields_fails_and_never_uploads() {
        let mut fake = FakeTransport::new();
        fake.presign = json!({
            "resume_id": RESUME_ID,
            "upload_url": "https://storage.example/bucket",
        });
        let (fake, orchestrator) = orchestrator(fake);
        select_pdf(&orchestrator);

        let err = orchestrator.upload().await.expect_err("must fail");
        assert!(matches!(err, ClientError::PresignMissing));
        assert_eq!(fake.calls(), vec!["presign"]);
        assert_eq!(
            orchestrator.phase(),
            UploadPhase::Failed(FailureReason::PresignMissing)
        );
    }

    #[tokio::test]
    async fn test_storage_rejection_leaves_display_status_unchanged() {
        let mut fake = FakeTransport::new();
        fake.storage_reject = Some(403);
        let (fake, orchestrator) = orchestrator(fake);
        select_pdf(&orchestrator);

        let before = orchestrator.display_status();
        let err = orchestrator.upload().await.expect_err("must fail");
        assert!(matches!(err, ClientError::StorageRejected { status: 403 }));
        assert_eq!(
            orchestrator.phase(),
            UploadPhase::Failed(FailureReason::StorageRejected)
        );
        // No confirmation was sent and no false "processing" is shown.
        assert!(!fake.calls().contains(&"notify"));
        assert_eq!(orchestrator.display_status(), before);
        assert_eq!(orchestrator.display_status(), NO_RESUME_SENTINEL);
    }

    #[tokio::test]
    async fn test_confirm_rejection_is_its_own_failure() {
        let mut fake = FakeTransport::new();
        fake.confirm_reject = true;
        let (fake, orchestrator) = orchestrator(fake);
        select_pdf(&orchestrator);

        let err = orchestrator.upload().await.expect_err("must fail");
        assert!(matches!(err, ClientError::ConfirmRejected));
        assert_eq!(fake.calls(), vec!["presign", "upload", "notify"]);
        assert_eq!(
            orchestrator.phase(),
            UploadPhase::Failed(FailureReason::ConfirmRejected)
        );
        assert_eq!(orchestrator.display_status(), NO_RESUME_SENTINEL);
    }

    #[tokio::test]
    async fn test_confirmation_never_precedes_the_upload_under_latency() {
        let mut fake = FakeTransport::new();
        fake.presign_delay = Some(Duration::from_millis(50));
        let (fake, orchestrator) = orchestrator(fake);
        select_pdf(&orchestrator);

        orchestrator.upload().await.expect("upload");
        let calls = fake.calls();
        let upload_at = calls.iter().position(|c| *c == "upload").expect("upload");
        let notify_at = calls.iter().position(|c| *c == "notify").expect("notify");
        assert!(
            upload_at < notify_at,
            "confirmation must follow the direct upload: {calls:?}"
        );
    }

    #[tokio::test]
    async fn test_reselecting_a_file_fences_out_the_stale_attempt() {
        let mut fake = FakeTransport::new();
        fake.presign_delay = Some(Duration::from_millis(100));
        let fake = Arc::new(fake);
        let orchestrator = Arc::new(UploadOrchestrator::new(fake.clone()));
        select_pdf(&orchestrator);

        let stale = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.upload().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // A new selection abandons the in-flight attempt.
        orchestrator
            .select_file("newer.docx", Bytes::from_static(b"docx"))
            .expect("select");
        assert_eq!(orchestrator.phase(), UploadPhase::FileSelected);

        stale.await.expect("join").expect("stale upload completes");
        // The stale completion must not move the phase machine.
        assert_eq!(orchestrator.phase(), UploadPhase::FileSelected);
        assert_eq!(orchestrator.display_status(), NO_RESUME_SENTINEL);
    }

    #[tokio::test]
    async fn test_advisory_checks_reject_before_any_network_call() {
        let (fake, orchestrator) = orchestrator(FakeTransport::new());

        let err = orchestrator
            .select_file("notes.txt", Bytes::from_static(b"text"))
            .expect_err("extension");
        assert!(matches!(err, ClientError::Validation(_)));

        let err = orchestrator
            .select_file("resume.pdf", Bytes::from(vec![0u8; MAX_FILE_BYTES + 1]))
            .expect_err("size");
        assert!(matches!(err, ClientError::Validation(_)));

        let err = orchestrator
            .select_file("resume.pdf", Bytes::new())
            .expect_err("empty");
        assert!(matches!(err, ClientError::Validation(_)));

        let err = orchestrator.upload().await.expect_err("nothing selected");
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(fake.calls().is_empty());
        assert_eq!(orchestrator.phase(), UploadPhase::Idle);
    }

    #[tokio::test]
    async fn test_empty_list_shows_the_sentinel_not_an_error() {
        let mut fake = FakeTransport::new();
        fake.list = json!({ "resumes": [], "total": 0 });
        let (_fake, orchestrator) = orchestrator(fake);

        let latest = orchestrator.refresh().await.expect("refresh");
        assert!(latest.is_none());
        assert_eq!(orchestrator.display_status(), NO_RESUME_SENTINEL);
    }

    #[tokio::test]
    async fn test_fresh_fetch_supersedes_the_optimistic_status() {
        let mut fake = FakeTransport::new();
        fake.list = json!({
            "resumes": [{
                "id": RESUME_ID,
                "original_filename": "abc.pdf",
                "file_size": 3,
                "status": "parsed",
                "upload_progress": 1.0,
                "uploaded_at": "2025-11-02T10:00:00Z",
            }],
            "total": 1,
        });
        let (_fake, orchestrator) = orchestrator(fake);
        select_pdf(&orchestrator);

        orchestrator.upload().await.expect("upload");
        // The optimistic "processing" was replaced by the server's answer.
        assert_eq!(orchestrator.display_status(), "parsed");
    }

    #[tokio::test]
    async fn test_download_with_missing_address_is_a_hard_failure() {
        let mut fake = FakeTransport::new();
        fake.download = json!({ "expires_in": 600 });
        let (_fake, orchestrator) = orchestrator(fake);

        let err = orchestrator
            .download_url(RESUME_ID.parse().expect("uuid"))
            .await
            .expect_err("must fail");
        assert!(matches!(err, ClientError::DownloadUnavailable));
    }

    #[tokio::test]
    async fn test_download_hands_back_the_signed_address() {
        let (_fake, orchestrator) = orchestrator(FakeTransport::new());
        let url = orchestrator
            .download_url(RESUME_ID.parse().expect("uuid"))
            .await
            .expect("download");
        assert_eq!(url, "https://storage.example/signed-get");
    }
}
