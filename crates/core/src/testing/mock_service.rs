//! Mock scoring service for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::analysis::Results;
use crate::selection::SelectedFile;
use crate::service::{
    DownloadedFile, SampleReply, ScoringService, ServiceError, StatusReport, UploadReply,
};

/// A recorded service call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Upload { file_name: String },
    Status { session_id: String },
    Results { session_id: String },
    Download { session_id: String, kind: String },
    Sample,
}

/// Scripted status replies for one session.
#[derive(Debug, Default)]
struct StatusScript {
    queue: VecDeque<Result<StatusReport, ServiceError>>,
    /// Replayed once the queue is exhausted.
    last: Option<StatusReport>,
    delay: Option<Duration>,
}

/// Mock implementation of the ScoringService trait.
///
/// Provides controllable behavior for testing:
/// - Script upload replies (default: success with a fresh session id)
/// - Script per-session status sequences, including failures and delays
/// - Serve results, downloads and sample results
/// - Record every call for assertions
///
/// # Example
///
/// ```rust,ignore
/// let service = MockScoringService::new();
/// service.push_upload_session("s1").await;
/// service.push_status("s1", StatusReport::new(RemoteStatus::Processing, 40, "")).await;
/// service.push_status("s1", StatusReport::new(RemoteStatus::Completed, 100, "")).await;
/// service.set_results("s1", fixtures::sample_results()).await;
///
/// // Drive a JobOrchestrator built on it...
/// assert_eq!(service.status_calls("s1").await, 2);
/// ```
#[derive(Debug)]
pub struct MockScoringService {
    calls: Arc<RwLock<Vec<(chrono::DateTime<Utc>, RecordedCall)>>>,
    upload_replies: Arc<RwLock<VecDeque<Result<UploadReply, ServiceError>>>>,
    upload_delay: Arc<RwLock<Option<Duration>>>,
    statuses: Arc<RwLock<HashMap<String, StatusScript>>>,
    results: Arc<RwLock<HashMap<String, Results>>>,
    downloads: Arc<RwLock<HashMap<(String, String), DownloadedFile>>>,
    sample: Arc<RwLock<SampleReply>>,
    session_counter: AtomicU32,
}

impl Default for MockScoringService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScoringService {
    /// Create a new mock service.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            upload_replies: Arc::new(RwLock::new(VecDeque::new())),
            upload_delay: Arc::new(RwLock::new(None)),
            statuses: Arc::new(RwLock::new(HashMap::new())),
            results: Arc::new(RwLock::new(HashMap::new())),
            downloads: Arc::new(RwLock::new(HashMap::new())),
            sample: Arc::new(RwLock::new(SampleReply {
                success: true,
                results: Some(super::fixtures::sample_results()),
                error: None,
            })),
            session_counter: AtomicU32::new(0),
        }
    }

    /// Queue the reply for the next upload.
    pub async fn push_upload_reply(&self, reply: Result<UploadReply, ServiceError>) {
        self.upload_replies.write().await.push_back(reply);
    }

    /// Queue a successful upload returning `session_id`.
    pub async fn push_upload_session(&self, session_id: &str) {
        self.push_upload_reply(Ok(UploadReply {
            success: true,
            session_id: Some(session_id.to_string()),
            error: None,
        }))
        .await;
    }

    /// Queue an upload rejected with `error`.
    pub async fn push_upload_rejection(&self, error: &str) {
        self.push_upload_reply(Ok(UploadReply {
            success: false,
            session_id: None,
            error: Some(error.to_string()),
        }))
        .await;
    }

    /// Delay every upload reply.
    pub async fn set_upload_delay(&self, delay: Duration) {
        *self.upload_delay.write().await = Some(delay);
    }

    /// Queue a status report for `session_id`.
    pub async fn push_status(&self, session_id: &str, report: StatusReport) {
        self.statuses
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .queue
            .push_back(Ok(report));
    }

    /// Queue a failing status query for `session_id`.
    pub async fn push_status_error(&self, session_id: &str, error: ServiceError) {
        self.statuses
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .queue
            .push_back(Err(error));
    }

    /// Delay every status reply for `session_id`.
    pub async fn set_status_delay(&self, session_id: &str, delay: Duration) {
        self.statuses
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .delay = Some(delay);
    }

    pub async fn set_results(&self, session_id: &str, results: Results) {
        self.results
            .write()
            .await
            .insert(session_id.to_string(), results);
    }

    /// Serve `bytes` for `GET /download/{session_id}/{kind}`.
    pub async fn set_download(
        &self,
        session_id: &str,
        kind: &str,
        bytes: Vec<u8>,
        file_name: Option<String>,
    ) {
        self.downloads.write().await.insert(
            (session_id.to_string(), kind.to_string()),
            DownloadedFile { bytes, file_name },
        );
    }

    pub async fn set_sample_reply(&self, reply: SampleReply) {
        *self.sample.write().await = reply;
    }

    /// All recorded calls, oldest first.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .read()
            .await
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Number of status queries issued for `session_id`.
    pub async fn status_calls(&self, session_id: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|(_, call)| {
                matches!(call, RecordedCall::Status { session_id: id } if id == session_id)
            })
            .count()
    }

    /// Clear recorded calls.
    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }

    async fn record(&self, call: RecordedCall) {
        self.calls.write().await.push((Utc::now(), call));
    }
}

fn not_found(what: &str) -> ServiceError {
    ServiceError::Http {
        status: 404,
        message: format!("{} not found", what),
    }
}

#[async_trait]
impl ScoringService for MockScoringService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(&self, file: &SelectedFile) -> Result<UploadReply, ServiceError> {
        self.record(RecordedCall::Upload {
            file_name: file.name.clone(),
        })
        .await;

        let delay = *self.upload_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.upload_replies.write().await.pop_front() {
            Some(reply) => reply,
            None => {
                let n = self.session_counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(UploadReply {
                    success: true,
                    session_id: Some(format!("mock-session-{}", n)),
                    error: None,
                })
            }
        }
    }

    async fn status(&self, session_id: &str) -> Result<StatusReport, ServiceError> {
        self.record(RecordedCall::Status {
            session_id: session_id.to_string(),
        })
        .await;

        let (reply, delay) = {
            let mut statuses = self.statuses.write().await;
            let Some(script) = statuses.get_mut(session_id) else {
                return Err(not_found("Session"));
            };
            let reply = match script.queue.pop_front() {
                Some(Ok(report)) => {
                    script.last = Some(report.clone());
                    Ok(report)
                }
                Some(Err(e)) => Err(e),
                None => script.last.clone().ok_or_else(|| not_found("Session")),
            };
            (reply, script.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        reply
    }

    async fn results(&self, session_id: &str) -> Result<Results, ServiceError> {
        self.record(RecordedCall::Results {
            session_id: session_id.to_string(),
        })
        .await;

        self.results
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| not_found("Results"))
    }

    async fn download(
        &self,
        session_id: &str,
        kind: &str,
    ) -> Result<DownloadedFile, ServiceError> {
        self.record(RecordedCall::Download {
            session_id: session_id.to_string(),
            kind: kind.to_string(),
        })
        .await;

        self.downloads
            .read()
            .await
            .get(&(session_id.to_string(), kind.to_string()))
            .cloned()
            .ok_or_else(|| not_found("File"))
    }

    async fn sample(&self) -> Result<SampleReply, ServiceError> {
        self.record(RecordedCall::Sample).await;
        Ok(self.sample.read().await.clone())
    }
}
