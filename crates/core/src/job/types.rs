//! Types for the job lifecycle.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::selection::SelectionError;
use crate::service::ServiceError;

/// Errors surfaced by job lifecycle operations.
///
/// None of these is fatal; the user can always start a new upload.
#[derive(Debug, Error)]
pub enum JobError {
    /// The user aborted file selection; callers treat it as a no-op.
    #[error("file selection cancelled")]
    SelectionCancelled,

    #[error("invalid selection: {0}")]
    InvalidSelection(#[from] SelectionError),

    /// The service answered the upload with `success: false`.
    #[error("upload rejected: {0}")]
    UploadRejected(String),

    /// A network or I/O failure on any call.
    #[error("transport failure: {0}")]
    TransportFailure(#[source] ServiceError),

    /// Tracking ended in `error`: a failed status check or a remote failure.
    #[error("analysis failed: {0}")]
    PollFailure(String),

    #[error("failed to fetch results: {0}")]
    ResultsFetchFailure(String),

    #[error("{kind} export failed: {message}")]
    ExportFailure { kind: ExportKind, message: String },

    /// An operation needed a session but no upload succeeded in this run.
    #[error("no active session")]
    NoActiveSession,

    #[error("sample results unavailable: {0}")]
    SampleRejected(String),

    /// Tracking was cancelled, or the upload finished after it was.
    #[error("cancelled")]
    Cancelled,
}

/// Lifecycle state of the current job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Idle,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// `completed` and `error` end a session's tracking.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status, progress and message as shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub status: JobStatus,
    /// Percentage, 0-100.
    pub progress: u8,
    pub message: String,
}

impl ProcessingStatus {
    pub fn new(status: JobStatus, progress: u8, message: impl Into<String>) -> Self {
        Self {
            status,
            progress: progress.min(100),
            message: message.into(),
        }
    }
}

/// Opaque token identifying one submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Returns `None` for an empty or blank token.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generation number under which an asynchronous response was requested.
///
/// The store bumps it whenever a new upload begins or tracking is
/// cancelled; writes carrying an older tag are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionTag(pub(crate) u64);

impl SessionTag {
    pub fn value(&self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Export artifact kinds offered by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// Primary spreadsheet with all computed sheets.
    Excel,
    /// Document report.
    Pdf,
}

impl ExportKind {
    /// Path segment of the download endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Excel => "excel",
            ExportKind::Pdf => "pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportKind::Excel => "xlsx",
            ExportKind::Pdf => "pdf",
        }
    }

    /// File name the service uses for this export.
    pub fn default_file_name(&self, session: &SessionHandle) -> String {
        format!("rasch_results_{}.{}", session, self.extension())
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "excel" | "xlsx" => Ok(ExportKind::Excel),
            "pdf" => Ok(ExportKind::Pdf),
            other => Err(format!("unknown export kind: {} (expected excel or pdf)", other)),
        }
    }
}

/// A downloaded export, ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub kind: ExportKind,
    /// Bare file name, never containing directories.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Build an artifact, falling back to the default name when the
    /// announced one is missing or not a plain file name.
    pub fn new(
        kind: ExportKind,
        session: &SessionHandle,
        announced_name: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let file_name = announced_name
            .as_deref()
            .and_then(|name| Path::new(name).file_name())
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty() && *name != "..")
            .map(str::to_string)
            .unwrap_or_else(|| kind.default_file_name(session));

        Self {
            kind,
            file_name,
            bytes,
        }
    }
}

/// How a poller task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The job completed; `results_loaded` tells whether the follow-up
    /// results fetch succeeded.
    Completed { results_loaded: bool },
    /// The job failed remotely or a status check failed.
    Failed { message: String },
    /// Tracking was cancelled or superseded by a newer upload.
    Cancelled,
}

impl PollOutcome {
    /// `Ok(results_loaded)` for a completed job, the matching error otherwise.
    pub fn into_result(self) -> Result<bool, JobError> {
        match self {
            PollOutcome::Completed { results_loaded } => Ok(results_loaded),
            PollOutcome::Failed { message } => Err(JobError::PollFailure(message)),
            PollOutcome::Cancelled => Err(JobError::Cancelled),
        }
    }
}
