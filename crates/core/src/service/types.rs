//! Types for scoring service operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::Results;
use crate::selection::SelectedFile;

/// Errors that can occur while talking to the scoring service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Remote job status as reported by `GET /status/{session_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Processing,
    Completed,
    Error,
}

impl RemoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteStatus::Processing => "processing",
            RemoteStatus::Completed => "completed",
            RemoteStatus::Error => "error",
        }
    }

    /// Whether polling must stop after this status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RemoteStatus::Processing)
    }
}

/// Reply to `POST /upload`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadReply {
    /// Rejections are sometimes sent as `{error}` alone, so this defaults to false.
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reply to `GET /status/{session_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: RemoteStatus,
    /// Percentage, 0-100.
    pub progress: u8,
    #[serde(default)]
    pub message: String,
}

impl StatusReport {
    pub fn new(status: RemoteStatus, progress: u8, message: impl Into<String>) -> Self {
        Self {
            status,
            progress,
            message: message.into(),
        }
    }

    /// Reject progress values outside the percentage range.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.progress > 100 {
            return Err(ServiceError::InvalidResponse(format!(
                "progress {} is out of range 0-100",
                self.progress
            )));
        }
        Ok(())
    }
}

/// Reply to `GET /api/sample`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Results>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of a successful `GET /download/{session_id}/{kind}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    /// File name announced by the service (`Content-Disposition`), if any.
    pub file_name: Option<String>,
}

/// Trait for scoring service backends.
#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Submit a spreadsheet for analysis.
    async fn upload(&self, file: &SelectedFile) -> Result<UploadReply, ServiceError>;

    /// Query the status of a submitted job.
    async fn status(&self, session_id: &str) -> Result<StatusReport, ServiceError>;

    /// Fetch the results of a completed job.
    async fn results(&self, session_id: &str) -> Result<Results, ServiceError>;

    /// Download an export artifact. `kind` is the path segment (`excel`, `pdf`).
    async fn download(&self, session_id: &str, kind: &str)
        -> Result<DownloadedFile, ServiceError>;

    /// Fetch the canned demonstration results.
    async fn sample(&self) -> Result<SampleReply, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_status_terminal() {
        assert!(!RemoteStatus::Processing.is_terminal());
        assert!(RemoteStatus::Completed.is_terminal());
        assert!(RemoteStatus::Error.is_terminal());
    }

    #[test]
    fn test_upload_reply_error_only() {
        let reply: UploadReply = serde_json::from_str(r#"{"error": "No file selected"}"#).unwrap();
        assert!(!reply.success);
        assert_eq!(reply.session_id, None);
        assert_eq!(reply.error.as_deref(), Some("No file selected"));
    }

    #[test]
    fn test_status_report_parse() {
        let report: StatusReport = serde_json::from_str(
            r#"{"status": "processing", "progress": 40, "message": "Tahlil qilinmoqda..."}"#,
        )
        .unwrap();
        assert_eq!(report.status, RemoteStatus::Processing);
        assert_eq!(report.progress, 40);
        assert!(report.validate().is_ok());
    }

    #[test]
    fn test_status_report_rejects_bad_shape() {
        assert!(serde_json::from_str::<StatusReport>(r#"{"status": "queued", "progress": 1}"#).is_err());
        assert!(serde_json::from_str::<StatusReport>(r#"{"status": "processing", "progress": -3}"#).is_err());
        assert!(serde_json::from_str::<StatusReport>(r#"{"status": "processing"}"#).is_err());
    }

    #[test]
    fn test_status_report_progress_out_of_range() {
        let report = StatusReport::new(RemoteStatus::Processing, 140, "");
        assert!(matches!(report.validate(), Err(ServiceError::InvalidResponse(_))));
    }
}
