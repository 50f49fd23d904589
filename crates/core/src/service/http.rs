//! HTTP scoring service client.

use async_trait::async_trait;
use reqwest::{header, multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::analysis::Results;
use crate::config::ServiceConfig;
use crate::selection::SelectedFile;

use super::{DownloadedFile, SampleReply, ScoringService, ServiceError, StatusReport, UploadReply};

/// Scoring service reached over JSON/HTTP.
pub struct HttpScoringService {
    client: Client,
    base_url: String,
}

/// Error body the service sends with non-2xx replies.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpScoringService {
    /// Create a new client for the configured service.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ServiceError::Connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn get(&self, endpoint: &str) -> Result<Response, ServiceError> {
        let url = self.url(endpoint);
        debug!(url = %url, "GET");
        self.client.get(&url).send().await.map_err(map_request_error)
    }

    /// Read a body as JSON, turning non-2xx replies into `ServiceError::Http`.
    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
        let status = response.status();
        let body = response.text().await.map_err(map_request_error)?;

        if !status.is_success() {
            return Err(http_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }

    /// Like `read_json`, but a non-2xx reply whose body still parses as `T`
    /// is returned as a value (the service reports rejections that way).
    async fn read_json_lenient<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
        let status = response.status();
        let body = response.text().await.map_err(map_request_error)?;

        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => Err(http_error(status.as_u16(), &body)),
            Err(e) => Err(ServiceError::InvalidResponse(e.to_string())),
        }
    }
}

fn map_request_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout
    } else if e.is_connect() {
        ServiceError::Connection(e.to_string())
    } else if e.is_decode() {
        ServiceError::InvalidResponse(e.to_string())
    } else {
        ServiceError::Connection(e.to_string())
    }
}

fn http_error(status: u16, body: &str) -> ServiceError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.chars().take(200).collect());
    ServiceError::Http { status, message }
}

fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Extract the file name from a `Content-Disposition` header value.
fn parse_content_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

#[async_trait]
impl ScoringService for HttpScoringService {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload(&self, file: &SelectedFile) -> Result<UploadReply, ServiceError> {
        let part = multipart::Part::bytes(file.data.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| ServiceError::InvalidResponse(format!("invalid MIME type: {}", e)))?;
        let form = multipart::Form::new().part("file", part);

        let url = self.url("/upload");
        debug!(url = %url, file = %file.name, size = file.data.len(), "POST upload");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(map_request_error)?;

        Self::read_json_lenient(response).await
    }

    async fn status(&self, session_id: &str) -> Result<StatusReport, ServiceError> {
        let response = self
            .get(&format!("/status/{}", encode_segment(session_id)))
            .await?;
        let report: StatusReport = Self::read_json(response).await?;
        report.validate()?;
        Ok(report)
    }

    async fn results(&self, session_id: &str) -> Result<Results, ServiceError> {
        let response = self
            .get(&format!("/results/{}", encode_segment(session_id)))
            .await?;
        let results: Results = Self::read_json(response).await?;
        results.validate().map_err(ServiceError::InvalidResponse)?;
        Ok(results)
    }

    async fn download(
        &self,
        session_id: &str,
        kind: &str,
    ) -> Result<DownloadedFile, ServiceError> {
        let response = self
            .get(&format!(
                "/download/{}/{}",
                encode_segment(session_id),
                encode_segment(kind)
            ))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(session_id, kind, status = status.as_u16(), "Download rejected");
            return Err(http_error(status.as_u16(), &body));
        }

        let file_name = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition);
        let bytes = response.bytes().await.map_err(map_request_error)?;

        Ok(DownloadedFile {
            bytes: bytes.to_vec(),
            file_name,
        })
    }

    async fn sample(&self) -> Result<SampleReply, ServiceError> {
        let response = self.get("/api/sample").await?;
        let reply: SampleReply = Self::read_json_lenient(response).await?;
        if let Some(results) = &reply.results {
            results.validate().map_err(ServiceError::InvalidResponse)?;
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_disposition() {
        assert_eq!(
            parse_content_disposition("attachment; filename=rasch_results_s1.xlsx"),
            Some("rasch_results_s1.xlsx".to_string())
        );
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="report.pdf""#),
            Some("report.pdf".to_string())
        );
        assert_eq!(parse_content_disposition("attachment"), None);
        assert_eq!(parse_content_disposition("attachment; filename=\"\""), None);
    }

    #[test]
    fn test_http_error_prefers_error_field() {
        match http_error(404, r#"{"error": "Session not found"}"#) {
            ServiceError::Http { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Session not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        match http_error(500, "Internal Server Error") {
            ServiceError::Http { message, .. } => assert_eq!(message, "Internal Server Error"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = ServiceConfig {
            base_url: "http://127.0.0.1:5000/".to_string(),
            ..Default::default()
        };
        let service = HttpScoringService::new(&config).unwrap();
        assert_eq!(service.base_url(), "http://127.0.0.1:5000");
        assert_eq!(service.url("/upload"), "http://127.0.0.1:5000/upload");
    }

    #[test]
    fn test_session_id_is_encoded() {
        assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
    }
}
