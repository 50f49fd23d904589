//! Results retrieval.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analysis::Results;
use crate::service::ScoringService;

use super::notify::NotificationHandle;
use super::store::JobStateStore;
use super::types::{JobError, SessionHandle, SessionTag};

/// Fetches result payloads into the store.
#[derive(Clone)]
pub struct ResultsLoader {
    service: Arc<dyn ScoringService>,
    store: JobStateStore,
    notifications: NotificationHandle,
}

impl ResultsLoader {
    pub fn new(
        service: Arc<dyn ScoringService>,
        store: JobStateStore,
        notifications: NotificationHandle,
    ) -> Self {
        Self {
            service,
            store,
            notifications,
        }
    }

    /// Fetch the results of a completed session once.
    ///
    /// On failure the job status is left as it is and results stay unset.
    /// Results for a superseded `tag` are dropped and reported as
    /// [`JobError::Cancelled`].
    pub async fn load(&self, tag: SessionTag, session: &SessionHandle) -> Result<Results, JobError> {
        match self.service.results(session.as_str()).await {
            Ok(results) => {
                if self.store.set_results(tag, results.clone()) {
                    info!(
                        session = %session,
                        students = results.summary.total_students,
                        questions = results.summary.total_questions,
                        "Results loaded"
                    );
                    self.notifications.success("Analysis results loaded");
                    Ok(results)
                } else {
                    debug!(session = %session, "Dropping results for superseded session");
                    Err(JobError::Cancelled)
                }
            }
            Err(e) => {
                warn!(session = %session, error = %e, "Failed to fetch results");
                self.notifications
                    .error(format!("Failed to load results: {}", e));
                Err(JobError::ResultsFetchFailure(e.to_string()))
            }
        }
    }

    /// Load the service's demonstration results.
    ///
    /// Sets results directly; session and status are left untouched.
    pub async fn load_sample(&self) -> Result<Results, JobError> {
        let tag = self.store.current_tag();

        let reply = match self.service.sample().await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Sample request failed");
                self.notifications
                    .error(format!("Failed to load sample results: {}", e));
                return Err(JobError::TransportFailure(e));
            }
        };

        match (reply.success, reply.results) {
            (true, Some(results)) => {
                if self.store.set_results(tag, results.clone()) {
                    info!("Sample results loaded");
                    self.notifications.success("Sample results loaded");
                } else {
                    debug!("Dropping sample results, a new upload started meanwhile");
                }
                Ok(results)
            }
            _ => {
                let message = reply
                    .error
                    .unwrap_or_else(|| "Sample results unavailable".to_string());
                warn!(error = %message, "Sample request rejected");
                self.notifications.error(message.clone());
                Err(JobError::SampleRejected(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::types::JobStatus;
    use crate::service::SampleReply;
    use crate::testing::{fixtures, MockScoringService};

    fn loader(mock: &Arc<MockScoringService>) -> (ResultsLoader, JobStateStore, NotificationHandle) {
        let store = JobStateStore::new();
        let notifications = NotificationHandle::default();
        let loader = ResultsLoader::new(mock.clone(), store.clone(), notifications.clone());
        (loader, store, notifications)
    }

    #[tokio::test]
    async fn test_sample_sets_results_only() {
        let mock = Arc::new(MockScoringService::new());
        let (loader, store, _) = loader(&mock);

        let results = loader.load_sample().await.unwrap();
        assert_eq!(store.results(), Some(results));
        assert_eq!(store.status().status, JobStatus::Idle);
        assert!(store.session().is_none());
    }

    #[tokio::test]
    async fn test_sample_rejected() {
        let mock = Arc::new(MockScoringService::new());
        mock.set_sample_reply(SampleReply {
            success: false,
            results: None,
            error: Some("Sample data not found".to_string()),
        })
        .await;
        let (loader, store, notifications) = loader(&mock);
        let mut rx = notifications.subscribe();

        let err = loader.load_sample().await.unwrap_err();
        assert!(matches!(err, JobError::SampleRejected(ref m) if m == "Sample data not found"));
        assert!(store.results().is_none());
        assert_eq!(rx.try_recv().unwrap().message, "Sample data not found");
    }

    #[tokio::test]
    async fn test_load_failure_leaves_results_unset() {
        let mock = Arc::new(MockScoringService::new());
        let (loader, store, _) = loader(&mock);
        let session = SessionHandle::new("missing").unwrap();

        let err = loader.load(store.current_tag(), &session).await.unwrap_err();
        assert!(matches!(err, JobError::ResultsFetchFailure(_)));
        assert!(store.results().is_none());
    }

    #[tokio::test]
    async fn test_load_for_superseded_tag_is_dropped() {
        let mock = Arc::new(MockScoringService::new());
        mock.set_results("s1", fixtures::sample_results()).await;
        let (loader, store, _) = loader(&mock);
        let session = SessionHandle::new("s1").unwrap();

        let tag = store.current_tag();
        store.retire("Tracking cancelled");

        let err = loader.load(tag, &session).await.unwrap_err();
        assert!(matches!(err, JobError::Cancelled));
        assert!(store.results().is_none());
    }
}
