//! Job lifecycle facade.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::analysis::Results;
use crate::config::PollingConfig;
use crate::selection::{FilePicker, SelectedFile};
use crate::service::ScoringService;

use super::export::ExportCoordinator;
use super::loader::ResultsLoader;
use super::notify::{Notification, NotificationHandle};
use super::poller::{PollHandle, ProgressPoller};
use super::store::JobStateStore;
use super::types::{ExportArtifact, ExportKind, JobError, JobStatus, PollOutcome, SessionHandle};
use super::upload::UploadCoordinator;

/// Status message of a job whose tracking was cancelled.
pub const TRACKING_CANCELLED: &str = "Tracking cancelled";

/// Wires the lifecycle components around one scoring service.
///
/// Front ends observe [`JobStateStore`] and the notification stream, and
/// drive everything else through this type.
pub struct JobOrchestrator {
    store: JobStateStore,
    notifications: NotificationHandle,
    uploads: UploadCoordinator,
    loader: ResultsLoader,
    exports: ExportCoordinator,
}

impl JobOrchestrator {
    /// Create an orchestrator with a fresh store.
    pub fn new(service: Arc<dyn ScoringService>, polling: &PollingConfig) -> Self {
        Self::with_store(service, polling, JobStateStore::new())
    }

    /// Create an orchestrator writing into `store`.
    pub fn with_store(
        service: Arc<dyn ScoringService>,
        polling: &PollingConfig,
        store: JobStateStore,
    ) -> Self {
        let notifications = NotificationHandle::default();
        let loader = ResultsLoader::new(service.clone(), store.clone(), notifications.clone());
        let poller = ProgressPoller::new(
            service.clone(),
            store.clone(),
            notifications.clone(),
            loader.clone(),
            polling.interval(),
        );
        let uploads =
            UploadCoordinator::new(service.clone(), store.clone(), notifications.clone(), poller);
        let exports = ExportCoordinator::new(service, store.clone(), notifications.clone());

        Self {
            store,
            notifications,
            uploads,
            loader,
            exports,
        }
    }

    pub fn store(&self) -> &JobStateStore {
        &self.store
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub async fn upload(&self, file: SelectedFile) -> Result<SessionHandle, JobError> {
        self.uploads.upload(file).await
    }

    /// Ask `picker` for a file without uploading it.
    pub async fn select_file(&self, picker: &dyn FilePicker) -> Result<SelectedFile, JobError> {
        self.uploads.select(picker).await
    }

    pub async fn pick_and_upload(
        &self,
        picker: &dyn FilePicker,
    ) -> Result<Option<SessionHandle>, JobError> {
        self.uploads.pick_and_upload(picker).await
    }

    pub async fn load_sample(&self) -> Result<Results, JobError> {
        self.loader.load_sample().await
    }

    pub async fn export(&self, kind: ExportKind) -> Result<ExportArtifact, JobError> {
        self.exports.export(kind).await
    }

    /// Fetch the results of the current session again.
    ///
    /// Only valid once the session is `completed`; used to recover when the
    /// automatic fetch after completion failed.
    pub async fn reload_results(&self) -> Result<Results, JobError> {
        let snapshot = self.store.snapshot();
        let Some(session) = snapshot.session else {
            self.notifications
                .error("No analysis session yet, upload a file first");
            return Err(JobError::NoActiveSession);
        };
        if snapshot.status.status != JobStatus::Completed {
            let message = format!("Analysis is {}, results are not ready", snapshot.status.status);
            warn!(session = %session, "{}", message);
            self.notifications.error(message.clone());
            return Err(JobError::ResultsFetchFailure(message));
        }

        info!(session = %session, "Reloading results");
        self.loader.load(snapshot.tag, &session).await
    }

    /// Stop tracking the current session.
    ///
    /// The generation is retired before the poller is stopped, so responses
    /// still in flight are discarded and a `processing` job is settled to
    /// `{error, last progress, "Tracking cancelled"}`. Returns `true` if a
    /// poller was running.
    pub async fn cancel(&self) -> bool {
        let settled = self.store.retire(TRACKING_CANCELLED);
        let cancelled = self.uploads.cancel_active().await;
        if settled {
            info!(poller = cancelled, "Job tracking cancelled");
            self.notifications.info(TRACKING_CANCELLED);
        }
        cancelled
    }

    /// Handle of the current poller, if any.
    pub async fn active_poller(&self) -> Option<PollHandle> {
        self.uploads.active_poller().await
    }

    /// Wait until the current poller finishes; `None` if nothing is being tracked.
    pub async fn wait_for_completion(&self) -> Option<PollOutcome> {
        let handle = self.uploads.active_poller().await?;
        Some(handle.wait().await)
    }
}
