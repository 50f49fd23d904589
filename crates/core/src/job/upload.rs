//! Upload submission.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::selection::{FilePicker, SelectedFile};
use crate::service::ScoringService;

use super::notify::NotificationHandle;
use super::poller::{PollHandle, ProgressPoller};
use super::store::JobStateStore;
use super::types::{JobError, SessionHandle};

/// Message shown once the service accepted a file.
pub const UPLOAD_RECEIVED: &str = "Upload received, analysis started";

/// Submits files and starts tracking the resulting session.
///
/// Uploads are serialised, and at most one poller is alive at a time.
pub struct UploadCoordinator {
    service: Arc<dyn ScoringService>,
    store: JobStateStore,
    notifications: NotificationHandle,
    poller: ProgressPoller,
    /// Held for the whole upload request.
    upload_lock: Mutex<()>,
    /// Poller of the current session, if any.
    active: Mutex<Option<PollHandle>>,
}

impl UploadCoordinator {
    pub fn new(
        service: Arc<dyn ScoringService>,
        store: JobStateStore,
        notifications: NotificationHandle,
        poller: ProgressPoller,
    ) -> Self {
        Self {
            service,
            store,
            notifications,
            poller,
            upload_lock: Mutex::new(()),
            active: Mutex::new(None),
        }
    }

    /// Upload a file and start polling its session.
    ///
    /// Any poller of a previous session is cancelled first. On failure the
    /// previous results and session are kept.
    pub async fn upload(&self, file: SelectedFile) -> Result<SessionHandle, JobError> {
        let _guard = self.upload_lock.lock().await;

        self.cancel_active().await;
        let tag = self.store.begin_upload(format!("Uploading {}...", file.name));
        info!(
            service = self.service.name(),
            file = %file.name,
            size = file.data.len(),
            "Uploading file"
        );

        let reply = match self.service.upload(&file).await {
            Ok(reply) => reply,
            Err(e) => {
                let message = format!("Upload failed: {}", e);
                warn!(file = %file.name, error = %e, "Upload request failed");
                self.store.fail_upload(tag, message.clone());
                self.notifications.error(message);
                return Err(JobError::TransportFailure(e));
            }
        };

        let session = if reply.success {
            reply.session_id.and_then(SessionHandle::new)
        } else {
            None
        };

        let Some(session) = session else {
            let message = match (reply.success, reply.error) {
                (false, Some(error)) if !error.is_empty() => error,
                (false, _) => "Upload failed".to_string(),
                (true, _) => "Upload response is missing a session id".to_string(),
            };
            warn!(file = %file.name, error = %message, "Upload rejected");
            self.store.fail_upload(tag, message.clone());
            self.notifications.error(message.clone());
            return Err(JobError::UploadRejected(message));
        };

        if !self.store.attach_session(tag, session.clone(), UPLOAD_RECEIVED) {
            warn!(session = %session, "Upload finished after tracking was cancelled");
            return Err(JobError::Cancelled);
        }

        info!(session = %session, "Upload accepted");
        self.notifications.info(format!("{} uploaded", file.name));

        let handle = self.poller.spawn(session.clone(), tag);
        *self.active.lock().await = Some(handle);

        Ok(session)
    }

    /// Ask `picker` for a file.
    ///
    /// An aborted choice is [`JobError::SelectionCancelled`] and is not
    /// notified; an unusable file is notified and returned.
    pub async fn select(&self, picker: &dyn FilePicker) -> Result<SelectedFile, JobError> {
        match picker.pick().await {
            Ok(Some(file)) => Ok(file),
            Ok(None) => Err(JobError::SelectionCancelled),
            Err(e) => {
                warn!(error = %e, "File selection failed");
                self.notifications.error(e.to_string());
                Err(JobError::InvalidSelection(e))
            }
        }
    }

    /// Ask `picker` for a file and upload it.
    ///
    /// Returns `Ok(None)` when the user cancelled the selection.
    pub async fn pick_and_upload(
        &self,
        picker: &dyn FilePicker,
    ) -> Result<Option<SessionHandle>, JobError> {
        match self.select(picker).await {
            Ok(file) => self.upload(file).await.map(Some),
            Err(JobError::SelectionCancelled) => {
                info!("File selection cancelled");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Handle of the current poller, if any.
    pub async fn active_poller(&self) -> Option<PollHandle> {
        self.active.lock().await.clone()
    }

    /// Cancel the current poller. Returns `true` if one was stopped.
    pub async fn cancel_active(&self) -> bool {
        match self.active.lock().await.take() {
            Some(handle) => handle.cancel(),
            None => false,
        }
    }
}
