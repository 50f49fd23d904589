//! Export artifact retrieval.

use std::sync::Arc;

use tracing::{info, warn};

use crate::service::ScoringService;

use super::notify::NotificationHandle;
use super::store::JobStateStore;
use super::types::{ExportArtifact, ExportKind, JobError};

/// Requests export artifacts for the current session.
///
/// Independent of polling: the service decides whether an export is ready.
#[derive(Clone)]
pub struct ExportCoordinator {
    service: Arc<dyn ScoringService>,
    store: JobStateStore,
    notifications: NotificationHandle,
}

impl ExportCoordinator {
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

    /// Download the `kind` export of the current session.
    ///
    /// Fails with `NoActiveSession`, without any request, when no upload has
    /// succeeded yet.
    pub async fn export(&self, kind: ExportKind) -> Result<ExportArtifact, JobError> {
        let Some(session) = self.store.session() else {
            warn!(kind = kind.as_str(), "Export requested without a session");
            self.notifications
                .error("No analysis session yet, upload a file first");
            return Err(JobError::NoActiveSession);
        };

        match self.service.download(session.as_str(), kind.as_str()).await {
            Ok(file) => {
                let artifact = ExportArtifact::new(kind, &session, file.file_name, file.bytes);
                info!(
                    session = %session,
                    kind = kind.as_str(),
                    file = %artifact.file_name,
                    size = artifact.bytes.len(),
                    "Export downloaded"
                );
                self.notifications
                    .success(format!("{} downloaded", artifact.file_name));
                Ok(artifact)
            }
            Err(e) => {
                warn!(session = %session, kind = kind.as_str(), error = %e, "Export failed");
                self.notifications
                    .error(format!("Failed to download {} export: {}", kind, e));
                Err(JobError::ExportFailure {
                    kind,
                    message: e.to_string(),
                })
            }
        }
    }
}
