//! Process-local job state.

use tokio::sync::watch;
use tracing::debug;

use crate::analysis::Results;
use crate::service::{RemoteStatus, StatusReport};

use super::types::{JobStatus, ProcessingStatus, SessionHandle, SessionTag};

/// Everything observers can see about the current job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobSnapshot {
    pub status: ProcessingStatus,
    pub results: Option<Results>,
    pub session: Option<SessionHandle>,
    /// Current generation; see [`SessionTag`].
    pub tag: SessionTag,
}

/// Result of applying a status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Out-of-order or post-terminal response for the current session.
    Stale,
    /// The tag is no longer current.
    Superseded,
}

/// Single source of truth for the job lifecycle.
///
/// Cheaply cloneable; clones share state. Anyone can read or subscribe,
/// only the lifecycle components in this crate write. Each write is one
/// atomic check-and-modify on the underlying watch channel.
#[derive(Debug, Clone)]
pub struct JobStateStore {
    tx: watch::Sender<JobSnapshot>,
}

impl Default for JobStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStateStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(JobSnapshot::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.tx.borrow().clone()
    }

    pub fn status(&self) -> ProcessingStatus {
        self.tx.borrow().status.clone()
    }

    pub fn results(&self) -> Option<Results> {
        self.tx.borrow().results.clone()
    }

    pub fn session(&self) -> Option<SessionHandle> {
        self.tx.borrow().session.clone()
    }

    pub fn current_tag(&self) -> SessionTag {
        self.tx.borrow().tag
    }

    /// Receive every change to the job state.
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.tx.subscribe()
    }

    /// Start a new generation for an upload. Results and session are kept
    /// until the new session is attached.
    pub(crate) fn begin_upload(&self, message: impl Into<String>) -> SessionTag {
        let message = message.into();
        let mut tag = SessionTag::default();
        self.tx.send_modify(|state| {
            state.tag = state.tag.next();
            state.status = ProcessingStatus::new(JobStatus::Processing, 0, message);
            tag = state.tag;
        });
        debug!(tag = tag.value(), "Began upload generation");
        tag
    }

    /// Invalidate the current generation so late responses are dropped.
    ///
    /// A job still `processing` is settled to `{error, last progress, message}`
    /// since nothing will move it any further. Returns `true` if it was.
    pub(crate) fn retire(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        let mut tag = SessionTag::default();
        let settled = self.tx.send_if_modified(|state| {
            state.tag = state.tag.next();
            tag = state.tag;
            if state.status.status != JobStatus::Processing {
                return false;
            }
            state.status.status = JobStatus::Error;
            state.status.message = message;
            true
        });
        debug!(tag = tag.value(), settled, "Retired generation");
        settled
    }

    /// Assign the session of a successful upload and drop stale results.
    pub(crate) fn attach_session(
        &self,
        tag: SessionTag,
        session: SessionHandle,
        message: impl Into<String>,
    ) -> bool {
        let message = message.into();
        self.tx.send_if_modified(|state| {
            if state.tag != tag {
                return false;
            }
            state.session = Some(session);
            state.results = None;
            state.status = ProcessingStatus::new(JobStatus::Processing, 10, message);
            true
        })
    }

    /// Upload failed: `{error, 0, message}`. Results and session are kept.
    pub(crate) fn fail_upload(&self, tag: SessionTag, message: impl Into<String>) -> bool {
        let message = message.into();
        self.tx.send_if_modified(|state| {
            if state.tag != tag {
                return false;
            }
            state.status = ProcessingStatus::new(JobStatus::Error, 0, message);
            true
        })
    }

    /// Tracking failed: error with the last-known progress.
    pub(crate) fn fail_tracking(&self, tag: SessionTag, message: impl Into<String>) -> bool {
        let message = message.into();
        self.tx.send_if_modified(|state| {
            if state.tag != tag || state.status.status.is_terminal() {
                return false;
            }
            state.status.status = JobStatus::Error;
            state.status.message = message;
            true
        })
    }

    /// Apply one status report for the session issued under `tag`.
    ///
    /// A `processing` report never lowers the stored progress; terminal
    /// reports are always honoured but their progress is clamped the same
    /// way. Nothing is applied once the session is terminal.
    pub(crate) fn apply_status(&self, tag: SessionTag, report: &StatusReport) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::Superseded;
        self.tx.send_if_modified(|state| {
            if state.tag != tag {
                outcome = ApplyOutcome::Superseded;
                return false;
            }
            if state.status.status.is_terminal() {
                outcome = ApplyOutcome::Stale;
                return false;
            }

            let last = state.status.progress;
            let status = match report.status {
                RemoteStatus::Processing => {
                    // Includes reports below the 10 set on attach, such as
                    // the service's own early "reading data" step at 5.
                    if report.progress < last {
                        outcome = ApplyOutcome::Stale;
                        return false;
                    }
                    JobStatus::Processing
                }
                RemoteStatus::Completed => JobStatus::Completed,
                RemoteStatus::Error => JobStatus::Error,
            };

            state.status =
                ProcessingStatus::new(status, report.progress.max(last), report.message.clone());
            outcome = ApplyOutcome::Applied;
            true
        });
        outcome
    }

    /// Store results requested under `tag`.
    pub(crate) fn set_results(&self, tag: SessionTag, results: Results) -> bool {
        self.tx.send_if_modified(|state| {
            if state.tag != tag {
                return false;
            }
            state.results = Some(results);
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn processing(progress: u8) -> StatusReport {
        StatusReport::new(RemoteStatus::Processing, progress, "Tahlil qilinmoqda...")
    }

    fn attached_store() -> (JobStateStore, SessionTag) {
        let store = JobStateStore::new();
        let tag = store.begin_upload("Uploading answers.xlsx...");
        assert!(store.attach_session(tag, SessionHandle::new("s1").unwrap(), "Upload received"));
        (store, tag)
    }

    #[test]
    fn test_initial_state_is_idle() {
        let store = JobStateStore::new();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.status.status, JobStatus::Idle);
        assert_eq!(snapshot.status.progress, 0);
        assert!(snapshot.results.is_none());
        assert!(snapshot.session.is_none());
    }

    #[test]
    fn test_begin_upload_bumps_generation() {
        let store = JobStateStore::new();
        let first = store.begin_upload("a");
        let second = store.begin_upload("b");
        assert!(second > first);
        assert_eq!(store.current_tag(), second);
        assert_eq!(store.status().message, "b");
    }

    #[test]
    fn test_attach_session_clears_results() {
        let store = JobStateStore::new();
        let tag = store.current_tag();
        assert!(store.set_results(tag, fixtures::sample_results()));

        let tag = store.begin_upload("Uploading...");
        assert!(store.results().is_some(), "results survive until the session is attached");

        store.attach_session(tag, SessionHandle::new("s2").unwrap(), "Upload received");
        assert!(store.results().is_none());
        assert_eq!(store.status().progress, 10);
        assert_eq!(store.session().unwrap().as_str(), "s2");
    }

    #[test]
    fn test_fail_upload_keeps_results_and_session() {
        let (store, tag) = attached_store();
        assert!(store.set_results(tag, fixtures::sample_results()));

        let tag = store.begin_upload("Uploading again...");
        assert!(store.fail_upload(tag, "bad file"));

        let snapshot = store.snapshot();
        assert_eq!(
            snapshot.status,
            ProcessingStatus::new(JobStatus::Error, 0, "bad file")
        );
        assert!(snapshot.results.is_some());
        assert_eq!(snapshot.session.unwrap().as_str(), "s1");
    }

    #[test]
    fn test_monotonic_progress_sequence() {
        let (store, tag) = attached_store();
        for progress in [10, 25, 25, 60, 90] {
            assert_eq!(store.apply_status(tag, &processing(progress)), ApplyOutcome::Applied);
        }
        assert_eq!(store.status().progress, 90);
    }

    #[test]
    fn test_out_of_order_progress_is_ignored() {
        let (store, tag) = attached_store();
        store.apply_status(tag, &processing(60));
        assert_eq!(store.apply_status(tag, &processing(40)), ApplyOutcome::Stale);
        assert_eq!(store.status().progress, 60);
    }

    #[test]
    fn test_terminal_progress_is_clamped() {
        let (store, tag) = attached_store();
        store.apply_status(tag, &processing(70));
        let report = StatusReport::new(RemoteStatus::Error, 0, "Invalid sheet");
        assert_eq!(store.apply_status(tag, &report), ApplyOutcome::Applied);

        let status = store.status();
        assert_eq!(status.status, JobStatus::Error);
        assert_eq!(status.progress, 70);
        assert_eq!(status.message, "Invalid sheet");
    }

    #[test]
    fn test_nothing_applied_after_terminal() {
        let (store, tag) = attached_store();
        let done = StatusReport::new(RemoteStatus::Completed, 100, "Done");
        assert_eq!(store.apply_status(tag, &done), ApplyOutcome::Applied);
        assert_eq!(store.apply_status(tag, &processing(100)), ApplyOutcome::Stale);
        assert!(!store.fail_tracking(tag, "Status check failed"));
        assert_eq!(store.status().status, JobStatus::Completed);
    }

    #[test]
    fn test_retired_tag_is_superseded() {
        let (store, tag) = attached_store();
        store.retire("Tracking cancelled");
        assert_eq!(store.apply_status(tag, &processing(50)), ApplyOutcome::Superseded);
        assert!(!store.set_results(tag, fixtures::sample_results()));
        assert!(!store.fail_tracking(tag, "late"));
        assert_eq!(store.status().progress, 10);
    }

    #[test]
    fn test_retire_settles_processing_job() {
        let (store, tag) = attached_store();
        store.apply_status(tag, &processing(40));
        let mut rx = store.subscribe();

        assert!(store.retire("Tracking cancelled"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            store.status(),
            ProcessingStatus::new(JobStatus::Error, 40, "Tracking cancelled")
        );
    }

    #[test]
    fn test_retire_keeps_settled_job() {
        let store = JobStateStore::new();
        assert!(!store.retire("Tracking cancelled"));
        assert_eq!(store.status().status, JobStatus::Idle);

        let (store, tag) = attached_store();
        let done = StatusReport::new(RemoteStatus::Completed, 100, "Done");
        store.apply_status(tag, &done);
        assert!(!store.retire("Tracking cancelled"));
        assert_eq!(store.status().status, JobStatus::Completed);
        assert!(store.current_tag() > tag);
    }

    #[test]
    fn test_first_service_step_below_attach_progress_is_stale() {
        let (store, tag) = attached_store();
        let reading = StatusReport::new(RemoteStatus::Processing, 5, "Ma'lumotlar o'qilmoqda");

        assert_eq!(store.apply_status(tag, &reading), ApplyOutcome::Stale);
        assert_eq!(store.status().progress, 10);
        assert_eq!(store.status().message, "Upload received");
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let (store, tag) = attached_store();
        let mut rx = store.subscribe();

        store.apply_status(tag, &processing(40));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().status.progress, 40);

        // A dropped write does not notify.
        store.apply_status(tag, &processing(20));
        assert!(!rx.has_changed().unwrap());
    }
}
