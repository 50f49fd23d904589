//! Job status polling.
//!
//! One poller task per session:
//! - Waits `interval`, then issues one status query (first tick after one interval)
//! - Stops at the first terminal status or failed query (no retry)
//! - On `completed`, loads results in the same task

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::service::{RemoteStatus, ScoringService};

use super::loader::ResultsLoader;
use super::notify::NotificationHandle;
use super::store::{ApplyOutcome, JobStateStore};
use super::types::{PollOutcome, SessionHandle, SessionTag};

/// Message stored when a status query itself fails.
pub const STATUS_CHECK_FAILED: &str = "Status check failed";

/// Spawns status polling tasks.
#[derive(Clone)]
pub struct ProgressPoller {
    service: Arc<dyn ScoringService>,
    store: JobStateStore,
    notifications: NotificationHandle,
    loader: ResultsLoader,
    interval: Duration,
}

/// Handle to one running poller task.
///
/// Clones refer to the same task. Cancelling is effective immediately:
/// the pending tick and any in-flight status request are abandoned.
#[derive(Debug, Clone)]
pub struct PollHandle {
    session: SessionHandle,
    tag: SessionTag,
    /// Set exactly once, by whoever stops the poller first (cancel or terminal status).
    stopped: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    outcome_rx: watch::Receiver<Option<PollOutcome>>,
}

impl PollHandle {
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn tag(&self) -> SessionTag {
        self.tag
    }

    /// Stop polling.
    ///
    /// Returns `true` only for the call that actually stopped the poller;
    /// later calls, or calls after the job reached a terminal state, return `false`.
    pub fn cancel(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!(session = %self.session, "Cancelling status polling");
        let _ = self.shutdown_tx.send(());
        true
    }

    /// Whether the task has finished (for any reason).
    pub fn is_finished(&self) -> bool {
        self.outcome_rx.borrow().is_some()
    }

    /// Wait for the task to finish.
    pub async fn wait(&self) -> PollOutcome {
        let mut rx = self.outcome_rx.clone();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            // Task dropped without reporting (runtime shut down).
            Err(_) => None,
        };
        outcome.unwrap_or(PollOutcome::Cancelled)
    }
}

impl ProgressPoller {
    pub fn new(
        service: Arc<dyn ScoringService>,
        store: JobStateStore,
        notifications: NotificationHandle,
        loader: ResultsLoader,
        interval: Duration,
    ) -> Self {
        Self {
            service,
            store,
            notifications,
            loader,
            interval,
        }
    }

    /// Start polling `session`, whose state was written under `tag`.
    pub fn spawn(&self, session: SessionHandle, tag: SessionTag) -> PollHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let stopped = Arc::new(AtomicBool::new(false));

        let handle = PollHandle {
            session: session.clone(),
            tag,
            stopped: Arc::clone(&stopped),
            shutdown_tx,
            outcome_rx,
        };

        let poller = self.clone();
        tokio::spawn(async move {
            info!(
                session = %session,
                interval_ms = poller.interval.as_millis() as u64,
                "Status polling started"
            );
            let outcome = poller.run(session.clone(), tag, stopped, shutdown_rx).await;
            info!(session = %session, outcome = ?outcome, "Status polling stopped");
            outcome_tx.send_replace(Some(outcome));
        });

        handle
    }

    async fn run(
        &self,
        session: SessionHandle,
        tag: SessionTag,
        stopped: Arc<AtomicBool>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> PollOutcome {
        // Claims the right to end the session; false if a cancel got there first.
        let stop = || !stopped.swap(true, Ordering::SeqCst);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => return PollOutcome::Cancelled,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let response = tokio::select! {
                _ = shutdown_rx.recv() => return PollOutcome::Cancelled,
                response = self.service.status(session.as_str()) => response,
            };

            if stopped.load(Ordering::SeqCst) {
                return PollOutcome::Cancelled;
            }

            let report = match response {
                Ok(report) => report,
                Err(e) => {
                    if !stop() {
                        return PollOutcome::Cancelled;
                    }
                    warn!(session = %session, error = %e, "Status check failed");
                    if !self.store.fail_tracking(tag, STATUS_CHECK_FAILED) {
                        return PollOutcome::Cancelled;
                    }
                    self.notifications.error(format!("{}: {}", STATUS_CHECK_FAILED, e));
                    return PollOutcome::Failed {
                        message: STATUS_CHECK_FAILED.to_string(),
                    };
                }
            };

            // A terminal report ends the session, so claim it before it lands.
            if report.status.is_terminal() && !stop() {
                return PollOutcome::Cancelled;
            }

            match self.store.apply_status(tag, &report) {
                ApplyOutcome::Stale if report.status.is_terminal() => {
                    return PollOutcome::Cancelled;
                }
                ApplyOutcome::Superseded => {
                    debug!(session = %session, "Dropping status for superseded session");
                    return PollOutcome::Cancelled;
                }
                ApplyOutcome::Stale => {
                    debug!(
                        session = %session,
                        progress = report.progress,
                        "Ignoring stale status response"
                    );
                    continue;
                }
                ApplyOutcome::Applied => {}
            }

            debug!(
                session = %session,
                status = report.status.as_str(),
                progress = report.progress,
                "Status updated"
            );

            match report.status {
                RemoteStatus::Processing => continue,
                RemoteStatus::Completed => {
                    info!(session = %session, "Analysis completed");
                    let results_loaded = self.loader.load(tag, &session).await.is_ok();
                    return PollOutcome::Completed { results_loaded };
                }
                RemoteStatus::Error => {
                    let message = if report.message.is_empty() {
                        "Analysis failed".to_string()
                    } else {
                        report.message
                    };
                    warn!(session = %session, error = %message, "Analysis failed");
                    self.notifications.error(message.clone());
                    return PollOutcome::Failed { message };
                }
            }
        }
    }
}
