//! Job lifecycle orchestration.
//!
//! Turns one upload into a tracked, cancellable job:
//! - `UploadCoordinator` submits the file and obtains a session
//! - `ProgressPoller` queries status until a terminal state
//! - `ResultsLoader` fetches results after completion (and sample results)
//! - `ExportCoordinator` downloads export artifacts for the session
//!
//! All of them write into one [`JobStateStore`], guarded by a generation
//! tag so a response issued for an old session never lands in the new one.

mod export;
mod loader;
mod notify;
mod orchestrator;
mod poller;
mod store;
mod types;
mod upload;

pub use export::ExportCoordinator;
pub use loader::ResultsLoader;
pub use notify::{Notification, NotificationHandle, NotificationLevel};
pub use orchestrator::{JobOrchestrator, TRACKING_CANCELLED};
pub use poller::{PollHandle, ProgressPoller, STATUS_CHECK_FAILED};
pub use store::{ApplyOutcome, JobSnapshot, JobStateStore};
pub use types::*;
pub use upload::{UploadCoordinator, UPLOAD_RECEIVED};
