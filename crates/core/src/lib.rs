pub mod analysis;
pub mod config;
pub mod job;
pub mod selection;
pub mod service;
pub mod testing;

pub use analysis::{DifficultyLevel, ItemDifficulties, ItemDifficulty, Results, ScoreSummary};
pub use config::{
    load_config, load_config_from_str, load_default_config, validate_config, Config, ConfigError,
    PollingConfig, ServiceConfig,
};
pub use job::{
    ExportArtifact, ExportKind, JobError, JobOrchestrator, JobSnapshot, JobStateStore, JobStatus,
    Notification, NotificationHandle, NotificationLevel, PollHandle, PollOutcome,
    ProcessingStatus, SessionHandle, SessionTag,
};
pub use selection::{FilePicker, PathPicker, SelectedFile, SelectionError};
pub use service::{HttpScoringService, ScoringService, ServiceError};
