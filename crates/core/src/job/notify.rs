use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Success => "success",
            NotificationLevel::Error => "error",
        }
    }
}

/// A transient message for the user, stamped when emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub timestamp: DateTime<Utc>,
    pub level: NotificationLevel,
    pub message: String,
}

/// Handle for emitting notifications
///
/// This is cheaply cloneable and can be shared across tasks.
/// Every notification is logged; front ends subscribe to present them.
#[derive(Debug, Clone)]
pub struct NotificationHandle {
    tx: broadcast::Sender<Notification>,
}

impl Default for NotificationHandle {
    fn default() -> Self {
        Self::new(64)
    }
}

impl NotificationHandle {
    /// Create a handle whose subscribers buffer up to `capacity` notifications
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Emit a notification
    ///
    /// Never blocks or fails; with no subscribers the notification is only logged.
    pub fn emit(&self, level: NotificationLevel, message: impl Into<String>) {
        let notification = Notification {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        };

        match level {
            NotificationLevel::Error => tracing::warn!(message = %notification.message, "Notification"),
            _ => tracing::info!(level = level.as_str(), message = %notification.message, "Notification"),
        }

        if self.tx.send(notification).is_err() {
            tracing::debug!("No notification subscribers");
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(NotificationLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(NotificationLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(NotificationLevel::Error, message);
    }
}
