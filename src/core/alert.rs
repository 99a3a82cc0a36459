//! User-facing notices raised by the core.
//!
//! The core never prints. Anything the user must see (a storage failure, a
//! missing key, a rejected request) goes through an [`AlertSink`] owned by
//! whichever front-end constructed the session.

use std::sync::Mutex;

/// Severity of a user-facing notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertKind {
    /// Confirmation of a completed action (the mobile "toast").
    Info,

    /// Failure the user has to act on.
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Info,
            title: "Info".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Error,
            title: "Error".to_string(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == AlertKind::Error
    }
}

pub trait AlertSink: Send + Sync {
    fn show(&self, alert: Alert);
}

/// Sink that keeps every notice, for assertions.
#[derive(Debug, Default)]
pub struct RecordedAlerts {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordedAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(Alert::is_error)
            .map(|alert| alert.message)
            .collect()
    }
}

impl AlertSink for RecordedAlerts {
    fn show(&self, alert: Alert) {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(alert);
    }
}
