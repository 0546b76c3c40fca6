//! User-facing notifications (toast-style title, description, severity)

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
        }
    }

    pub fn missing_input() -> Self {
        Self::new(
            "Missing Fields",
            "Please fill in all test results.",
            Severity::Destructive,
        )
    }

    pub fn insight_unavailable() -> Self {
        Self::new(
            "Save Error",
            "Could not save the result or fetch AI insight.",
            Severity::Destructive,
        )
    }

    pub fn persist_failed(message: impl Into<String>) -> Self {
        Self::new("Save Failed", message, Severity::Destructive)
    }

    pub fn busy() -> Self {
        Self::new(
            "Analysis In Progress",
            "Please wait for the current analysis to finish.",
            Severity::Destructive,
        )
    }

    pub fn success() -> Self {
        Self::new(
            "Success",
            "Sweat analysis saved successfully.",
            Severity::Default,
        )
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: &Notification) {
        match n.severity {
            Severity::Default => {
                tracing::info!(title = %n.title, description = %n.description, "notification")
            }
            Severity::Destructive => {
                tracing::warn!(title = %n.title, description = %n.description, "notification")
            }
        }
    }
}

/// Keeps every notification in memory, in order.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, n: &Notification) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(n.clone());
        }
    }
}
