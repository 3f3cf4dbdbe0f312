use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Message templates the lifecycle emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    ApplicationReceived,
    ApplicationReviewed,
    AdmissionOffered,
}

impl NotificationTemplate {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationTemplate::ApplicationReceived => "application_received",
            NotificationTemplate::ApplicationReviewed => "application_reviewed",
            NotificationTemplate::AdmissionOffered => "admission_offered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub email: String,
    pub template: NotificationTemplate,
    pub data: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(email: impl Into<String>, template: NotificationTemplate) -> Self {
        Self {
            email: email.into(),
            template,
            data: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }
}

/// Outbound delivery hook (e-mail or similar). Implementations must not block for long.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
