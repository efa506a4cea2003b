use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-facing message. `blocking` notices must be acknowledged before
/// the user can continue (the native alert in a browser).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
    pub blocking: bool,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            message: message.into(),
            blocking: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            blocking: false,
        }
    }

    pub fn blocking(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            blocking: true,
        }
    }
}

/// The one channel through which screens talk to the user: notices plus
/// yes/no confirmation.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    async fn confirm(&self, prompt: &str) -> bool;
}

/// Logs notices and answers confirmations with a fixed decision.
#[derive(Debug, Clone, Copy)]
pub struct TracingNotifier {
    confirm_answer: bool,
}

impl TracingNotifier {
    pub fn new(confirm_answer: bool) -> Self {
        Self { confirm_answer }
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Info | Severity::Success => info!(blocking = notice.blocking, "{}", notice.message),
            Severity::Warning => warn!(blocking = notice.blocking, "{}", notice.message),
            Severity::Error => error!(blocking = notice.blocking, "{}", notice.message),
        }
    }

    async fn confirm(&self, prompt: &str) -> bool {
        info!(answer = self.confirm_answer, "Confirmation requested: {}", prompt);
        self.confirm_answer
    }
}

/// Keeps every notice and prompt so a caller can render or inspect them later.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    confirm_answer: bool,
    notices: Mutex<Vec<Notice>>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new(confirm_answer: bool) -> Self {
        Self {
            confirm_answer,
            ..Default::default()
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices().pop()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap_or_else(PoisonError::into_inner).push(notice);
    }

    async fn confirm(&self, prompt: &str) -> bool {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        self.confirm_answer
    }
}
