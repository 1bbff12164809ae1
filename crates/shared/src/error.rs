use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ChatId;

/// Synchronous rejections of an event. The session is unchanged when one of
/// these is returned; the caller corrects the input and re-issues the event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unknown chat {0:?}")]
    ChatNotFound(ChatId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// A backend call failed or timed out; the triggering event can be
    /// re-issued as-is.
    ServiceFailure,
    /// An acknowledgement the user should see (report filed, user blocked).
    Info,
}

/// User-visible banner carried on the session and surfaced by the
/// projection on top of whatever root screen is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub retryable: bool,
}

impl Notice {
    pub fn service_failure(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::ServiceFailure,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
            retryable: false,
        }
    }
}
