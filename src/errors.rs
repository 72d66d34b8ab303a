//! Error types for the list-view subsystem

use thiserror::Error;

/// Result alias used by every list-state operation
pub type ListResult<T> = std::result::Result<T, ListError>;

/// Errors produced while driving a list screen.
///
/// The enum is `Clone` because a single in-flight fetch can be awaited by
/// several callers at once and each of them receives the same outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    #[error("{0}")]
    Validation(String),

    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Server error{}: {message}", status_suffix(*.status))]
    Server {
        status: Option<u16>,
        message: String,
    },

    #[error("{0}")]
    NoOp(String),

    #[error("Response for request #{0} was superseded by a newer request")]
    StaleResponse(u64),

    #[error("Screen '{0}' is no longer mounted")]
    Unmounted(String),

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Unknown filter field '{0}'")]
    UnknownFilter(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn status_suffix(status: Option<u16>) -> String {
    status.map(|code| format!(" (status {})", code)).unwrap_or_default()
}

/// How a failure should be presented to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Error,
    Warning,
    Silent,
}

impl ListError {
    pub fn server(status: Option<u16>, message: impl Into<String>) -> Self {
        ListError::Server {
            status,
            message: message.into(),
        }
    }

    /// Notification level for this error at the screen boundary
    pub fn notice_level(&self) -> NoticeLevel {
        match self {
            ListError::NoOp(_) => NoticeLevel::Warning,
            ListError::StaleResponse(_) | ListError::Unmounted(_) => NoticeLevel::Silent,
            _ => NoticeLevel::Error,
        }
    }

    /// Message shown to the user. Server messages are passed through as-is.
    pub fn user_message(&self) -> String {
        match self {
            ListError::Server { message, .. } if !message.trim().is_empty() => message.clone(),
            ListError::Server { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ListError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ListError::server(Some(status.as_u16()), err.to_string()),
            None => ListError::Network(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for ListError {
    fn from(err: sqlx::Error) -> Self {
        ListError::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for ListError {
    fn from(err: anyhow::Error) -> Self {
        ListError::Config(err.to_string())
    }
}
