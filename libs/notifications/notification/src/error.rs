//! Error types for notification dispatch.

use crate::template::TemplateError;
use thiserror::Error;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors raised while validating, resolving or sending a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// No notification is registered under this ref.
    #[error("notification {0} not found")]
    NotificationNotFound(String),

    /// The notification failed validation.
    #[error("{msg}")]
    InvalidNotification { reference: String, msg: String },

    /// No template is registered under this name.
    #[error("template {0} not found")]
    TemplateNotFound(String),

    /// `send` was called before a template was bound.
    #[error("notification {0} has no template bound")]
    TemplateNotBound(String),

    /// Subject or body rendering failed.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A handler failed to deliver to one recipient.
    #[error("delivery to {recipient} failed: {source}")]
    Delivery {
        recipient: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl NotificationError {
    pub(crate) fn invalid(reference: &str, msg: impl Into<String>) -> Self {
        Self::InvalidNotification {
            reference: reference.to_string(),
            msg: msg.into(),
        }
    }
}
