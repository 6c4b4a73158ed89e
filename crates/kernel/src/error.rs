//! Kernel error types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ContentTypeDisplay, ContentTypeKind};

/// Errors returned by the editor operations.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("{kind} {id} not found")]
    NotFound { kind: ContentTypeKind, id: i32 },

    /// The request was rejected; every collected field error is attached.
    #[error("validation failed: {0}")]
    Validation(Box<ValidationFailure>),

    /// A move or copy was refused.
    #[error("operation refused: {0}")]
    Notification(SimpleNotification),

    /// Two parts of the kernel disagree about the same data.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl KernelError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Field errors of a validation failure.
    pub fn validation_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            Self::Validation(failure) => Some(&failure.display.errors),
            _ => None,
        }
    }
}

/// The editor view to re-render after a rejected save.
///
/// `display.errors` holds the field errors; the rest is the request as
/// submitted, laid over the stored type when editing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub display: ContentTypeDisplay,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.display.errors.keys().map(String::as_str).collect();
        write!(f, "{} field(s) invalid: {}", fields.len(), fields.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub header: String,
    pub message: String,
    pub kind: NotificationKind,
}

/// Notifications shown to the user in place of a result.
///
/// May be empty; subscribers that cancel an operation can attach messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleNotification {
    pub notifications: Vec<NotificationMessage>,
}

impl SimpleNotification {
    pub fn empty() -> Self {
        Self::default()
    }

    /// One error notification with `header` and no message.
    pub fn error_header(header: impl Into<String>) -> Self {
        Self {
            notifications: vec![NotificationMessage {
                header: header.into(),
                message: String::new(),
                kind: NotificationKind::Error,
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}

impl fmt::Display for SimpleNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.notifications.is_empty() {
            return f.write_str("cancelled");
        }
        let headers: Vec<&str> = self.notifications.iter().map(|n| n.header.as_str()).collect();
        f.write_str(&headers.join("; "))
    }
}

/// Result type alias using KernelError.
pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mapping::save_to_display;
    use crate::models::ContentTypeSave;

    #[test]
    fn helpers_classify_errors() {
        let not_found = KernelError::NotFound {
            kind: ContentTypeKind::Media,
            id: 9,
        };
        assert!(not_found.is_not_found());
        assert_eq!(not_found.to_string(), "media 9 not found");
        assert!(not_found.validation_errors().is_none());

        let mut display = save_to_display(&ContentTypeSave::new("x", "X"), ContentTypeKind::Document);
        display.errors.insert("Alias".to_string(), vec!["taken".to_string()]);
        let failure = KernelError::Validation(Box::new(ValidationFailure { display }));
        assert!(!failure.is_not_found());
        assert_eq!(failure.validation_errors().unwrap()["Alias"], vec!["taken"]);
        assert_eq!(failure.to_string(), "validation failed: 1 field(s) invalid: Alias");
    }

    #[test]
    fn notifications() {
        assert!(SimpleNotification::empty().is_empty());
        let refused = SimpleNotification::error_header("Not allowed");
        assert_eq!(refused.notifications[0].message, "");
        assert_eq!(refused.notifications[0].kind, NotificationKind::Error);
        assert_eq!(refused.to_string(), "Not allowed");
    }
}
