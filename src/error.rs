use crate::submission::SubmissionStatus;
use thiserror::Error;

/// Every failure the connector can surface to a caller.
///
/// All variants render to a single message string through `Display`, which is what a
/// user interface shows. None of them are retried automatically and none of them are
/// fatal: the action that failed leaves the previously confirmed state untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GradingError {
    /// Bad input detected before any request was sent.
    #[error("{0}")]
    Validation(String),
    /// The request never produced a structured response (DNS, TLS, timeout, broken body).
    #[error("Network error: {0}")]
    Network(String),
    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Api { status: u16, message: String },
    /// A lifecycle action was attempted from a state that does not allow it.
    #[error("Cannot {action} a submission in state '{status}'")]
    InvalidState {
        action: &'static str,
        status: SubmissionStatus,
    },
    /// An index into a rubric's criteria list was out of bounds.
    #[error("Criterion index {index} is out of range (rubric has {len} criteria)")]
    OutOfRange { index: usize, len: usize },
    /// The caller abandoned interest in the request.
    #[error("Request was cancelled")]
    Cancelled,
    #[error("Credentials error: {0}")]
    Credentials(String),
}

pub type Result<T> = std::result::Result<T, GradingError>;

impl GradingError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        GradingError::Validation(message.into())
    }

    /// HTTP status of an `Api` error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GradingError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GradingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GradingError::Network(format!("request timed out: {}", err))
        } else {
            GradingError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GradingError {
    fn from(err: serde_json::Error) -> Self {
        GradingError::Network(format!("malformed response body: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_user_facing() {
        let err = GradingError::Api {
            status: 404,
            message: "Submission not found".to_string(),
        };
        assert_eq!(err.to_string(), "Submission not found");
        assert_eq!(err.status(), Some(404));

        let err = GradingError::InvalidState {
            action: "review",
            status: SubmissionStatus::Submitted,
        };
        assert_eq!(
            err.to_string(),
            "Cannot review a submission in state 'submitted'"
        );
        assert_eq!(err.status(), None);
    }
}
