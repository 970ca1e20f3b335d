//! Platform Error Types
//!
//! Every failure carries exactly one kind. Kinds other than `Internal` carry a
//! message that is safe to show to the caller verbatim.

use thiserror::Error;

/// Error taxonomy exposed at the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] bson::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] wt_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlatformError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn forbidden() -> Self {
        Self::Forbidden { message: "Forbidden".to_string() }
    }

    pub fn not_found() -> Self {
        Self::NotFound { message: "Not Found".to_string() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Database(_)
            | Self::Serialization(_)
            | Self::Deserialization(_)
            | Self::Json(_)
            | Self::Queue(_)
            | Self::Io(_)
            | Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Message shown to the caller. Internal details never leave the process.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal Server Error".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_verbatim() {
        let err = PlatformError::conflict("already check in for the day");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.public_message(), "already check in for the day");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = PlatformError::internal("connection reset by peer");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "Internal Server Error");

        let err: PlatformError = wt_queue::QueueError::Closed("profiles".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
