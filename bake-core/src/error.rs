//! Error types for bake-core.

use thiserror::Error;

/// Result type alias using bake-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for session and transport operations
#[derive(Error, Debug)]
pub enum Error {
    // Credential errors
    #[error("Invalid token")]
    InvalidToken,

    #[error("Missing authentication")]
    MissingAuth,

    // Transport errors
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Session errors
    #[error("Session was replaced while the request was in flight")]
    Superseded,

    #[error("Session duration must be between 1 and {max} minutes, got {got}")]
    InvalidDuration { got: u32, max: u32 },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a non-success HTTP response
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Whether the backend rejected the credential itself.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Status { status: 401, .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_detection() {
        assert!(Error::Unauthorized.is_unauthorized());
        assert!(Error::status(401, "nope").is_unauthorized());
        assert!(!Error::status(500, "boom").is_unauthorized());
        assert!(!Error::Timeout.is_unauthorized());
    }

    #[test]
    fn test_status_display() {
        let err = Error::status(503, "Service Unavailable");
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
    }
}
