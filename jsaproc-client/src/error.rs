//! Error types for the archive clients

use jsaproc_core::ProcError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the remote archive
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Service returned an error status code
    ///
    /// Formatted as `<status> Client Error: ...` or `<status> Server Error: ...`
    /// so that job logs can be triaged by status class.
    #[error("{status} {} Error: {message}", status_class(*.status))]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Reason phrase, URL and any response text
        message: String,
    },

    /// Local file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn status_class(status: u16) -> &'static str {
    if status >= 500 { "Server" } else { "Client" }
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a 404 from the service
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }
}

impl From<ClientError> for ProcError {
    fn from(err: ClientError) -> Self {
        ProcError::Remote(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_class_in_message() {
        let err = ClientError::api_error(401, "Unauthorized for url: https://archive/x");
        assert_eq!(
            err.to_string(),
            "401 Client Error: Unauthorized for url: https://archive/x"
        );
        assert!(err.is_client_error());
        assert!(!err.is_server_error());

        let err = ClientError::api_error(503, "Service Unavailable");
        assert!(err.to_string().starts_with("503 Server Error"));
        assert!(err.is_server_error());
    }

    #[test]
    fn test_not_found() {
        assert!(ClientError::api_error(404, "Not Found").is_not_found());
        assert!(!ClientError::api_error(410, "Gone").is_not_found());
        assert!(!ClientError::Io(std::io::Error::other("disk")).is_not_found());
    }

    #[test]
    fn test_conversion_keeps_message() {
        let err: ProcError = ClientError::api_error(503, "Service Unavailable").into();
        assert!(matches!(&err, ProcError::Remote(_)));
        assert!(err.to_string().contains("503 Server Error"));
    }
}
