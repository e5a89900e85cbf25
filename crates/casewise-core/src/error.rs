//! Error types for the casewise intake worker.

use thiserror::Error;

/// Result type alias using casewise's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for casewise operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Collaborator unreachable: timeout, connection refused, DNS failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Collaborator answered with a non-success status.
    #[error("Gateway error ({status}): {message}")]
    Gateway { status: u16, message: String },

    /// Other HTTP client failure (request construction, redirect loop, ...)
    #[error("Request error: {0}")]
    Request(String),

    /// Text extraction failed: missing file, backend or subprocess failure.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Startup precondition could not be established.
    #[error("Fatal startup error: {0}")]
    FatalStartup(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the same call may succeed.
    ///
    /// Network failures and 5xx answers are transient; everything else
    /// (4xx, extraction, configuration) will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Gateway { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            Error::Network(e.to_string())
        } else if let Some(status) = e.status() {
            Error::Gateway {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else if e.is_decode() {
            Error::Serialization(e.to_string())
        } else {
            Error::Request(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_network() {
        let err = Error::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_error_display_gateway() {
        let err = Error::Gateway {
            status: 401,
            message: "Unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "Gateway error (401): Unauthorized");
    }

    #[test]
    fn test_error_display_extraction() {
        let err = Error::Extraction("File not found: /tmp/x.png".to_string());
        assert_eq!(
            err.to_string(),
            "Extraction error: File not found: /tmp/x.png"
        );
    }

    #[test]
    fn test_error_display_fatal_startup() {
        let err = Error::FatalStartup("seeding failed".to_string());
        assert_eq!(err.to_string(), "Fatal startup error: seeding failed");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Network("timeout".into()).is_transient());
        assert!(Error::Gateway {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(!Error::Gateway {
            status: 400,
            message: "bad request".into()
        }
        .is_transient());
        assert!(!Error::Extraction("ocr".into()).is_transient());
        assert!(!Error::FatalStartup("seed".into()).is_transient());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.to_string().contains("Serialization error:"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
