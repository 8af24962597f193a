//! Error types shared across the workspace.

use thiserror::Error;

/// Result type for Casalink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Workspace-wide error taxonomy.
///
/// The dispatcher and aggregator rely on this classification to decide
/// whether a failure is terminal: configuration errors are never retried,
/// transport errors are terminal for the current attempt, and business
/// errors are terminal except for the dispatcher's single rewrite retry.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid credentials/base URL. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network or timeout failure talking to the device-cloud.
    #[error("transport error: {0}")]
    Transport(String),

    /// The device-cloud answered with a structured failure code.
    #[error("cloud business error {code}: {message}")]
    CloudBusiness {
        /// Failure code reported by the cloud.
        code: i64,
        /// Human-readable message reported by the cloud.
        message: String,
    },

    /// Unknown task id or device id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Business failure code, if this is a cloud business error.
    pub fn business_code(&self) -> Option<i64> {
        match self {
            Error::CloudBusiness { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this error came from the network layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
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
    fn test_business_code() {
        let err = Error::CloudBusiness {
            code: 2008,
            message: "command or value not support".to_string(),
        };
        assert_eq!(err.business_code(), Some(2008));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("task-123".to_string());
        assert!(err.to_string().contains("task-123"));
    }
}
