//! Error types for the Coveo provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur while configuring the provider or managing resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Required provider configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An attribute bag did not match the resource schema.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The caller broke the lifecycle contract (e.g. read with an empty id).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// The request body could not be serialized. Raised before any network call.
    #[error("Encoding error: {0}")]
    Encoding(#[source] serde_json::Error),

    /// The HTTP call could not be completed (connection refused, DNS, TLS).
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The HTTP call did not complete before the configured timeout.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The API answered with a status >= 400.
    #[error("API request error: {status} {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Reason phrase of the status line.
        message: String,
    },

    /// The response body was not valid JSON or had the wrong shape.
    #[error("Parse error: {0}")]
    Decode(#[source] serde_json::Error),

    /// The response decoded but a required field was missing or empty.
    ///
    /// `remote_id` holds whatever id could still be recovered from the body,
    /// so a resource created remotely can be cleaned up by hand.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// What was wrong with the response.
        message: String,
        /// Identifier of a remote object that may have been orphaned.
        remote_id: Option<String>,
    },
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::Configuration(msg)
            | Self::Validation(msg)
            | Self::InvalidRequest(msg)
            | Self::UnknownResource(msg)
            | Self::DeadlineExceeded(msg) => msg.clone(),
            Self::Encoding(err) | Self::Decode(err) => err.to_string(),
            Self::Transport(err) => err.to_string(),
            Self::Api { status, message } => format!("{} {}", status, message),
            Self::InvalidResponse { message, .. } => message.clone(),
        }
    }

    /// Whether the failure is transient (rate limited, server side, timeout).
    ///
    /// The client retries these only for idempotent methods. A `POST` is
    /// retried on 429 alone.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::DeadlineExceeded(_) => true,
            Self::Transport(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    /// Whether the API reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// Id of a remote object created before the failure, if any.
    pub fn orphaned_id(&self) -> Option<&str> {
        match self {
            Self::InvalidResponse { remote_id, .. } => remote_id.as_deref(),
            _ => None,
        }
    }

    /// Convert into a user-facing error diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let summary = match self {
            Self::Configuration(_) => "Configuration Error",
            Self::Validation(_) => "Validation Error",
            Self::InvalidRequest(_) => "Invalid Request",
            Self::UnknownResource(_) => "Unknown Resource",
            Self::Encoding(_) => "Encoding Error",
            Self::Transport(_) | Self::DeadlineExceeded(_) | Self::Api { .. } => "API Error",
            Self::Decode(_) => "Parse Error",
            Self::InvalidResponse { .. } => "Invalid Response",
        };

        let mut detail = self.to_string();
        if let Some(id) = self.orphaned_id() {
            detail.push_str(&format!(
                " (remote object '{}' may have been created and needs manual cleanup)",
                id
            ));
        }

        Diagnostic::error(summary).with_detail(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[test]
    fn test_error_display() {
        let err = ProviderError::Configuration("api_key is empty".to_string());
        assert_eq!(format!("{}", err), "Configuration error: api_key is empty");

        let err = ProviderError::Api {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert_eq!(format!("{}", err), "API request error: 404 Not Found");

        let err = ProviderError::UnknownResource("coveo_field".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: coveo_field");
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::InvalidRequest("empty id".to_string());
        assert_eq!(err.message(), "empty id");

        let err = ProviderError::Api {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        assert_eq!(err.message(), "503 Service Unavailable");
    }

    #[test]
    fn test_retry_classification() {
        let api = |status| ProviderError::Api {
            status,
            message: String::new(),
        };

        assert!(api(429).is_retryable());
        assert!(api(500).is_retryable());
        assert!(api(503).is_retryable());
        assert!(!api(400).is_retryable());
        assert!(!api(404).is_retryable());
        assert!(ProviderError::DeadlineExceeded("30s".to_string()).is_retryable());
        assert!(!ProviderError::Validation("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_not_found() {
        let err = ProviderError::Api {
            status: 404,
            message: "Not Found".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!ProviderError::Configuration("x".to_string()).is_not_found());
    }

    #[test]
    fn test_orphaned_id_in_diagnostic() {
        let err = ProviderError::InvalidResponse {
            message: "missing name".to_string(),
            remote_id: Some("ix-7".to_string()),
        };
        assert_eq!(err.orphaned_id(), Some("ix-7"));

        let diag = err.to_diagnostic();
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.summary, "Invalid Response");
        assert!(diag.detail.unwrap().contains("ix-7"));
    }

    #[test]
    fn test_diagnostic_summaries() {
        let diag = ProviderError::Api {
            status: 500,
            message: "Internal Server Error".to_string(),
        }
        .to_diagnostic();
        assert_eq!(diag.summary, "API Error");
        assert_eq!(
            diag.detail.as_deref(),
            Some("API request error: 500 Internal Server Error")
        );

        let diag = ProviderError::Configuration("missing".to_string()).to_diagnostic();
        assert_eq!(diag.summary, "Configuration Error");
    }
}
