//! HTTP transport layer for the stream client.
//!
//! Provides the transport abstraction used to open the long-lived feed
//! connection, a reqwest-backed implementation, and the adapter that turns
//! the raw byte stream into decoded records.

mod http;
mod streaming;

pub use http::{HttpMethod, HttpRequest, HttpTransport, HttpTransportImpl};
pub use streaming::{ByteStream, RecordStream, StreamingResponse};

use std::error::Error as _;
use std::time::Duration;

/// Transport error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection error (refused, reset, DNS).
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Timeout error.
    #[error("Timeout after {timeout:?}")]
    Timeout {
        /// Timeout duration.
        timeout: Duration,
    },

    /// TLS error.
    #[error("TLS error: {message}")]
    Tls {
        /// Error message.
        message: String,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}{}", body_suffix(.body))]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Leading part of the response body, if any.
        body: Option<String>,
    },

    /// Invalid response.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },

    /// The server ended the response body.
    #[error("Stream closed by server")]
    Closed,
}

impl TransportError {
    /// Classifies a reqwest error, using `timeout` for timeouts.
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return TransportError::Timeout { timeout };
        }
        if is_tls_failure(err) {
            return TransportError::Tls {
                message: err.to_string(),
            };
        }
        if err.is_connect() || err.is_body() || err.is_request() {
            return TransportError::Connection {
                message: err.to_string(),
            };
        }
        TransportError::InvalidResponse {
            message: err.to_string(),
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Connection { .. } => "connection",
            TransportError::Timeout { .. } => "timeout",
            TransportError::Tls { .. } => "tls",
            TransportError::HttpStatus { .. } => "http_status",
            TransportError::InvalidResponse { .. } => "invalid_response",
            TransportError::Closed => "closed",
        }
    }

    /// Returns the HTTP status code, if the server sent one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::from_reqwest(&err, Duration::ZERO)
    }
}

fn body_suffix(body: &Option<String>) -> String {
    match body {
        Some(body) if !body.is_empty() => format!(": {}", body),
        _ => String::new(),
    }
}

fn is_tls_failure(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("handshake") {
            return true;
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display() {
        let err = TransportError::HttpStatus {
            status: 420,
            body: Some("Enhance Your Calm".to_string()),
        };
        assert_eq!(err.to_string(), "HTTP 420: Enhance Your Calm");
        assert_eq!(err.status(), Some(420));

        let err = TransportError::HttpStatus {
            status: 401,
            body: None,
        };
        assert_eq!(err.to_string(), "HTTP 401");
    }

    #[test]
    fn test_closed_has_no_status() {
        assert_eq!(TransportError::Closed.status(), None);
        assert_eq!(TransportError::Closed.kind(), "closed");
    }
}
