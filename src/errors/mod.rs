//! Error types for the stream client.
//!
//! Two families of failure reach the record handler: per-record decode
//! failures, which leave the session running, and transport failures, which
//! end it. Configuration and authentication errors are returned directly by
//! the call that caused them.

use std::fmt;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for stream client operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Maximum number of raw bytes kept on a [`DecodeError`] for diagnostics.
pub const RAW_PREVIEW_LIMIT: usize = 1024;

/// Top-level error type for the stream client.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Configuration error (missing credentials, invalid URL, etc.)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// Request signing failed.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Error message describing the signing failure.
        message: String,
    },

    /// A record could not be decoded. The session keeps running.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The connection failed or was closed. The session has ended.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl StreamError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        StreamError::Configuration {
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        StreamError::Authentication {
            message: message.into(),
        }
    }

    /// Returns true if this error ends the stream session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StreamError::Transport(_))
    }

    /// Returns the decode error, if this is one.
    pub fn as_decode(&self) -> Option<&DecodeError> {
        match self {
            StreamError::Decode(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the transport error, if this is one.
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            StreamError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        StreamError::Transport(TransportError::from(err))
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Decode(DecodeError::new(vec![FieldError::malformed(&err)], &[]))
    }
}

impl From<url::ParseError> for StreamError {
    fn from(err: url::ParseError) -> Self {
        StreamError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}

/// Why a single field failed to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorKind {
    /// The field (or one of its parents) is absent.
    Missing,
    /// The field is present but has the wrong JSON type.
    InvalidType,
    /// The field is a string but not a timestamp in the expected format.
    InvalidTimestamp,
    /// An unterminated fragment outgrew the reassembly buffer limit.
    BufferOverflow,
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldErrorKind::Missing => "missing",
            FieldErrorKind::InvalidType => "invalid type",
            FieldErrorKind::InvalidTimestamp => "invalid timestamp",
            FieldErrorKind::BufferOverflow => "buffer overflow",
        };
        f.write_str(s)
    }
}

/// A failure to decode one field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path of the field, `$` for the record root.
    pub path: String,
    /// What went wrong.
    pub kind: FieldErrorKind,
    /// Description of the expected type or format.
    pub expected: String,
    /// The raw value found at the path, rendered as JSON.
    pub found: Option<String>,
}

impl FieldError {
    /// Creates a missing-field error.
    pub fn missing(path: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FieldErrorKind::Missing,
            expected: expected.into(),
            found: None,
        }
    }

    /// Creates a wrong-type error.
    pub fn invalid_type(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: &serde_json::Value,
    ) -> Self {
        Self {
            path: path.into(),
            kind: FieldErrorKind::InvalidType,
            expected: expected.into(),
            found: Some(found.to_string()),
        }
    }

    /// Creates an unparsable-timestamp error.
    pub fn invalid_timestamp(
        path: impl Into<String>,
        format: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            kind: FieldErrorKind::InvalidTimestamp,
            expected: format.into(),
            found: Some(found.into()),
        }
    }

    /// Creates an error for bytes that are not JSON at all.
    pub fn malformed(err: &serde_json::Error) -> Self {
        Self {
            path: "$".to_string(),
            kind: FieldErrorKind::InvalidType,
            expected: "JSON object".to_string(),
            found: Some(err.to_string()),
        }
    }

    /// Creates a buffer overflow error for the reassembly watchdog.
    pub fn overflow(limit: usize, buffered: usize) -> Self {
        Self {
            path: "$".to_string(),
            kind: FieldErrorKind::BufferOverflow,
            expected: format!("complete record within {} bytes", limit),
            found: Some(format!("{} buffered bytes", buffered)),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, expected {}", self.path, self.kind, self.expected)?;
        if let Some(found) = &self.found {
            write!(f, ", found {}", found)?;
        }
        f.write_str(")")
    }
}

/// A record that was structurally present but could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid record: {}", join_failures(.failures))]
pub struct DecodeError {
    /// Every field that failed, in declaration order.
    pub failures: Vec<FieldError>,
    /// The record text, truncated to [`RAW_PREVIEW_LIMIT`] bytes.
    pub raw: String,
}

impl DecodeError {
    /// Creates a decode error from field failures and the raw record bytes.
    pub fn new(failures: Vec<FieldError>, raw: &[u8]) -> Self {
        Self {
            failures,
            raw: raw_preview(raw),
        }
    }

    /// Returns the paths of all failing fields.
    pub fn paths(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.path.as_str()).collect()
    }

    /// Returns true if the given path is among the failures.
    pub fn has_path(&self, path: &str) -> bool {
        self.failures.iter().any(|f| f.path == path)
    }

    /// Returns true if this error came from the buffer watchdog.
    pub fn is_overflow(&self) -> bool {
        self.failures
            .iter()
            .any(|f| f.kind == FieldErrorKind::BufferOverflow)
    }
}

fn join_failures(failures: &[FieldError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn raw_preview(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if text.len() <= RAW_PREVIEW_LIMIT {
        return text.into_owned();
    }
    let mut end = RAW_PREVIEW_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_fatal() {
        let error = StreamError::Transport(TransportError::Closed);
        assert!(error.is_fatal());
        assert!(error.as_transport().is_some());
    }

    #[test]
    fn test_decode_errors_are_not_fatal() {
        let error = StreamError::Decode(DecodeError::new(
            vec![FieldError::missing("text", "string")],
            b"{}",
        ));
        assert!(!error.is_fatal());
        assert!(error.as_decode().is_some_and(|e| e.has_path("text")));
    }

    #[test]
    fn test_decode_error_display_lists_every_path() {
        let error = DecodeError::new(
            vec![
                FieldError::missing("user.screen_name", "string"),
                FieldError::invalid_type("text", "string", &serde_json::json!(42)),
            ],
            br#"{"text":42}"#,
        );

        let message = error.to_string();
        assert!(message.contains("user.screen_name (missing"));
        assert!(message.contains("text (invalid type, expected string, found 42)"));
        assert_eq!(error.paths(), vec!["user.screen_name", "text"]);
    }

    #[test]
    fn test_raw_preview_is_truncated_on_char_boundary() {
        let raw = "é".repeat(RAW_PREVIEW_LIMIT);
        let error = DecodeError::new(vec![], raw.as_bytes());

        assert!(error.raw.ends_with("..."));
        assert!(error.raw.len() <= RAW_PREVIEW_LIMIT + 3);
    }

    #[test]
    fn test_overflow_helper() {
        let error = DecodeError::new(vec![FieldError::overflow(16, 32)], b"{\"partial\":");
        assert!(error.is_overflow());
        assert_eq!(error.failures[0].path, "$");
    }

    #[test]
    fn test_json_error_is_decode() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StreamError = json_err.into();
        assert!(err.as_decode().is_some_and(|e| e.has_path("$")));
    }

    #[test]
    fn test_url_parse_error_is_configuration() {
        let err: StreamError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, StreamError::Configuration { .. }));
    }
}
