//! Typed decoding of feed records.

use serde_json::Value;

use crate::errors::{DecodeError, FieldError};
use crate::types::{StreamRecord, TimestampFormat};

const AUTHOR_PATH: &[&str] = &["user", "screen_name"];
const BODY_PATH: &[&str] = &["text"];
const POSTED_AT_PATH: &[&str] = &["created_at"];

/// Decodes parsed JSON values into [`StreamRecord`]s.
///
/// Every field is checked before a record is built, so a failure lists all
/// offending paths at once.
#[derive(Debug, Clone, Default)]
pub struct RecordDecoder {
    timestamp_format: TimestampFormat,
}

impl RecordDecoder {
    /// Creates a decoder using the given timestamp format.
    pub fn new(timestamp_format: TimestampFormat) -> Self {
        Self { timestamp_format }
    }

    /// Returns the timestamp format used for `created_at`.
    pub fn timestamp_format(&self) -> &TimestampFormat {
        &self.timestamp_format
    }

    /// Decodes a parsed value. `raw` is the source text, kept for diagnostics.
    pub fn decode(&self, value: &Value, raw: &[u8]) -> Result<StreamRecord, DecodeError> {
        if !value.is_object() {
            return Err(DecodeError::new(
                vec![FieldError::invalid_type("$", "object", value)],
                raw,
            ));
        }

        let mut failures = Vec::new();

        let author = string_at(value, AUTHOR_PATH, &mut failures);
        let body = string_at(value, BODY_PATH, &mut failures);
        let posted_at = match string_at(value, POSTED_AT_PATH, &mut failures) {
            Some(text) => {
                let parsed = self.timestamp_format.parse(text);
                if parsed.is_none() {
                    failures.push(FieldError::invalid_timestamp(
                        POSTED_AT_PATH.join("."),
                        self.timestamp_format.pattern(),
                        text,
                    ));
                }
                parsed
            }
            None => None,
        };

        match (author, body, posted_at) {
            (Some(author), Some(body), Some(posted_at)) => {
                Ok(StreamRecord::new(author, body, posted_at))
            }
            _ => Err(DecodeError::new(failures, raw)),
        }
    }

    /// Parses and decodes one complete record.
    pub fn decode_slice(&self, raw: &[u8]) -> Result<StreamRecord, DecodeError> {
        match serde_json::from_slice::<Value>(raw) {
            Ok(value) => self.decode(&value, raw),
            Err(e) => Err(DecodeError::new(vec![FieldError::malformed(&e)], raw)),
        }
    }
}

/// Walks `path` through nested objects and returns the string at its end,
/// recording a failure otherwise.
fn string_at<'a>(value: &'a Value, path: &[&str], failures: &mut Vec<FieldError>) -> Option<&'a str> {
    let mut current = value;

    for (depth, segment) in path.iter().enumerate() {
        match current {
            Value::Object(map) => match map.get(*segment) {
                Some(next) => current = next,
                None => {
                    failures.push(FieldError::missing(path.join("."), "string"));
                    return None;
                }
            },
            other => {
                failures.push(FieldError::invalid_type(path[..depth].join("."), "object", other));
                return None;
            }
        }
    }

    match current {
        Value::String(text) => Some(text.as_str()),
        other => {
            failures.push(FieldError::invalid_type(path.join("."), "string", other));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FieldErrorKind;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    fn decode(value: Value) -> Result<StreamRecord, DecodeError> {
        let raw = value.to_string();
        RecordDecoder::default().decode(&value, raw.as_bytes())
    }

    #[test]
    fn test_decodes_complete_record() {
        let record = decode(json!({
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "text": "hello",
            "user": { "screen_name": "ferris", "id": 1 },
            "lang": "en"
        }))
        .unwrap();

        assert_eq!(
            record,
            StreamRecord::new(
                "ferris",
                "hello",
                Utc.with_ymd_and_hms(2018, 10, 10, 20, 19, 24).unwrap()
            )
        );
    }

    #[test_case(json!({"created_at": "Wed Oct 10 20:19:24 +0000 2018", "user": {"screen_name": "a"}}), "text", FieldErrorKind::Missing; "missing text")]
    #[test_case(json!({"text": "t", "created_at": "Wed Oct 10 20:19:24 +0000 2018"}), "user.screen_name", FieldErrorKind::Missing; "missing user")]
    #[test_case(json!({"text": "t", "created_at": "Wed Oct 10 20:19:24 +0000 2018", "user": {}}), "user.screen_name", FieldErrorKind::Missing; "missing screen name")]
    #[test_case(json!({"text": 7, "created_at": "Wed Oct 10 20:19:24 +0000 2018", "user": {"screen_name": "a"}}), "text", FieldErrorKind::InvalidType; "numeric text")]
    #[test_case(json!({"text": null, "created_at": "Wed Oct 10 20:19:24 +0000 2018", "user": {"screen_name": "a"}}), "text", FieldErrorKind::InvalidType; "null text")]
    #[test_case(json!({"text": "t", "created_at": "Wed Oct 10 20:19:24 +0000 2018", "user": "a"}), "user", FieldErrorKind::InvalidType; "user not an object")]
    #[test_case(json!({"text": "t", "created_at": "2018-10-10", "user": {"screen_name": "a"}}), "created_at", FieldErrorKind::InvalidTimestamp; "bad timestamp")]
    #[test_case(json!({"text": "t", "created_at": 1539202764, "user": {"screen_name": "a"}}), "created_at", FieldErrorKind::InvalidType; "numeric timestamp")]
    fn test_single_field_failures(value: Value, path: &str, kind: FieldErrorKind) {
        let err = decode(value).unwrap_err();

        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].path, path);
        assert_eq!(err.failures[0].kind, kind);
    }

    #[test]
    fn test_reports_every_failing_field() {
        let err = decode(json!({ "created_at": "yesterday" })).unwrap_err();

        assert_eq!(err.paths(), vec!["user.screen_name", "text", "created_at"]);
        assert_eq!(
            err.failures[2].found.as_deref(),
            Some("yesterday")
        );
    }

    #[test]
    fn test_non_object_root() {
        let err = decode(json!(["not", "a", "record"])).unwrap_err();
        assert_eq!(err.paths(), vec!["$"]);
        assert_eq!(err.failures[0].expected, "object");
    }

    #[test]
    fn test_control_messages_are_rejected() {
        let err = decode(json!({ "limit": { "track": 42 } })).unwrap_err();
        assert!(err.has_path("text"));
        assert!(err.raw.contains("limit"));
    }

    #[test]
    fn test_decode_slice_rejects_malformed_json() {
        let err = RecordDecoder::default()
            .decode_slice(b"{\"text\":")
            .unwrap_err();
        assert_eq!(err.paths(), vec!["$"]);
    }

    #[test]
    fn test_round_trip_through_wire_shape() {
        let decoder = RecordDecoder::default();
        let original = StreamRecord::new(
            "rustlang",
            "Announcing a new release \u{1f980}",
            Utc.with_ymd_and_hms(2021, 5, 6, 15, 0, 0).unwrap(),
        );

        let line = original.to_wire_line(decoder.timestamp_format());
        let decoded = decoder.decode_slice(line.as_bytes()).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_custom_timestamp_format() {
        let decoder = RecordDecoder::new(TimestampFormat::new("%Y-%m-%dT%H:%M:%S%z"));
        let record = decoder
            .decode_slice(br#"{"text":"t","created_at":"2018-10-10T20:19:24+0000","user":{"screen_name":"a"}}"#)
            .unwrap();

        assert_eq!(record.posted_at, Utc.with_ymd_and_hms(2018, 10, 10, 20, 19, 24).unwrap());
    }
}
