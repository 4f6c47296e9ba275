//! Feed timestamp format.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::borrow::Cow;

/// chrono pattern of the feed's `created_at` field,
/// e.g. `Wed Oct 10 20:19:24 +0000 2018`.
pub const FEED_TIMESTAMP_PATTERN: &str = "%a %b %d %H:%M:%S %z %Y";

/// An immutable timestamp pattern.
///
/// Parsing is a pure function of the pattern and the input, so one value can
/// be cloned into every decoder without shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampFormat {
    pattern: Cow<'static, str>,
}

impl TimestampFormat {
    /// The format used by the filtered-stream feed.
    pub const FEED: TimestampFormat = TimestampFormat {
        pattern: Cow::Borrowed(FEED_TIMESTAMP_PATTERN),
    };

    /// Creates a format from a chrono pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Cow::Owned(pattern.into()),
        }
    }

    /// Returns the chrono pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parses a timestamp, normalizing it to UTC.
    ///
    /// Patterns without an offset are read as UTC.
    pub fn parse(&self, input: &str) -> Option<DateTime<Utc>> {
        let input = input.trim();
        if let Ok(at) = DateTime::parse_from_str(input, &self.pattern) {
            return Some(at.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(input, &self.pattern)
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Formats a timestamp with this pattern.
    pub fn format(&self, at: &DateTime<Utc>) -> String {
        at.format(&self.pattern).to_string()
    }
}

impl Default for TimestampFormat {
    fn default() -> Self {
        Self::FEED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_feed_timestamp() {
        let at = TimestampFormat::FEED
            .parse("Wed Oct 10 20:19:24 +0000 2018")
            .unwrap();

        assert_eq!(at, Utc.with_ymd_and_hms(2018, 10, 10, 20, 19, 24).unwrap());
    }

    #[test]
    fn test_parse_normalizes_offset() {
        let at = TimestampFormat::FEED
            .parse("Wed Oct 10 22:19:24 +0200 2018")
            .unwrap();

        assert_eq!(at, Utc.with_ymd_and_hms(2018, 10, 10, 20, 19, 24).unwrap());
    }

    #[test]
    fn test_parse_rejects_other_formats() {
        assert!(TimestampFormat::FEED.parse("2018-10-10T20:19:24Z").is_none());
        assert!(TimestampFormat::FEED.parse("").is_none());
    }

    #[test]
    fn test_format_matches_feed() {
        let at = Utc.with_ymd_and_hms(2018, 10, 10, 20, 19, 24).unwrap();
        assert_eq!(
            TimestampFormat::FEED.format(&at),
            "Wed Oct 10 20:19:24 +0000 2018"
        );
    }

    #[test]
    fn test_custom_pattern_without_offset_is_utc() {
        let format = TimestampFormat::new("%Y-%m-%d %H:%M:%S");
        let at = format.parse("2018-10-10 20:19:24").unwrap();

        assert_eq!(at, Utc.with_ymd_and_hms(2018, 10, 10, 20, 19, 24).unwrap());
        assert_eq!(format.pattern(), "%Y-%m-%d %H:%M:%S");
    }

    #[test]
    fn test_default_is_feed() {
        assert_eq!(TimestampFormat::default(), TimestampFormat::FEED);
    }
}
