//! Stream record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::TimestampFormat;

/// A decoded post from the feed.
///
/// Records are only ever built from a complete set of fields; see
/// [`RecordDecoder`](crate::reassembly::RecordDecoder).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Screen name of the posting account (`user.screen_name`).
    pub author: String,

    /// Post text (`text`).
    pub body: String,

    /// Creation time (`created_at`), second precision.
    pub posted_at: DateTime<Utc>,
}

impl StreamRecord {
    /// Creates a new record.
    pub fn new(author: impl Into<String>, body: impl Into<String>, posted_at: DateTime<Utc>) -> Self {
        Self {
            author: author.into(),
            body: body.into(),
            posted_at,
        }
    }

    /// Encodes the record in the feed's wire shape.
    pub fn to_wire_json(&self, format: &TimestampFormat) -> Value {
        json!({
            "created_at": format.format(&self.posted_at),
            "text": self.body,
            "user": {
                "screen_name": self.author,
            },
        })
    }

    /// Encodes the record as one CRLF-terminated feed line.
    pub fn to_wire_line(&self, format: &TimestampFormat) -> String {
        format!("{}\r\n", self.to_wire_json(format))
    }
}
