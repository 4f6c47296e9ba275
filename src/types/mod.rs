//! Type definitions for the filtered-stream feed.
//!
//! Provides the decoded record type and the timestamp format used by the
//! feed's `created_at` field.

mod record;
mod timestamp;

pub use record::StreamRecord;
pub use timestamp::TimestampFormat;
