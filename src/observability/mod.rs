//! Observability for the stream client.
//!
//! Events are emitted through `tracing`; counters go through a
//! [`StreamMetrics`] collector shared by the session and its reassembler.

mod logging;
mod metrics;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use metrics::{DefaultStreamMetrics, MetricsSnapshot, NoopMetrics, StreamMetrics};
