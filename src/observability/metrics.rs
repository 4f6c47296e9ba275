//! Metrics collection for stream sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Metrics collector interface.
///
/// Called from the session task on every chunk, so implementations should be
/// cheap and must not block.
pub trait StreamMetrics: Send + Sync {
    /// Records that a session was started.
    fn record_session_started(&self);

    /// Records raw bytes received from the feed.
    fn record_bytes(&self, count: usize);

    /// Records an empty keep-alive line.
    fn record_heartbeat(&self);

    /// Records a successfully decoded record.
    fn record_record(&self);

    /// Records a record that failed to decode.
    fn record_decode_error(&self);

    /// Records a terminated segment that was not valid JSON.
    fn record_dropped_segment(&self);

    /// Records a fragment discarded for exceeding the buffer limit.
    fn record_buffer_overflow(&self);

    /// Records the transport failure that ended a session.
    fn record_transport_failure(&self, kind: &str);

    /// Gets current metrics.
    fn snapshot(&self) -> MetricsSnapshot;

    /// Resets all metrics.
    fn reset(&self);
}

/// Point-in-time copy of the stream counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Sessions started.
    pub sessions_started: u64,
    /// Raw bytes received.
    pub bytes_received: u64,
    /// Keep-alive lines seen.
    pub heartbeats: u64,
    /// Records decoded.
    pub records: u64,
    /// Records that failed to decode.
    pub decode_errors: u64,
    /// Unparsable segments dropped.
    pub dropped_segments: u64,
    /// Fragments discarded by the buffer limit.
    pub buffer_overflows: u64,
    /// Session-ending transport failures by kind.
    pub transport_failures: HashMap<String, u64>,
}

impl MetricsSnapshot {
    /// Total session-ending transport failures.
    pub fn total_transport_failures(&self) -> u64 {
        self.transport_failures.values().sum()
    }

    /// Fraction of complete JSON values that decoded into records, as a
    /// percentage.
    pub fn decode_success_rate(&self) -> f64 {
        let total = self.records + self.decode_errors;
        if total == 0 {
            100.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let rate = (self.records as f64 / total as f64) * 100.0;
            rate
        }
    }
}

/// Default metrics collector implementation.
pub struct DefaultStreamMetrics {
    sessions_started: AtomicU64,
    bytes_received: AtomicU64,
    heartbeats: AtomicU64,
    records: AtomicU64,
    decode_errors: AtomicU64,
    dropped_segments: AtomicU64,
    buffer_overflows: AtomicU64,
    transport_failures: RwLock<HashMap<String, u64>>,
}

impl DefaultStreamMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self {
            sessions_started: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            heartbeats: AtomicU64::new(0),
            records: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            dropped_segments: AtomicU64::new(0),
            buffer_overflows: AtomicU64::new(0),
            transport_failures: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for DefaultStreamMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamMetrics for DefaultStreamMetrics {
    fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    fn record_bytes(&self, count: usize) {
        self.bytes_received
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn record_heartbeat(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    fn record_record(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped_segment(&self) {
        self.dropped_segments.fetch_add(1, Ordering::Relaxed);
    }

    fn record_buffer_overflow(&self) {
        self.buffer_overflows.fetch_add(1, Ordering::Relaxed);
    }

    fn record_transport_failure(&self, kind: &str) {
        if let Ok(mut failures) = self.transport_failures.write() {
            *failures.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            dropped_segments: self.dropped_segments.load(Ordering::Relaxed),
            buffer_overflows: self.buffer_overflows.load(Ordering::Relaxed),
            transport_failures: self
                .transport_failures
                .read()
                .map(|f| f.clone())
                .unwrap_or_default(),
        }
    }

    fn reset(&self) {
        self.sessions_started.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
        self.heartbeats.store(0, Ordering::Relaxed);
        self.records.store(0, Ordering::Relaxed);
        self.decode_errors.store(0, Ordering::Relaxed);
        self.dropped_segments.store(0, Ordering::Relaxed);
        self.buffer_overflows.store(0, Ordering::Relaxed);

        if let Ok(mut failures) = self.transport_failures.write() {
            failures.clear();
        }
    }
}

impl std::fmt::Debug for DefaultStreamMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultStreamMetrics")
            .field("sessions_started", &self.sessions_started.load(Ordering::Relaxed))
            .field("records", &self.records.load(Ordering::Relaxed))
            .field("decode_errors", &self.decode_errors.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Collector that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl StreamMetrics for NoopMetrics {
    fn record_session_started(&self) {}
    fn record_bytes(&self, _count: usize) {}
    fn record_heartbeat(&self) {}
    fn record_record(&self) {}
    fn record_decode_error(&self) {}
    fn record_dropped_segment(&self) {}
    fn record_buffer_overflow(&self) {}
    fn record_transport_failure(&self, _kind: &str) {}

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::default()
    }

    fn reset(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = DefaultStreamMetrics::new();

        metrics.record_session_started();
        metrics.record_bytes(100);
        metrics.record_bytes(28);
        metrics.record_heartbeat();
        metrics.record_record();
        metrics.record_record();
        metrics.record_decode_error();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sessions_started, 1);
        assert_eq!(snapshot.bytes_received, 128);
        assert_eq!(snapshot.heartbeats, 1);
        assert_eq!(snapshot.records, 2);
        assert_eq!(snapshot.decode_errors, 1);
    }

    #[test]
    fn test_transport_failures_by_kind() {
        let metrics = DefaultStreamMetrics::new();

        metrics.record_transport_failure("closed");
        metrics.record_transport_failure("closed");
        metrics.record_transport_failure("http_status");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transport_failures.get("closed"), Some(&2));
        assert_eq!(snapshot.total_transport_failures(), 3);
    }

    #[test]
    fn test_decode_success_rate() {
        let metrics = DefaultStreamMetrics::new();
        assert!((metrics.snapshot().decode_success_rate() - 100.0).abs() < 0.1);

        metrics.record_record();
        metrics.record_record();
        metrics.record_record();
        metrics.record_decode_error();
        assert!((metrics.snapshot().decode_success_rate() - 75.0).abs() < 0.1);
    }

    #[test]
    fn test_reset() {
        let metrics = DefaultStreamMetrics::new();

        metrics.record_session_started();
        metrics.record_dropped_segment();
        metrics.record_buffer_overflow();
        metrics.record_transport_failure("timeout");

        metrics.reset();

        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_noop_records_nothing() {
        let metrics = NoopMetrics;
        metrics.record_record();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
