//! Reassembly of newline-delimited records from arbitrary chunks.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::RecordDecoder;
use crate::errors::{DecodeError, FieldError};
use crate::observability::StreamMetrics;
use crate::types::StreamRecord;

/// Per-session buffer that turns raw chunks into decoded records.
///
/// Each call to [`feed`](Self::feed) appends a chunk and returns whatever
/// records became complete. The buffer is first tried as one JSON value; if
/// that fails it is cut on line breaks. Blank lines are heartbeats. A
/// terminated line that is not valid JSON is dropped without an error, since
/// at this layer it cannot be told apart from a fragment. The unterminated
/// tail is kept until more bytes arrive.
///
/// Not thread-safe by design of its callers: one session task owns one
/// reassembler and feeds it in arrival order.
pub struct Reassembler {
    buffer: Vec<u8>,
    decoder: RecordDecoder,
    max_buffer_bytes: Option<usize>,
    metrics: Option<Arc<dyn StreamMetrics>>,
}

impl Reassembler {
    /// Creates a reassembler with no buffer limit.
    pub fn new(decoder: RecordDecoder) -> Self {
        Self {
            buffer: Vec::new(),
            decoder,
            max_buffer_bytes: None,
            metrics: None,
        }
    }

    /// Limits how large an unterminated fragment may grow before it is
    /// discarded and reported as a [`DecodeError`]. `None` means unbounded.
    pub fn with_max_buffer_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_buffer_bytes = limit;
        self
    }

    /// Reports counters to the given metrics collector.
    pub fn with_metrics(mut self, metrics: Arc<dyn StreamMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Appends a chunk and returns every record it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<StreamRecord, DecodeError>> {
        if let Some(metrics) = &self.metrics {
            metrics.record_bytes(chunk.len());
        }

        self.buffer.extend_from_slice(chunk);
        let mut results = Vec::new();

        if let Ok(value) = serde_json::from_slice::<Value>(&self.buffer) {
            let raw = std::mem::take(&mut self.buffer);
            self.emit(&mut results, &value, &raw);
            return results;
        }

        let buffer = std::mem::take(&mut self.buffer);
        let mut rest: &[u8] = &buffer;

        while let Some(newline) = rest.iter().position(|&b| b == b'\n') {
            let segment = rest[..newline].trim_ascii();
            rest = &rest[newline + 1..];

            if segment.is_empty() {
                self.count(|m| m.record_heartbeat());
                continue;
            }

            match serde_json::from_slice::<Value>(segment) {
                Ok(value) => self.emit(&mut results, &value, segment),
                Err(e) => {
                    debug!(error = %e, len = segment.len(), "Dropping unparsable segment");
                    self.count(|m| m.record_dropped_segment());
                }
            }
        }

        let tail = rest.trim_ascii();
        if tail.is_empty() {
            return results;
        }

        match serde_json::from_slice::<Value>(tail) {
            Ok(value) => self.emit(&mut results, &value, tail),
            Err(_) => {
                self.buffer = rest.to_vec();
                self.enforce_limit(&mut results);
            }
        }

        results
    }

    /// Returns the number of bytes held back as an incomplete record.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no partial record is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discards any buffered fragment, returning how many bytes were dropped.
    pub fn reset(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer = Vec::new();
        dropped
    }

    /// Returns the decoder used for complete records.
    pub fn decoder(&self) -> &RecordDecoder {
        &self.decoder
    }

    fn emit(
        &self,
        results: &mut Vec<Result<StreamRecord, DecodeError>>,
        value: &Value,
        raw: &[u8],
    ) {
        let result = self.decoder.decode(value, raw);
        match &result {
            Ok(_) => self.count(|m| m.record_record()),
            Err(e) => {
                debug!(error = %e, "Record failed to decode");
                self.count(|m| m.record_decode_error());
            }
        }
        results.push(result);
    }

    fn enforce_limit(&mut self, results: &mut Vec<Result<StreamRecord, DecodeError>>) {
        let Some(limit) = self.max_buffer_bytes else {
            return;
        };
        if self.buffer.len() <= limit {
            return;
        }

        warn!(
            limit,
            buffered = self.buffer.len(),
            "Discarding fragment that outgrew the reassembly buffer"
        );
        let fragment = std::mem::take(&mut self.buffer);
        results.push(Err(DecodeError::new(
            vec![FieldError::overflow(limit, fragment.len())],
            &fragment,
        )));
        self.count(|m| {
            m.record_buffer_overflow();
            m.record_decode_error();
        });
    }

    fn count(&self, f: impl FnOnce(&dyn StreamMetrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics.as_ref());
        }
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(RecordDecoder::default())
    }
}

impl std::fmt::Debug for Reassembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reassembler")
            .field("buffered", &self.buffer.len())
            .field("max_buffer_bytes", &self.max_buffer_bytes)
            .finish()
    }
}
