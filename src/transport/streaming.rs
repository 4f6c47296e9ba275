//! Streaming response handling.

use bytes::Bytes;
use futures::{ready, Stream, StreamExt};
use pin_project_lite::pin_project;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll};

use super::TransportError;
use crate::errors::{DecodeError, StreamError};
use crate::reassembly::Reassembler;
use crate::types::StreamRecord;

/// Boxed stream of raw body chunks in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Upper bound on how much of an error body is kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 4096;

/// Streaming HTTP response.
pub struct StreamingResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Byte stream.
    pub stream: ByteStream,
}

impl StreamingResponse {
    /// Returns true if the status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts a non-2xx response into a transport error, reading at most a
    /// few kilobytes of the body for the message.
    pub async fn into_status_error(mut self) -> TransportError {
        let mut body = Vec::new();
        while body.len() < ERROR_BODY_LIMIT {
            match self.stream.next().await {
                Some(Ok(chunk)) => body.extend_from_slice(&chunk),
                Some(Err(_)) | None => break,
            }
        }
        body.truncate(ERROR_BODY_LIMIT);

        let text = String::from_utf8_lossy(&body).trim().to_string();
        TransportError::HttpStatus {
            status: self.status,
            body: (!text.is_empty()).then_some(text),
        }
    }
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

pin_project! {
    /// Record stream.
    ///
    /// Feeds a body byte stream through a [`Reassembler`] and yields one item
    /// per decoded record or decode failure. A transport failure is yielded
    /// once and ends the stream; a clean end of body ends it silently.
    pub struct RecordStream {
        #[pin]
        inner: ByteStream,
        reassembler: Reassembler,
        pending: VecDeque<Result<StreamRecord, DecodeError>>,
        done: bool,
    }
}

impl RecordStream {
    /// Creates a record stream over a raw byte stream.
    pub fn new(inner: ByteStream, reassembler: Reassembler) -> Self {
        Self {
            inner,
            reassembler,
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Creates a record stream from a response.
    ///
    /// A non-2xx response is rejected with [`TransportError::HttpStatus`]
    /// carrying the start of its body.
    pub async fn from_response(
        response: StreamingResponse,
        reassembler: Reassembler,
    ) -> Result<Self, TransportError> {
        if !response.is_success() {
            return Err(response.into_status_error().await);
        }
        Ok(Self::new(response.stream, reassembler))
    }

    /// Returns the number of bytes held back as an incomplete record.
    pub fn buffered_len(&self) -> usize {
        self.reassembler.buffered_len()
    }
}

impl Stream for RecordStream {
    type Item = Result<StreamRecord, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(result) = this.pending.pop_front() {
                return Poll::Ready(Some(result.map_err(StreamError::Decode)));
            }

            if *this.done {
                return Poll::Ready(None);
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    this.pending.extend(this.reassembler.feed(&chunk));
                }
                Some(Err(e)) => {
                    *this.done = true;
                    this.reassembler.reset();
                    return Poll::Ready(Some(Err(StreamError::Transport(e))));
                }
                None => {
                    *this.done = true;
                    let discarded = this.reassembler.reset();
                    if discarded > 0 {
                        tracing::debug!(discarded, "Stream ended with an incomplete record");
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream")
            .field("buffered", &self.reassembler.buffered_len())
            .field("pending", &self.pending.len())
            .field("done", &self.done)
            .finish()
    }
}
