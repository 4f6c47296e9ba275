//! Mock implementations for testing.
//!
//! [`MockTransport`] plays back scripted feed connections and keeps a log of
//! every request it opened and every body stream that was dropped before it
//! finished, so tests can assert on cancellation order.

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::Notify;

use crate::auth::AuthProvider;
use crate::errors::{StreamError, StreamResult};
use crate::transport::{
    ByteStream, HttpMethod, HttpRequest, HttpTransport, StreamingResponse, TransportError,
};
use crate::types::StreamRecord;

type Chunk = Result<Bytes, TransportError>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request path.
    pub path: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: HashMap<String, String>,
}

impl RecordedRequest {
    /// Returns the value of the first query parameter with this name.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Connection lifecycle events, indexed by request number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// Request `n` was opened.
    Requested(usize),
    /// The body of request `n` was dropped before it ended.
    Cancelled(usize),
}

enum Script {
    Body {
        status: u16,
        chunks: mpsc::UnboundedReceiver<Chunk>,
    },
    ConnectError(TransportError),
}

/// Sending half of a scripted live connection.
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: mpsc::UnboundedSender<Chunk>,
}

impl ChunkSender {
    /// Delivers a chunk. Returns false if the connection was already dropped.
    pub fn send(&self, chunk: impl Into<Bytes>) -> bool {
        self.tx.unbounded_send(Ok(chunk.into())).is_ok()
    }

    /// Fails the connection with a transport error.
    pub fn fail(&self, error: TransportError) -> bool {
        self.tx.unbounded_send(Err(error)).is_ok()
    }

    /// Ends the response body.
    pub fn close(self) {
        self.tx.close_channel();
    }
}

/// Mock HTTP transport for testing.
pub struct MockTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<RecordedRequest>>,
    events: Arc<Mutex<Vec<TransportEvent>>>,
    notify: Notify,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            events: Arc::new(Mutex::new(Vec::new())),
            notify: Notify::new(),
        }
    }

    /// Queues a 200 response whose body is fed through the returned sender.
    pub fn queue_live(&self) -> ChunkSender {
        let (tx, rx) = mpsc::unbounded();
        lock(&self.scripts).push_back(Script::Body {
            status: 200,
            chunks: rx,
        });
        ChunkSender { tx }
    }

    /// Queues a 200 response that delivers `chunks` and then ends.
    pub fn queue_chunks<I, C>(&self, chunks: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        let sender = self.queue_live();
        for chunk in chunks {
            sender.send(chunk);
        }
        sender.close();
    }

    /// Queues a response with a non-2xx status and a short body.
    pub fn queue_status(&self, status: u16, body: &str) {
        let (tx, rx) = mpsc::unbounded();
        let sender = ChunkSender { tx };
        sender.send(body.to_string());
        sender.close();
        lock(&self.scripts).push_back(Script::Body { status, chunks: rx });
    }

    /// Queues a failure to connect.
    pub fn queue_connect_error(&self, error: TransportError) {
        lock(&self.scripts).push_back(Script::ConnectError(error));
    }

    /// Gets all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Gets the lifecycle log.
    pub fn events(&self) -> Vec<TransportEvent> {
        lock(&self.events).clone()
    }

    /// Waits until at least `count` requests have been opened.
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.request_count() >= count {
                return;
            }
            notified.await;
        }
    }

    fn record_request(&self, request: &HttpRequest) -> usize {
        let mut requests = lock(&self.requests);
        requests.push(RecordedRequest {
            method: request.method,
            path: request.path.clone(),
            query: request.query.clone(),
            headers: request.headers.clone(),
        });
        let index = requests.len() - 1;
        lock(&self.events).push(TransportEvent::Requested(index));
        index
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let index = self.record_request(&request);
        let script = lock(&self.scripts).pop_front();
        self.notify.notify_waiters();

        match script {
            Some(Script::Body { status, chunks }) => {
                let stream: ByteStream = Box::pin(TrackedStream {
                    inner: chunks,
                    index,
                    events: Arc::clone(&self.events),
                    finished: false,
                });
                Ok(StreamingResponse {
                    status,
                    headers: HashMap::new(),
                    stream,
                })
            }
            Some(Script::ConnectError(error)) => Err(error),
            None => Err(TransportError::Connection {
                message: "no scripted response".to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("request_count", &self.request_count())
            .field("queued", &lock(&self.scripts).len())
            .finish()
    }
}

/// Body stream that logs a cancellation if dropped before it ends.
struct TrackedStream {
    inner: mpsc::UnboundedReceiver<Chunk>,
    index: usize,
    events: Arc<Mutex<Vec<TransportEvent>>>,
    finished: bool,
}

impl Stream for TrackedStream {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = self.inner.poll_next_unpin(cx);
        if let Poll::Ready(None) = poll {
            self.finished = true;
        }
        poll
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        if !self.finished {
            lock(&self.events).push(TransportEvent::Cancelled(self.index));
        }
    }
}

/// Mock auth provider for testing.
#[derive(Debug, Default)]
pub struct MockAuth;

impl MockAuth {
    /// Creates a new mock auth provider.
    pub fn new() -> Self {
        Self
    }
}

impl AuthProvider for MockAuth {
    fn apply_auth(&self, _url: &str, request: &mut HttpRequest) -> StreamResult<()> {
        request
            .headers
            .insert("Authorization".to_string(), "Mock".to_string());
        Ok(())
    }

    fn scheme(&self) -> &str {
        "Mock"
    }

    fn validate(&self) -> StreamResult<()> {
        Ok(())
    }
}

/// Returns a handler that forwards everything into a channel, and the
/// receiving end.
pub fn recording_handler() -> (
    impl Fn(Result<StreamRecord, StreamError>) + Send + Sync + 'static,
    tokio::sync::mpsc::UnboundedReceiver<Result<StreamRecord, StreamError>>,
) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let handler = move |result: Result<StreamRecord, StreamError>| {
        let _ = tx.send(result);
    };
    (handler, rx)
}

/// Feed payload fixtures.
pub mod fixtures {
    use serde_json::{json, Value};

    /// Timestamp used by every fixture record.
    pub const CREATED_AT: &str = "Wed Oct 10 20:19:24 +0000 2018";

    /// A complete record in wire shape.
    pub fn record_json(author: &str, body: &str) -> Value {
        json!({
            "created_at": CREATED_AT,
            "id_str": "1050118621198921728",
            "text": body,
            "user": {
                "screen_name": author,
                "name": author,
            },
        })
    }

    /// A complete record as one CRLF-terminated line.
    pub fn record_line(author: &str, body: &str) -> String {
        format!("{}\r\n", record_json(author, body))
    }

    /// A record with one top-level field removed.
    pub fn record_without(field: &str) -> String {
        let mut value = record_json("fixture", "fixture body");
        if let Some(map) = value.as_object_mut() {
            map.remove(field);
        }
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_requests_and_plays_chunks() {
        let transport = MockTransport::new();
        transport.queue_chunks(["a", "b"]);

        let request = HttpRequest::post("1.1/statuses/filter.json").with_query("track", "rust");
        let response = transport.send_streaming(request).await.unwrap();
        let chunks: Vec<_> = response.stream.collect().await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(transport.requests()[0].query_value("track"), Some("rust"));
        assert_eq!(transport.events(), vec![TransportEvent::Requested(0)]);
    }

    #[tokio::test]
    async fn test_dropping_live_body_logs_cancellation() {
        let transport = MockTransport::new();
        let sender = transport.queue_live();

        let response = transport
            .send_streaming(HttpRequest::post("x"))
            .await
            .unwrap();
        drop(response);

        assert!(!sender.send("late"));
        assert_eq!(
            transport.events(),
            vec![TransportEvent::Requested(0), TransportEvent::Cancelled(0)]
        );
    }

    #[tokio::test]
    async fn test_unscripted_request_fails_to_connect() {
        let transport = MockTransport::new();
        let err = transport
            .send_streaming(HttpRequest::post("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connection { .. }));
    }

    #[test]
    fn test_fixture_omits_field() {
        let raw = fixtures::record_without("text");
        assert!(!raw.contains("\"text\""));
        assert!(raw.contains("screen_name"));
    }
}
