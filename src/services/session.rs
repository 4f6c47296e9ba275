//! Stream session management.
//!
//! A [`StreamSessionManager`] owns at most one live feed connection. Each
//! session runs on its own task, which pulls body chunks from the transport,
//! feeds them through a fresh [`Reassembler`] and hands every result to the
//! consumer callback in arrival order.

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, instrument, warn};

use crate::auth::AuthProvider;
use crate::config::StreamConfig;
use crate::errors::{StreamError, StreamResult};
use crate::observability::StreamMetrics;
use crate::reassembly::{Reassembler, RecordDecoder};
use crate::transport::{HttpRequest, HttpTransport, RecordStream, TransportError};
use crate::types::StreamRecord;

/// Consumer callback for records and errors.
///
/// Invoked on the session task; it must not block.
pub type RecordHandler = Arc<dyn Fn(Result<StreamRecord, StreamError>) + Send + Sync>;

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection is open.
    Idle,
    /// A connection is open or being opened.
    Streaming,
}

/// Stream service trait.
#[async_trait]
pub trait StreamService: Send + Sync {
    /// Replaces any running session with one tracking `keywords`.
    async fn start_stream(&self, keywords: Vec<String>, on_record: RecordHandler) -> StreamResult<()>;

    /// Stops the running session, if any.
    async fn stop_stream(&self);

    /// Returns the current state.
    async fn state(&self) -> SessionState;
}

struct ActiveSession {
    generation: u64,
    keywords: Vec<String>,
    task: JoinHandle<()>,
}

enum SessionSlot {
    Idle,
    Streaming(ActiveSession),
}

impl SessionSlot {
    fn generation(&self) -> Option<u64> {
        match self {
            SessionSlot::Idle => None,
            SessionSlot::Streaming(session) => Some(session.generation),
        }
    }
}

/// Owns the feed connection and its lifecycle.
///
/// `start_stream` and `stop_stream` serialize on one lock. Teardown aborts the
/// previous session task and waits for it to finish, so once either call
/// returns no callback from an older session can run.
pub struct StreamSessionManager {
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
    config: Arc<StreamConfig>,
    metrics: Arc<dyn StreamMetrics>,
    slot: Arc<Mutex<SessionSlot>>,
    // Mirrors the running task's handle so `Drop` can cancel it without the slot lock.
    abort: std::sync::Mutex<Option<AbortHandle>>,
    next_generation: AtomicU64,
}

impl StreamSessionManager {
    /// Creates a new session manager.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
        config: StreamConfig,
        metrics: Arc<dyn StreamMetrics>,
    ) -> Self {
        Self {
            transport,
            auth,
            config: Arc::new(config),
            metrics,
            slot: Arc::new(Mutex::new(SessionSlot::Idle)),
            abort: std::sync::Mutex::new(None),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Starts streaming records that match any of `keywords`.
    ///
    /// Any running session is stopped first. Keywords are trimmed and
    /// de-duplicated; if none remain the call does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be signed. The running session,
    /// if any, is left untouched in that case. Connection failures are not
    /// returned here; they reach `on_record` as [`StreamError::Transport`].
    pub async fn start_stream<I, S, F>(&self, keywords: I, on_record: F) -> StreamResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Result<StreamRecord, StreamError>) + Send + Sync + 'static,
    {
        let keywords = normalize_keywords(keywords);
        self.start_session(keywords, Arc::new(on_record)).await
    }

    /// Stops the running session. Does nothing when idle.
    #[instrument(skip(self))]
    pub async fn stop_stream(&self) {
        let mut slot = self.slot.lock().await;
        if teardown(&mut slot).await {
            info!("Stream stopped");
        }
    }

    /// Returns the current state.
    pub async fn state(&self) -> SessionState {
        match *self.slot.lock().await {
            SessionSlot::Idle => SessionState::Idle,
            SessionSlot::Streaming(_) => SessionState::Streaming,
        }
    }

    /// Returns the keywords of the running session.
    pub async fn keywords(&self) -> Option<Vec<String>> {
        match &*self.slot.lock().await {
            SessionSlot::Idle => None,
            SessionSlot::Streaming(session) => Some(session.keywords.clone()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    #[instrument(skip(self, on_record), fields(track = %keywords.join(",")))]
    async fn start_session(&self, keywords: Vec<String>, on_record: RecordHandler) -> StreamResult<()> {
        if keywords.is_empty() {
            warn!("No keywords to track, not starting a stream");
            return Ok(());
        }

        let request = self.build_request(&keywords)?;
        let reassembler = self.reassembler();

        let mut slot = self.slot.lock().await;
        if teardown(&mut slot).await {
            debug!("Replaced running stream");
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(run_session(
            Arc::clone(&self.transport),
            request,
            reassembler,
            on_record,
            Arc::clone(&self.slot),
            generation,
            Arc::clone(&self.metrics),
        ));

        *self
            .abort
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task.abort_handle());
        *slot = SessionSlot::Streaming(ActiveSession {
            generation,
            keywords,
            task,
        });
        self.metrics.record_session_started();
        info!(generation, "Stream started");

        Ok(())
    }

    fn build_request(&self, keywords: &[String]) -> StreamResult<HttpRequest> {
        let mut request =
            HttpRequest::post(self.config.filter_path.clone()).with_query("track", keywords.join(","));

        for (name, value) in &self.config.custom_headers {
            request = request.with_header(name, value);
        }

        self.auth.apply_auth(&self.config.filter_url(), &mut request)?;
        Ok(request)
    }

    fn reassembler(&self) -> Reassembler {
        Reassembler::new(RecordDecoder::new(self.config.timestamp_format.clone()))
            .with_max_buffer_bytes(self.config.max_buffer_bytes)
            .with_metrics(Arc::clone(&self.metrics))
    }
}

#[async_trait]
impl StreamService for StreamSessionManager {
    async fn start_stream(&self, keywords: Vec<String>, on_record: RecordHandler) -> StreamResult<()> {
        self.start_session(normalize_keywords(keywords), on_record).await
    }

    async fn stop_stream(&self) {
        StreamSessionManager::stop_stream(self).await;
    }

    async fn state(&self) -> SessionState {
        StreamSessionManager::state(self).await
    }
}

impl Drop for StreamSessionManager {
    fn drop(&mut self) {
        let abort = self
            .abort
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(abort) = abort {
            abort.abort();
        }
    }
}

impl std::fmt::Debug for StreamSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSessionManager")
            .field("config", &self.config)
            .field("sessions", &self.next_generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Aborts the session in `slot` and waits for its task to end. Returns true
/// if a session was running.
async fn teardown(slot: &mut SessionSlot) -> bool {
    let SessionSlot::Streaming(session) = std::mem::replace(slot, SessionSlot::Idle) else {
        return false;
    };

    session.task.abort();
    match session.task.await {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => {}
        Err(e) => warn!(error = %e, generation = session.generation, "Stream task panicked"),
    }
    true
}

fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut normalized: Vec<String> = Vec::new();
    for keyword in keywords {
        let keyword = keyword.into().trim().to_string();
        if !keyword.is_empty() && !normalized.contains(&keyword) {
            normalized.push(keyword);
        }
    }
    normalized
}

async fn run_session(
    transport: Arc<dyn HttpTransport>,
    request: HttpRequest,
    reassembler: Reassembler,
    on_record: RecordHandler,
    slot: Arc<Mutex<SessionSlot>>,
    generation: u64,
    metrics: Arc<dyn StreamMetrics>,
) {
    let error = pump(transport.as_ref(), request, reassembler, &on_record).await;

    let mut slot = slot.lock().await;
    if slot.generation() != Some(generation) {
        return;
    }
    *slot = SessionSlot::Idle;

    metrics.record_transport_failure(error.kind());
    warn!(generation, error = %error, "Stream ended");
    on_record(Err(StreamError::Transport(error)));
}

/// Drives one connection until it fails, returning the failure.
async fn pump(
    transport: &dyn HttpTransport,
    request: HttpRequest,
    reassembler: Reassembler,
    on_record: &RecordHandler,
) -> TransportError {
    let response = match transport.send_streaming(request).await {
        Ok(response) => response,
        Err(e) => return e,
    };

    if !response.is_success() {
        return response.into_status_error().await;
    }
    info!(status = response.status, "Stream connected");

    let mut records = RecordStream::new(response.stream, reassembler);
    while let Some(item) = records.next().await {
        match item {
            Ok(record) => on_record(Ok(record)),
            Err(StreamError::Transport(e)) => return e,
            Err(e) => on_record(Err(e)),
        }
    }

    TransportError::Closed
}
