//! Stream client.
//!
//! Wires configuration, transport, signing and metrics into a
//! [`StreamSessionManager`].

use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthProvider;
use crate::config::{StreamConfig, StreamConfigBuilder};
use crate::errors::{StreamError, StreamResult};
use crate::observability::{DefaultStreamMetrics, StreamMetrics};
use crate::services::{SessionState, StreamSessionManager};
use crate::transport::{HttpTransport, HttpTransportImpl};
use crate::types::{StreamRecord, TimestampFormat};

/// The filtered-stream client.
///
/// # Example
///
/// ```rust,no_run
/// use tweet_stream_client::StreamClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = StreamClient::builder()
///         .bearer_token("AAAA...")
///         .build()?;
///
///     client
///         .start_stream(["rust", "tokio"], |result| match result {
///             Ok(record) => println!("@{}: {}", record.author, record.body),
///             Err(e) if e.is_fatal() => eprintln!("stream ended: {e}"),
///             Err(e) => eprintln!("skipped record: {e}"),
///         })
///         .await?;
///
///     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
///     client.stop_stream().await;
///     Ok(())
/// }
/// ```
pub struct StreamClient {
    sessions: StreamSessionManager,
    metrics: Arc<dyn StreamMetrics>,
}

impl StreamClient {
    /// Creates a new client builder.
    pub fn builder() -> StreamClientBuilder {
        StreamClientBuilder::new()
    }

    /// Creates a client from environment variables.
    ///
    /// See [`StreamConfig::from_env`] for the variables read.
    pub fn from_env() -> StreamResult<Self> {
        StreamClientBuilder::from_config(StreamConfig::from_env()?).build()
    }

    /// Starts streaming records that match any of `keywords`, replacing any
    /// running stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be signed.
    pub async fn start_stream<I, S, F>(&self, keywords: I, on_record: F) -> StreamResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Result<StreamRecord, StreamError>) + Send + Sync + 'static,
    {
        self.sessions.start_stream(keywords, on_record).await
    }

    /// Stops the running stream, if any.
    pub async fn stop_stream(&self) {
        self.sessions.stop_stream().await;
    }

    /// Returns the current session state.
    pub async fn state(&self) -> SessionState {
        self.sessions.state().await
    }

    /// Returns the session manager.
    pub fn sessions(&self) -> &StreamSessionManager {
        &self.sessions
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StreamConfig {
        self.sessions.config()
    }

    /// Returns the metrics collector.
    pub fn metrics(&self) -> &Arc<dyn StreamMetrics> {
        &self.metrics
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("config", self.config())
            .finish_non_exhaustive()
    }
}

/// Builder for the stream client.
pub struct StreamClientBuilder {
    config_builder: StreamConfigBuilder,
    config: Option<StreamConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    auth: Option<Arc<dyn AuthProvider>>,
    metrics: Option<Arc<dyn StreamMetrics>>,
}

impl StreamClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            config_builder: StreamConfigBuilder::new(),
            config: None,
            transport: None,
            auth: None,
            metrics: None,
        }
    }

    /// Creates a builder from an existing configuration. Config setters on
    /// the builder are ignored afterwards.
    pub fn from_config(config: StreamConfig) -> Self {
        Self {
            config: Some(config),
            ..Self::new()
        }
    }

    /// Signs requests with OAuth 1.0a user-context credentials.
    pub fn oauth1(
        mut self,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Self {
        self.config_builder = self.config_builder.oauth1(
            consumer_key,
            consumer_secret,
            access_token,
            access_token_secret,
        );
        self
    }

    /// Signs requests with an app-only bearer token.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.bearer_token(token);
        self
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(base_url);
        self
    }

    /// Sets the filtered-stream endpoint path.
    pub fn filter_path(mut self, path: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.filter_path(path);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.connect_timeout(timeout);
        self
    }

    /// Limits how many bytes an unterminated fragment may occupy.
    pub fn max_buffer_bytes(mut self, limit: usize) -> Self {
        self.config_builder = self.config_builder.max_buffer_bytes(limit);
        self
    }

    /// Sets the `created_at` timestamp format.
    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.config_builder = self.config_builder.timestamp_format(format);
        self
    }

    /// Adds a custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.header(name, value);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets a custom auth provider, overriding configured credentials.
    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets a custom metrics collector.
    pub fn metrics(mut self, metrics: Arc<dyn StreamMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, if neither credentials nor an
    /// auth provider were given, or if the HTTP client cannot be created.
    pub fn build(self) -> StreamResult<StreamClient> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_builder.build()?,
        };

        let auth: Arc<dyn AuthProvider> = match (self.auth, config.credentials()) {
            (Some(auth), _) => auth,
            (None, Some(credentials)) => credentials.to_provider(),
            (None, None) => {
                return Err(StreamError::configuration(
                    "Credentials or an auth provider are required",
                ))
            }
        };
        auth.validate()?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(
                HttpTransportImpl::new(&config.base_url, config.connect_timeout)
                    .map_err(|e| StreamError::configuration(e.to_string()))?,
            ),
        };

        let metrics: Arc<dyn StreamMetrics> = self
            .metrics
            .unwrap_or_else(|| Arc::new(DefaultStreamMetrics::new()));

        tracing::debug!(scheme = auth.scheme(), base_url = %config.base_url, "Stream client built");

        Ok(StreamClient {
            sessions: StreamSessionManager::new(transport, auth, config, Arc::clone(&metrics)),
            metrics,
        })
    }
}

impl Default for StreamClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
