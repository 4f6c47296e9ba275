//! Configuration for the stream client.
//!
//! Covers where the feed lives, how long connecting may take, how requests
//! are signed, and the optional reassembly buffer limit.

use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use url::{Host, Url};

use crate::auth::{AuthProvider, BearerAuth, OAuth1Signer};
use crate::errors::{StreamError, StreamResult};
use crate::types::TimestampFormat;

/// Default base URL of the streaming API.
pub const DEFAULT_BASE_URL: &str = "https://stream.twitter.com";

/// Default path of the filtered-stream endpoint.
pub const DEFAULT_FILTER_PATH: &str = "1.1/statuses/filter.json";

/// Default connect timeout (90 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(90);

/// Credentials used to sign the stream request.
#[derive(Clone)]
pub enum Credentials {
    /// User-context OAuth 1.0a credentials.
    OAuth1 {
        /// Consumer (API) key.
        consumer_key: String,
        /// Consumer (API) secret.
        consumer_secret: SecretString,
        /// Access token.
        access_token: String,
        /// Access token secret.
        access_token_secret: SecretString,
    },
    /// App-only bearer token.
    Bearer(SecretString),
}

impl Credentials {
    /// Builds the matching auth provider.
    pub fn to_provider(&self) -> Arc<dyn AuthProvider> {
        match self {
            Credentials::OAuth1 {
                consumer_key,
                consumer_secret,
                access_token,
                access_token_secret,
            } => Arc::new(OAuth1Signer::new(
                consumer_key.clone(),
                consumer_secret.clone(),
                access_token.clone(),
                access_token_secret.clone(),
            )),
            Credentials::Bearer(token) => Arc::new(BearerAuth::new(token.clone())),
        }
    }

    /// Returns the auth scheme these credentials produce.
    pub fn scheme(&self) -> &'static str {
        match self {
            Credentials::OAuth1 { .. } => "OAuth",
            Credentials::Bearer(_) => "Bearer",
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::OAuth1 { .. } => f.write_str("OAuth1([REDACTED])"),
            Credentials::Bearer(_) => f.write_str("Bearer([REDACTED])"),
        }
    }
}

/// Configuration for the stream client.
#[derive(Clone)]
pub struct StreamConfig {
    /// Request credentials. `None` when the caller supplies its own
    /// [`AuthProvider`].
    pub(crate) credentials: Option<Credentials>,
    /// Base URL of the streaming API, without a trailing slash.
    pub base_url: String,
    /// Path of the filtered-stream endpoint, relative to `base_url`.
    pub filter_path: String,
    /// Connect timeout. The body itself has no timeout.
    pub connect_timeout: Duration,
    /// Largest unterminated fragment kept before it is reported and dropped.
    pub max_buffer_bytes: Option<usize>,
    /// Format of the `created_at` field.
    pub timestamp_format: TimestampFormat,
    /// Custom headers to include in requests.
    pub custom_headers: Vec<(String, String)>,
}

impl StreamConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `STREAM_BEARER_TOKEN`: app-only token, or
    /// - `STREAM_CONSUMER_KEY`, `STREAM_CONSUMER_SECRET`, `STREAM_ACCESS_TOKEN`,
    ///   `STREAM_ACCESS_TOKEN_SECRET`: OAuth 1.0a credentials (all four)
    /// - `STREAM_BASE_URL` (optional): custom base URL
    /// - `STREAM_CONNECT_TIMEOUT` (optional): connect timeout in seconds
    /// - `STREAM_MAX_BUFFER_BYTES` (optional): reassembly buffer limit
    pub fn from_env() -> StreamResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StreamResult<Self> {
        let mut builder = StreamConfigBuilder::new();

        let oauth_vars = [
            "STREAM_CONSUMER_KEY",
            "STREAM_CONSUMER_SECRET",
            "STREAM_ACCESS_TOKEN",
            "STREAM_ACCESS_TOKEN_SECRET",
        ];
        let oauth: Vec<Option<String>> = oauth_vars.iter().map(|name| lookup(*name)).collect();

        if let Some(token) = lookup("STREAM_BEARER_TOKEN") {
            builder = builder.bearer_token(token);
        } else if let [Some(ck), Some(cs), Some(at), Some(ats)] = oauth.as_slice() {
            builder = builder.oauth1(ck, cs, at, ats);
        } else {
            let missing: Vec<&str> = oauth_vars
                .iter()
                .zip(&oauth)
                .filter_map(|(name, value)| value.is_none().then_some(*name))
                .collect();
            return Err(StreamError::configuration(format!(
                "STREAM_BEARER_TOKEN not set and OAuth credentials incomplete, missing {}",
                missing.join(", ")
            )));
        }

        if let Some(base_url) = lookup("STREAM_BASE_URL") {
            builder = builder.base_url(base_url);
        }

        if let Some(secs) = lookup("STREAM_CONNECT_TIMEOUT") {
            let secs = secs.trim().parse::<u64>().map_err(|_| {
                StreamError::configuration(format!("STREAM_CONNECT_TIMEOUT is not a number: {secs}"))
            })?;
            builder = builder.connect_timeout_secs(secs);
        }

        if let Some(limit) = lookup("STREAM_MAX_BUFFER_BYTES") {
            let limit = limit.trim().parse::<usize>().map_err(|_| {
                StreamError::configuration(format!(
                    "STREAM_MAX_BUFFER_BYTES is not a number: {limit}"
                ))
            })?;
            builder = builder.max_buffer_bytes(limit);
        }

        builder.build()
    }

    /// Returns the configured credentials, if any.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Returns the full URL for an endpoint, without query.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Returns the full URL of the filtered-stream endpoint.
    pub fn filter_url(&self) -> String {
        self.endpoint_url(&self.filter_path)
    }
}

impl std::fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConfig")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .field("filter_path", &self.filter_path)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_buffer_bytes", &self.max_buffer_bytes)
            .field("timestamp_format", &self.timestamp_format.pattern())
            .finish_non_exhaustive()
    }
}

/// Builder for `StreamConfig`.
#[derive(Default)]
pub struct StreamConfigBuilder {
    credentials: Option<Credentials>,
    base_url: Option<String>,
    filter_path: Option<String>,
    connect_timeout: Option<Duration>,
    max_buffer_bytes: Option<usize>,
    timestamp_format: Option<TimestampFormat>,
    custom_headers: Vec<(String, String)>,
}

impl StreamConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signs requests with OAuth 1.0a user-context credentials.
    pub fn oauth1(
        mut self,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials::OAuth1 {
            consumer_key: consumer_key.into(),
            consumer_secret: SecretString::new(consumer_secret.into()),
            access_token: access_token.into(),
            access_token_secret: SecretString::new(access_token_secret.into()),
        });
        self
    }

    /// Signs requests with an app-only bearer token.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::Bearer(SecretString::new(token.into())));
        self
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the filtered-stream endpoint path.
    pub fn filter_path(mut self, path: impl Into<String>) -> Self {
        self.filter_path = Some(path.into());
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout in seconds.
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout = Some(Duration::from_secs(secs));
        self
    }

    /// Limits how many bytes an unterminated fragment may occupy.
    pub fn max_buffer_bytes(mut self, limit: usize) -> Self {
        self.max_buffer_bytes = Some(limit);
        self
    }

    /// Sets the `created_at` timestamp format.
    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = Some(format);
        self
    }

    /// Adds a custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> StreamResult<StreamConfig> {
        if let Some(credentials) = &self.credentials {
            credentials.to_provider().validate().map_err(|e| match e {
                StreamError::Authentication { message } => StreamError::configuration(message),
                other => other,
            })?;
        }

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        validate_base_url(&base_url)?;

        let filter_path = self
            .filter_path
            .unwrap_or_else(|| DEFAULT_FILTER_PATH.to_string())
            .trim_start_matches('/')
            .to_string();
        if filter_path.is_empty() {
            return Err(StreamError::configuration("Filter path cannot be empty"));
        }

        let connect_timeout = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        if connect_timeout.is_zero() {
            return Err(StreamError::configuration("Connect timeout must be positive"));
        }

        if self.max_buffer_bytes == Some(0) {
            return Err(StreamError::configuration(
                "Buffer limit must be at least one byte",
            ));
        }

        Ok(StreamConfig {
            credentials: self.credentials,
            base_url,
            filter_path,
            connect_timeout,
            max_buffer_bytes: self.max_buffer_bytes,
            timestamp_format: self.timestamp_format.unwrap_or_default(),
            custom_headers: self.custom_headers,
        })
    }
}

/// Requires HTTPS, except for loopback hosts used in local testing.
fn validate_base_url(base_url: &str) -> StreamResult<()> {
    let url = Url::parse(base_url)?;

    let loopback = match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => return Err(StreamError::configuration("Base URL must have a host")),
    };

    match url.scheme() {
        "https" => Ok(()),
        "http" if loopback => Ok(()),
        _ => Err(StreamError::configuration("Base URL must use HTTPS")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = StreamConfig::builder().bearer_token("AAAA").build().unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.filter_path, DEFAULT_FILTER_PATH);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.max_buffer_bytes, None);
        assert_eq!(config.timestamp_format, TimestampFormat::FEED);
        assert_eq!(
            config.filter_url(),
            "https://stream.twitter.com/1.1/statuses/filter.json"
        );
    }

    #[test]
    fn test_config_builder_overrides() {
        let config = StreamConfig::builder()
            .oauth1("ck", "cs", "at", "ats")
            .base_url("https://stream.example.com/")
            .filter_path("/2/filter.json")
            .connect_timeout_secs(5)
            .max_buffer_bytes(1 << 20)
            .header("User-Agent", "tweet-stream")
            .build()
            .unwrap();

        assert_eq!(config.endpoint_url(&config.filter_path), "https://stream.example.com/2/filter.json");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.max_buffer_bytes, Some(1 << 20));
        assert_eq!(config.custom_headers.len(), 1);
        assert_eq!(config.credentials().map(Credentials::scheme), Some("OAuth"));
    }

    #[test]
    fn test_credentials_are_optional() {
        let config = StreamConfig::builder().build().unwrap();
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_rejects_insecure_base_url() {
        let result = StreamConfig::builder()
            .base_url("http://stream.example.com")
            .build();
        assert!(matches!(result, Err(StreamError::Configuration { .. })));
    }

    #[test]
    fn test_allows_loopback_http() {
        assert!(StreamConfig::builder().base_url("http://127.0.0.1:8080").build().is_ok());
        assert!(StreamConfig::builder().base_url("http://localhost:8080").build().is_ok());
    }

    #[test]
    fn test_rejects_unparsable_base_url() {
        assert!(StreamConfig::builder().base_url("stream").build().is_err());
    }

    #[test]
    fn test_rejects_empty_credentials() {
        assert!(StreamConfig::builder().bearer_token("").build().is_err());
        assert!(StreamConfig::builder().oauth1("ck", "", "at", "ats").build().is_err());
    }

    #[test]
    fn test_rejects_zero_limits() {
        assert!(StreamConfig::builder().max_buffer_bytes(0).build().is_err());
        assert!(StreamConfig::builder()
            .connect_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_from_lookup_prefers_bearer() {
        let config = StreamConfig::from_lookup(lookup(&[
            ("STREAM_BEARER_TOKEN", "AAAA"),
            ("STREAM_CONSUMER_KEY", "ck"),
        ]))
        .unwrap();

        assert_eq!(config.credentials().map(Credentials::scheme), Some("Bearer"));
    }

    #[test]
    fn test_from_lookup_reads_oauth_and_options() {
        let config = StreamConfig::from_lookup(lookup(&[
            ("STREAM_CONSUMER_KEY", "ck"),
            ("STREAM_CONSUMER_SECRET", "cs"),
            ("STREAM_ACCESS_TOKEN", "at"),
            ("STREAM_ACCESS_TOKEN_SECRET", "ats"),
            ("STREAM_BASE_URL", "https://stream.example.com"),
            ("STREAM_CONNECT_TIMEOUT", "15"),
            ("STREAM_MAX_BUFFER_BYTES", "65536"),
        ]))
        .unwrap();

        assert_eq!(config.credentials().map(Credentials::scheme), Some("OAuth"));
        assert_eq!(config.base_url, "https://stream.example.com");
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.max_buffer_bytes, Some(65536));
    }

    #[test]
    fn test_from_lookup_names_missing_oauth_vars() {
        let err = StreamConfig::from_lookup(lookup(&[
            ("STREAM_CONSUMER_KEY", "ck"),
            ("STREAM_ACCESS_TOKEN", "at"),
        ]))
        .unwrap_err()
        .to_string();

        assert!(err.contains("STREAM_CONSUMER_SECRET"));
        assert!(err.contains("STREAM_ACCESS_TOKEN_SECRET"));
        assert!(!err.contains("STREAM_CONSUMER_KEY,"));
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let result = StreamConfig::from_lookup(lookup(&[
            ("STREAM_BEARER_TOKEN", "AAAA"),
            ("STREAM_CONNECT_TIMEOUT", "soon"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let config = StreamConfig::builder()
            .oauth1("ck", "super-secret", "at", "token-secret")
            .build()
            .unwrap();

        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("token-secret"));
    }
}
