//! HTTP transport implementation.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, ClientBuilder};
use std::collections::HashMap;
use std::time::Duration;
use tracing::instrument;

use super::{ByteStream, StreamingResponse, TransportError};

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// POST request.
    Post,
}

impl HttpMethod {
    /// Returns the method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
        }
    }
}

/// HTTP request representation.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request path, relative to the transport's base URL.
    pub path: String,
    /// Query parameters, in order.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HashMap::new(),
        }
    }

    /// Creates a new POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Appends a query parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns the value of the first query parameter with this name.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP transport trait.
///
/// Implementations open a request whose response body is delivered as a
/// stream of byte chunks in arrival order. Dropping the returned stream must
/// abort the underlying request.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and return the response headers with a live body stream.
    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError>;
}

/// HTTP transport implementation using reqwest.
///
/// Only the connect phase is bounded by a timeout; the response body of a
/// feed is expected to stay open indefinitely.
pub struct HttpTransportImpl {
    client: Client,
    base_url: String,
    connect_timeout: Duration,
}

impl HttpTransportImpl {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = ClientBuilder::new()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(1)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| TransportError::Connection {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            connect_timeout,
        })
    }

    /// Returns the base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the full URL for a path.
    fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl HttpTransport for HttpTransportImpl {
    #[instrument(skip(self, request), fields(method = request.method.as_str(), path = %request.path))]
    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let url = self.build_url(&request.path);

        let mut req_builder = match request.method {
            HttpMethod::Post => self.client.post(&url),
        };

        if !request.query.is_empty() {
            req_builder = req_builder.query(&request.query);
        }

        for (name, value) in &request.headers {
            req_builder = req_builder.header(name, value);
        }

        let timeout = self.connect_timeout;
        let response = req_builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, timeout))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();

        tracing::debug!(status, "Stream response received");

        let stream: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(move |result| result.map_err(|e| TransportError::from_reqwest(&e, timeout))),
        );

        Ok(StreamingResponse {
            status,
            headers,
            stream,
        })
    }
}

impl std::fmt::Debug for HttpTransportImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransportImpl")
            .field("base_url", &self.base_url)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let request = HttpRequest::post("/1.1/statuses/filter.json")
            .with_query("track", "rust,tokio")
            .with_header("Authorization", "Bearer abc");

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.query_value("track"), Some("rust,tokio"));
        assert_eq!(request.query_value("follow"), None);
        assert_eq!(request.headers.get("Authorization").map(String::as_str), Some("Bearer abc"));
    }

    #[test]
    fn test_build_url_joins_slashes() {
        let transport =
            HttpTransportImpl::new("https://stream.twitter.com/", Duration::from_secs(10)).unwrap();

        assert_eq!(transport.base_url(), "https://stream.twitter.com");
        assert_eq!(
            transport.build_url("/1.1/statuses/filter.json"),
            "https://stream.twitter.com/1.1/statuses/filter.json"
        );
    }

    #[test]
    fn test_method_names() {
        assert_eq!(HttpMethod::Post.as_str(), "POST");
    }
}
