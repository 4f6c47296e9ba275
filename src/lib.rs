//! Filtered-stream client.
//!
//! Opens a long-lived POST to a social feed's filtered-stream endpoint,
//! reassembles the chunked, newline-delimited JSON body into typed
//! [`StreamRecord`]s and hands each one to a callback.
//!
//! # Features
//!
//! - **Reassembly**: records split across chunks, several records per chunk,
//!   and blank keep-alive lines are all handled
//! - **Typed decoding**: a record missing a field becomes a [`DecodeError`]
//!   naming every bad path, and the stream keeps going
//! - **Session lifecycle**: one connection at a time; starting a new stream
//!   cancels the old one before the new request goes out
//! - **Signing**: OAuth 1.0a user context or app-only bearer tokens
//! - **Observability**: `tracing` events and atomic counters
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tweet_stream_client::StreamClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StreamClient::from_env()?;
//!
//!     client
//!         .start_stream(["rust"], |result| {
//!             if let Ok(record) = result {
//!                 println!("{} @{}: {}", record.posted_at, record.author, record.body);
//!             }
//!         })
//!         .await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(300)).await;
//!     client.stop_stream().await;
//!     Ok(())
//! }
//! ```
//!
//! # Pulling records
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use std::time::Duration;
//! use tweet_stream_client::reassembly::Reassembler;
//! use tweet_stream_client::transport::{HttpRequest, HttpTransport, HttpTransportImpl, RecordStream};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HttpTransportImpl::new("https://stream.twitter.com", Duration::from_secs(90))?;
//!     let request = HttpRequest::post("1.1/statuses/filter.json")
//!         .with_query("track", "rust")
//!         .with_header("Authorization", "Bearer AAAA...");
//!
//!     let response = transport.send_streaming(request).await?;
//!     let mut records = RecordStream::from_response(response, Reassembler::default()).await?;
//!
//!     while let Some(record) = records.next().await {
//!         println!("{:?}", record);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod reassembly;
pub mod services;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{StreamClient, StreamClientBuilder};
pub use config::{Credentials, StreamConfig, StreamConfigBuilder};
pub use errors::{DecodeError, FieldError, FieldErrorKind, StreamError, StreamResult};
pub use reassembly::{Reassembler, RecordDecoder};
pub use services::{RecordHandler, SessionState, StreamService, StreamSessionManager};
pub use transport::TransportError;
pub use types::{StreamRecord, TimestampFormat};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
