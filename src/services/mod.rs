//! Stream services.
//!
//! Session lifecycle for the filtered stream: start, replace, stop.

mod session;

pub use session::{RecordHandler, SessionState, StreamService, StreamSessionManager};
