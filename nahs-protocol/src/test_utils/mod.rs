//! In-memory implementations for testing.
//!
//! Available behind the `test-utils` feature flag.

mod recording_transport;

pub use recording_transport::{RecordingTransport, SentEvent};
