//! Event sinks for run progress.
//!
//! The runner reports every item and stage transition to an injected
//! [`EventSink`]. The binary uses [`LoggingEventSink`]; tests use
//! [`CollectingEventSink`] to assert on the sequence.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
