//! Pipeline progress events.

use super::{OutcomeFlags, ShortCircuit, StageId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An event emitted by the runner while processing a batch.
///
/// Events are consumed by an [`EventSink`](crate::events::EventSink) for
/// progress reporting, logging or test assertions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// The event type (e.g., "item.started", "stage.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The event payload data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl PipelineEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::utils::iso_timestamp(),
            data: HashMap::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns a data field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Creates a "run.started" event.
    #[must_use]
    pub fn run_started(items: usize) -> Self {
        Self::new("run.started").add_data("items", serde_json::json!(items))
    }

    /// Creates a "run.completed" event.
    #[must_use]
    pub fn run_completed(processed: usize, skipped: usize, failed: usize) -> Self {
        Self::new("run.completed")
            .add_data("processed", serde_json::json!(processed))
            .add_data("skipped", serde_json::json!(skipped))
            .add_data("failed", serde_json::json!(failed))
    }

    /// Creates an "item.started" event.
    #[must_use]
    pub fn item_started(item: &str) -> Self {
        Self::new("item.started").add_data("item", serde_json::json!(item))
    }

    /// Creates an "item.skipped" event for an item already in the ledger.
    #[must_use]
    pub fn item_skipped(item: &str) -> Self {
        Self::new("item.skipped").add_data("item", serde_json::json!(item))
    }

    /// Creates a "stage.started" event.
    #[must_use]
    pub fn stage_started(item: &str, position: usize, stage: StageId) -> Self {
        Self::new("stage.started")
            .add_data("item", serde_json::json!(item))
            .add_data("position", serde_json::json!(position))
            .add_data("stage", serde_json::json!(stage.name()))
    }

    /// Creates a "stage.completed" event.
    #[must_use]
    pub fn stage_completed(item: &str, stage: StageId, duration_ms: f64) -> Self {
        Self::new("stage.completed")
            .add_data("item", serde_json::json!(item))
            .add_data("stage", serde_json::json!(stage.name()))
            .add_data("state", serde_json::json!(stage.reached_state()))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates an "item.short_circuited" event.
    #[must_use]
    pub fn short_circuited(item: &str, stage: StageId, gate: ShortCircuit) -> Self {
        Self::new("item.short_circuited")
            .add_data("item", serde_json::json!(item))
            .add_data("stage", serde_json::json!(stage.name()))
            .add_data("state", serde_json::json!(gate.state()))
    }

    /// Creates an "item.recorded" event once the ledger row is durable.
    #[must_use]
    pub fn item_recorded(item: &str, flags: &OutcomeFlags) -> Self {
        let flags: serde_json::Map<String, serde_json::Value> = flags
            .iter()
            .map(|(slot, flag)| (slot.column().to_string(), serde_json::json!(flag.value())))
            .collect();
        Self::new("item.recorded")
            .add_data("item", serde_json::json!(item))
            .add_data("flags", serde_json::Value::Object(flags))
    }

    /// Creates an "item.failed" event for an unexpected error.
    #[must_use]
    pub fn item_failed(item: &str, error: &str) -> Self {
        Self::new("item.failed")
            .add_data("item", serde_json::json!(item))
            .add_data("error", serde_json::json!(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = PipelineEvent::new("test.event");
        assert_eq!(event.event_type, "test.event");
        assert!(event.data.is_empty());
        assert!(event.timestamp.contains('T'));
    }

    #[test]
    fn test_stage_started() {
        let event = PipelineEvent::stage_started("KIC001", 3, StageId::NumaxEstimate);
        assert_eq!(event.event_type, "stage.started");
        assert_eq!(event.get("stage"), Some(&serde_json::json!("numax_estimate")));
        assert_eq!(event.get("position"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn test_short_circuited() {
        let event =
            PipelineEvent::short_circuited("KIC001", StageId::PeakFind, ShortCircuit::NoPeaks);
        assert_eq!(event.get("state"), Some(&serde_json::json!("SHORT_CIRCUITED_NO_PEAKS")));
    }

    #[test]
    fn test_item_recorded_flags() {
        let event = PipelineEvent::item_recorded("KIC001", &OutcomeFlags::new());
        let flags = event.get("flags").unwrap();
        assert_eq!(flags["flag_numax"], serde_json::json!(1.0));
        assert_eq!(flags["flag_mle_final"], serde_json::json!(1.0));
    }

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::item_started("KIC001");
        let json = serde_json::to_string(&event).unwrap();
        let deserialized: PipelineEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.event_type, "item.started");
        assert_eq!(deserialized.get("item"), Some(&serde_json::json!("KIC001")));
    }
}
