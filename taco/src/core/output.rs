//! Stage output type.

use super::OutcomeFlag;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a stage hands back to the runner besides the item state it mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageOutput {
    /// The outcome flag emitted by a gated stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<OutcomeFlag>,

    /// Additional metadata reported on the `stage.completed` event.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StageOutput {
    /// Creates an output without a flag.
    #[must_use]
    pub fn done() -> Self {
        Self::default()
    }

    /// Creates an output carrying an outcome flag.
    #[must_use]
    pub fn flagged(flag: OutcomeFlag) -> Self {
        Self {
            flag: Some(flag),
            metadata: HashMap::new(),
        }
    }

    /// Adds a single metadata entry.
    #[must_use]
    pub fn add_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_has_no_flag() {
        let output = StageOutput::done();
        assert!(output.flag.is_none());
        assert!(output.metadata.is_empty());
    }

    #[test]
    fn test_flagged_with_metadata() {
        let output =
            StageOutput::flagged(OutcomeFlag::SUCCESS).add_metadata("peaks", serde_json::json!(4));
        assert_eq!(output.flag, Some(OutcomeFlag::SUCCESS));
        assert_eq!(output.metadata.get("peaks"), Some(&serde_json::json!(4)));
    }

    #[test]
    fn test_serialization_skips_empty() {
        let json = serde_json::to_string(&StageOutput::done()).unwrap();
        assert_eq!(json, "{}");

        let json = serde_json::to_string(&StageOutput::flagged(OutcomeFlag::FAILURE)).unwrap();
        assert_eq!(json, r#"{"flag":1.0}"#);
    }
}
