//! Run reports.

use crate::core::{ItemOutcome, OutcomeFlags, StageId};
use serde::Serialize;
use uuid::Uuid;

/// What happened to one processed item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    /// Item id.
    pub id: String,
    /// Terminal state.
    pub outcome: ItemOutcome,
    /// Flags as recorded in the ledger.
    pub flags: OutcomeFlags,
    /// Stages executed, in order.
    pub stages: Vec<StageId>,
}

/// An item whose processing ended in an unexpected error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    /// Item id.
    pub id: String,
    /// Rendered error chain.
    pub error: String,
}

/// Summary of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// Items skipped because the ledger already had them.
    pub skipped: Vec<String>,
    /// Items processed and recorded.
    pub items: Vec<ItemReport>,
    /// Items that failed and were not recorded.
    pub failed: Vec<FailedItem>,
}

impl RunReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            skipped: Vec::new(),
            items: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Returns the number of recorded items.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.items.len()
    }

    /// Returns the report for an item.
    #[must_use]
    pub fn item(&self, id: &str) -> Option<&ItemReport> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Returns true if no item failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ShortCircuit;

    #[test]
    fn test_report_lookup() {
        let mut report = RunReport::new(Uuid::new_v4());
        report.items.push(ItemReport {
            id: "KIC001".into(),
            outcome: ItemOutcome::ShortCircuited(ShortCircuit::Numax),
            flags: OutcomeFlags::new(),
            stages: vec![StageId::Filter],
        });

        assert_eq!(report.processed(), 1);
        assert!(report.item("KIC001").is_some());
        assert!(report.item("KIC002").is_none());
        assert!(report.is_clean());
    }

    #[test]
    fn test_report_serializes() {
        let mut report = RunReport::new(Uuid::nil());
        report.skipped.push("KIC000".into());
        report.failed.push(FailedItem {
            id: "KIC003".into(),
            error: "broken".into(),
        });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["skipped"][0], "KIC000");
        assert_eq!(json["failed"][0]["id"], "KIC003");
        assert!(!report.is_clean());
    }
}
