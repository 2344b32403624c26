//! A scripted numeric backend for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::backend::{BackendResponse, Invocation, NumericBackend, Operation};
use crate::core::{ArtifactName, OutcomeFlag, StageId, Table};
use crate::errors::BackendError;

/// Stages whose operation reports a quality flag.
const FLAGGED_STAGES: [StageId; 5] = [
    StageId::NumaxEstimate,
    StageId::PeaksMle,
    StageId::PeakBagModeId02,
    StageId::MixedPeaksMle,
    StageId::FinalFit,
];

const DEFAULT_SERIES_ROWS: usize = 16;
const DEFAULT_PEAK_ROWS: usize = 5;

/// One recorded backend invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendCall {
    /// Item id.
    pub item: String,
    /// Calling stage.
    pub stage: StageId,
    /// Requested operation.
    pub operation: Operation,
    /// Options as sent.
    pub options: serde_json::Value,
    /// Input artifacts sent, in declaration order.
    pub inputs: Vec<ArtifactName>,
}

/// A backend that fabricates plausible tables and answers with scripted
/// flags, row counts and failures.
///
/// Every flag-reporting stage answers `0.0` unless scripted otherwise.
/// Spectra have frequencies `10, 20, ..`, so the Nyquist frequency of the
/// default spectrum is `160.0`.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    flags: HashMap<StageId, f64>,
    item_flags: HashMap<(String, StageId), f64>,
    rows: HashMap<StageId, usize>,
    item_rows: HashMap<(String, StageId), usize>,
    failures: HashMap<StageId, String>,
    item_failures: HashMap<(String, StageId), String>,
    attributes: HashMap<StageId, Vec<(String, serde_json::Value)>>,
    omitted_outputs: Vec<(StageId, ArtifactName)>,
    omitted_flags: Vec<StageId>,
    calls: Mutex<Vec<BackendCall>>,
}

impl ScriptedBackend {
    /// Creates a backend where every stage succeeds.
    #[must_use]
    pub fn new() -> Self {
        let mut backend = Self::default();
        for (stage, key, value) in [
            (StageId::NumaxEstimate, "numax", 35.0),
            (StageId::PeakBagModeId02, "DeltaNu", 4.1),
            (StageId::PeakBagPeriodSpacing, "DeltaPi1", 80.0),
        ] {
            backend
                .attributes
                .insert(stage, vec![(key.to_string(), serde_json::json!(value))]);
        }
        backend
    }

    /// Scripts the flag a stage reports for every item.
    #[must_use]
    pub fn with_flag(mut self, stage: StageId, value: f64) -> Self {
        self.flags.insert(stage, value);
        self
    }

    /// Scripts the flag a stage reports for one item.
    #[must_use]
    pub fn with_item_flag(mut self, item: impl Into<String>, stage: StageId, value: f64) -> Self {
        self.item_flags.insert((item.into(), stage), value);
        self
    }

    /// Scripts the row count of every table a stage returns.
    #[must_use]
    pub fn with_rows(mut self, stage: StageId, rows: usize) -> Self {
        self.rows.insert(stage, rows);
        self
    }

    /// Scripts the row count of every table a stage returns for one item.
    #[must_use]
    pub fn with_item_rows(mut self, item: impl Into<String>, stage: StageId, rows: usize) -> Self {
        self.item_rows.insert((item.into(), stage), rows);
        self
    }

    /// Makes a stage fail for every item.
    #[must_use]
    pub fn failing(mut self, stage: StageId, reason: impl Into<String>) -> Self {
        self.failures.insert(stage, reason.into());
        self
    }

    /// Makes a stage fail for one item.
    #[must_use]
    pub fn failing_item(
        mut self,
        item: impl Into<String>,
        stage: StageId,
        reason: impl Into<String>,
    ) -> Self {
        self.item_failures.insert((item.into(), stage), reason.into());
        self
    }

    /// Adds an attribute a stage reports.
    #[must_use]
    pub fn with_attribute(
        mut self,
        stage: StageId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.attributes.entry(stage).or_default().push((key.into(), value));
        self
    }

    /// Leaves a declared output out of a stage's response.
    #[must_use]
    pub fn without_output(mut self, stage: StageId, name: ArtifactName) -> Self {
        self.omitted_outputs.push((stage, name));
        self
    }

    /// Leaves the flag out of a stage's response.
    #[must_use]
    pub fn without_flag(mut self, stage: StageId) -> Self {
        self.omitted_flags.push(stage);
        self
    }

    /// Returns every recorded call in order.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Returns the calls issued by one stage.
    #[must_use]
    pub fn calls_for(&self, stage: StageId) -> Vec<BackendCall> {
        self.calls.lock().iter().filter(|call| call.stage == stage).cloned().collect()
    }

    /// Returns the number of calls issued by one stage.
    #[must_use]
    pub fn call_count(&self, stage: StageId) -> usize {
        self.calls.lock().iter().filter(|call| call.stage == stage).count()
    }

    /// Returns the distinct items the backend was invoked for, in first-call
    /// order.
    #[must_use]
    pub fn items(&self) -> Vec<String> {
        let mut items: Vec<String> = Vec::new();
        for call in self.calls.lock().iter() {
            if !items.contains(&call.item) {
                items.push(call.item.clone());
            }
        }
        items
    }

    /// Clears recorded calls.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    fn lookup<T: Copy>(
        item: &str,
        stage: StageId,
        per_item: &HashMap<(String, StageId), T>,
        all: &HashMap<StageId, T>,
    ) -> Option<T> {
        per_item
            .get(&(item.to_string(), stage))
            .or_else(|| all.get(&stage))
            .copied()
    }
}

fn is_peak_table(name: ArtifactName) -> bool {
    matches!(name, ArtifactName::Peaks | ArtifactName::PeaksMle | ArtifactName::MixedPeaks)
}

#[allow(clippy::cast_precision_loss)]
fn synthesize(
    operation: Operation,
    name: ArtifactName,
    rows: usize,
) -> Result<Table, BackendError> {
    let invalid =
        |e: crate::core::TableError| BackendError::failed(operation.name(), e.to_string());
    let series = matches!(name, ArtifactName::Raw | ArtifactName::Filtered);
    let peaks = is_peak_table(name);

    let mut table = if series {
        Table::new(["time", "flux"])
    } else if peaks {
        Table::new(["frequency", "amplitude", "linewidth"])
    } else {
        Table::new(["frequency", "power"])
    };

    for i in 0..rows {
        let x = i as f64;
        let row = if series {
            vec![x * 0.02, 1.0 / (x + 1.0)]
        } else if peaks {
            vec![20.0 + 4.0 * x, 3.0, 0.1]
        } else {
            vec![(x + 1.0) * 10.0, 100.0 / (x + 1.0)]
        };
        table.push_row(row).map_err(invalid)?;
    }
    Ok(table)
}

#[async_trait]
impl NumericBackend for ScriptedBackend {
    async fn invoke(&self, invocation: Invocation<'_>) -> Result<BackendResponse, BackendError> {
        let item = invocation.item_id;
        let stage = invocation.stage;

        self.calls.lock().push(BackendCall {
            item: item.to_string(),
            stage,
            operation: invocation.operation,
            options: invocation.options.clone(),
            inputs: invocation.inputs.iter().map(|(name, _)| *name).collect(),
        });

        let failure = self
            .item_failures
            .get(&(item.to_string(), stage))
            .or_else(|| self.failures.get(&stage));
        if let Some(reason) = failure {
            return Err(BackendError::failed(invocation.operation.name(), reason.clone()));
        }

        let default_rows = if invocation.outputs.iter().copied().any(is_peak_table) {
            DEFAULT_PEAK_ROWS
        } else {
            DEFAULT_SERIES_ROWS
        };
        let rows = Self::lookup(item, stage, &self.item_rows, &self.rows).unwrap_or(default_rows);

        let mut response = BackendResponse::new();
        for name in invocation.outputs {
            if self.omitted_outputs.contains(&(stage, *name)) {
                continue;
            }
            response = response.with_output(*name, synthesize(invocation.operation, *name, rows)?);
        }

        if FLAGGED_STAGES.contains(&stage) && !self.omitted_flags.contains(&stage) {
            let value = Self::lookup(item, stage, &self.item_flags, &self.flags).unwrap_or(0.0);
            response = response.with_flag(OutcomeFlag::new(value));
        }

        for (key, value) in self.attributes.get(&stage).into_iter().flatten() {
            response = response.with_attribute(key.clone(), value.clone());
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Attributes;

    fn invocation<'a>(
        attrs: &'a Attributes,
        stage: StageId,
        operation: Operation,
        outputs: &'a [ArtifactName],
    ) -> Invocation<'a> {
        Invocation {
            item_id: "KIC001",
            stage,
            operation,
            options: serde_json::json!({}),
            attributes: attrs,
            inputs: Vec::new(),
            outputs,
        }
    }

    #[tokio::test]
    async fn test_default_spectrum() {
        let backend = ScriptedBackend::new();
        let attrs = Attributes::new();

        let response = backend
            .invoke(invocation(&attrs, StageId::Pds, Operation::CalcPds, &[ArtifactName::Pds]))
            .await
            .unwrap();

        let pds = &response.outputs[&ArtifactName::Pds];
        assert_eq!(pds.len(), 16);
        assert_eq!(pds.last_value("frequency"), Some(160.0));
        assert_eq!(response.flag, None);
    }

    #[tokio::test]
    async fn test_flags_default_to_success() {
        let backend = ScriptedBackend::new().with_item_flag("KIC002", StageId::NumaxEstimate, 1.0);
        let attrs = Attributes::new();

        let response = backend
            .invoke(invocation(&attrs, StageId::NumaxEstimate, Operation::NumaxEstimate, &[]))
            .await
            .unwrap();

        assert_eq!(response.flag, Some(OutcomeFlag::SUCCESS));
        assert_eq!(response.attributes["numax"], serde_json::json!(35.0));
    }

    #[tokio::test]
    async fn test_scripted_rows_and_failures() {
        let backend = ScriptedBackend::new()
            .with_rows(StageId::PeakFind, 0)
            .failing(StageId::BackgroundFit, "did not converge");
        let attrs = Attributes::new();

        let response = backend
            .invoke(invocation(
                &attrs,
                StageId::PeakFind,
                Operation::PeakFind,
                &[ArtifactName::Peaks],
            ))
            .await
            .unwrap();
        assert!(response.outputs[&ArtifactName::Peaks].is_empty());

        let err = backend
            .invoke(invocation(&attrs, StageId::BackgroundFit, Operation::BackgroundFit, &[]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not converge"));

        assert_eq!(backend.calls().len(), 2);
        assert_eq!(backend.call_count(StageId::BackgroundFit), 1);
        assert_eq!(backend.items(), vec!["KIC001".to_string()]);

        backend.reset();
        assert!(backend.calls().is_empty());
    }
}
