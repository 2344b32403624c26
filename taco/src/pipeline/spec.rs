//! Stage specifications and gates.

use crate::context::ItemState;
use crate::core::{ArtifactName, FlagSlot, ShortCircuit, StageId, StageKind};
use crate::stages::Stage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A condition evaluated against the item state right after a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCheck {
    /// The flag in this slot is exactly `0.0`.
    FlagOk(FlagSlot),
    /// The artifact exists and has at least this many rows.
    MinRows(ArtifactName, usize),
    /// Every check passes.
    AllOf(Vec<GateCheck>),
}

impl GateCheck {
    /// Evaluates the check.
    #[must_use]
    pub fn passes(&self, state: &ItemState) -> bool {
        match self {
            Self::FlagOk(slot) => state.flags().get(*slot).is_success(),
            Self::MinRows(name, rows) => state.has_table(*name) && state.row_count(*name) >= *rows,
            Self::AllOf(checks) => checks.iter().all(|check| check.passes(state)),
        }
    }

    /// Returns the flag slots the check reads.
    #[must_use]
    pub fn flag_slots(&self) -> Vec<FlagSlot> {
        match self {
            Self::FlagOk(slot) => vec![*slot],
            Self::MinRows(..) => Vec::new(),
            Self::AllOf(checks) => checks.iter().flat_map(Self::flag_slots).collect(),
        }
    }

    /// Returns the artifacts the check reads.
    #[must_use]
    pub fn artifacts(&self) -> Vec<ArtifactName> {
        match self {
            Self::FlagOk(_) => Vec::new(),
            Self::MinRows(name, _) => vec![*name],
            Self::AllOf(checks) => checks.iter().flat_map(Self::artifacts).collect(),
        }
    }
}

/// A gate: if the check fails, the item ends in `on_fail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    /// The condition to continue.
    pub check: GateCheck,
    /// The terminal state when the condition fails.
    pub on_fail: ShortCircuit,
}

impl Gate {
    /// Creates a gate.
    #[must_use]
    pub fn new(check: GateCheck, on_fail: ShortCircuit) -> Self {
        Self { check, on_fail }
    }
}

/// Specification for a single stage in the pipeline.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// Artifacts that must exist before the stage runs.
    pub inputs: Vec<ArtifactName>,
    /// Artifacts the stage produces or replaces.
    pub outputs: Vec<ArtifactName>,
    /// Settings key whose block this stage receives.
    pub settings_key: Option<String>,
    /// Flag slot the stage's flag is stored in.
    pub flag_slot: Option<FlagSlot>,
    /// Gate evaluated after the stage.
    pub gate: Option<Gate>,
}

impl StageSpec {
    /// Creates a new stage specification.
    #[must_use]
    pub fn new(runner: Arc<dyn Stage>) -> Self {
        Self {
            runner,
            inputs: Vec::new(),
            outputs: Vec::new(),
            settings_key: None,
            flag_slot: None,
            gate: None,
        }
    }

    /// Returns the stage id.
    #[must_use]
    pub fn id(&self) -> StageId {
        self.runner.id()
    }

    /// Returns the stage kind, derived from whether it has a gate.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        if self.gate.is_some() {
            StageKind::Gated
        } else {
            StageKind::Unconditional
        }
    }

    /// Sets the declared inputs.
    #[must_use]
    pub fn with_inputs(mut self, inputs: &[ArtifactName]) -> Self {
        self.inputs = inputs.to_vec();
        self
    }

    /// Sets the declared outputs.
    #[must_use]
    pub fn with_outputs(mut self, outputs: &[ArtifactName]) -> Self {
        self.outputs = outputs.to_vec();
        self
    }

    /// Sets the settings key.
    #[must_use]
    pub fn with_settings_key(mut self, key: impl Into<String>) -> Self {
        self.settings_key = Some(key.into());
        self
    }

    /// Sets the flag slot the stage fills.
    #[must_use]
    pub fn fills(mut self, slot: FlagSlot) -> Self {
        self.flag_slot = Some(slot);
        self
    }

    /// Sets the gate.
    #[must_use]
    pub fn with_gate(mut self, check: GateCheck, on_fail: ShortCircuit) -> Self {
        self.gate = Some(Gate::new(check, on_fail));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OutcomeFlag, Table};
    use crate::stages::{FilterStage, MleMode, PeaksMleStage};

    fn state_with_peaks(rows: usize) -> ItemState {
        let mut state = ItemState::new("KIC001", Table::new(["time", "flux"]));
        let mut peaks = Table::new(["frequency"]);
        for i in 0..rows {
            peaks.push_row(vec![i as f64]).unwrap();
        }
        state.insert_table(ArtifactName::PeaksMle, peaks);
        state
    }

    #[test]
    fn test_stage_spec_creation() {
        let spec = StageSpec::new(Arc::new(FilterStage))
            .with_inputs(&[ArtifactName::Raw])
            .with_outputs(&[ArtifactName::Filtered])
            .with_settings_key("filter");

        assert_eq!(spec.id(), StageId::Filter);
        assert_eq!(spec.kind(), StageKind::Unconditional);
        assert_eq!(spec.settings_key.as_deref(), Some("filter"));
    }

    #[test]
    fn test_gated_kind() {
        let spec = StageSpec::new(Arc::new(PeaksMleStage::new(MleMode::Resolved)))
            .fills(FlagSlot::MleResolved)
            .with_gate(GateCheck::FlagOk(FlagSlot::MleResolved), ShortCircuit::Unresolved);

        assert_eq!(spec.kind(), StageKind::Gated);
    }

    #[test]
    fn test_flag_check() {
        let mut state = state_with_peaks(0);
        let check = GateCheck::FlagOk(FlagSlot::Numax);
        assert!(!check.passes(&state));

        state.set_flag(FlagSlot::Numax, OutcomeFlag::SUCCESS);
        assert!(check.passes(&state));

        state.set_flag(FlagSlot::Numax, OutcomeFlag::new(0.5));
        assert!(!check.passes(&state));
    }

    #[test]
    fn test_min_rows_check() {
        let check = GateCheck::MinRows(ArtifactName::PeaksMle, 3);
        assert!(!check.passes(&state_with_peaks(2)));
        assert!(check.passes(&state_with_peaks(3)));

        let missing = GateCheck::MinRows(ArtifactName::Peaks, 0);
        assert!(!missing.passes(&state_with_peaks(3)));
    }

    #[test]
    fn test_all_of_check() {
        let check = GateCheck::AllOf(vec![
            GateCheck::MinRows(ArtifactName::PeaksMle, 3),
            GateCheck::FlagOk(FlagSlot::MleResolved),
        ]);

        let mut state = state_with_peaks(2);
        state.set_flag(FlagSlot::MleResolved, OutcomeFlag::SUCCESS);
        assert!(!check.passes(&state));

        let mut state = state_with_peaks(4);
        assert!(!check.passes(&state));
        state.set_flag(FlagSlot::MleResolved, OutcomeFlag::SUCCESS);
        assert!(check.passes(&state));

        assert_eq!(check.flag_slots(), vec![FlagSlot::MleResolved]);
        assert_eq!(check.artifacts(), vec![ArtifactName::PeaksMle]);
    }
}
