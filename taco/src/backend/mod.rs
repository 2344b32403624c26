//! The seam to the numeric collaborators.
//!
//! The orchestration engine never computes anything numeric itself. Each
//! stage packs its input tables, attributes and options into an
//! [`Invocation`] and hands it to a [`NumericBackend`], which answers with an
//! optional outcome flag, attribute updates and output tables.

mod process;

pub use process::ProcessBackend;

use crate::core::{ArtifactName, Attributes, OutcomeFlag, StageId, Table};
use crate::errors::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A numeric operation offered by the collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Filter,
    CalcPds,
    NumaxEstimate,
    BackgroundFit,
    PeakFind,
    PeaksMle,
    PeakBagModeId02,
    PeakBagPeriodSpacing,
}

impl Operation {
    /// Returns the operation name passed to collaborators.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::CalcPds => "calc_pds",
            Self::NumaxEstimate => "numax_estimate",
            Self::BackgroundFit => "background_fit",
            Self::PeakFind => "peak_find",
            Self::PeaksMle => "peaks_mle",
            Self::PeakBagModeId02 => "peak_bag_mode_id02",
            Self::PeakBagPeriodSpacing => "peak_bag_period_spacing",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One request to a collaborator.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    /// The work item being processed.
    pub item_id: &'a str,
    /// The stage issuing the request.
    pub stage: StageId,
    /// The requested operation.
    pub operation: Operation,
    /// The stage's options, as a JSON object.
    pub options: serde_json::Value,
    /// The item's attributes so far.
    pub attributes: &'a Attributes,
    /// Input tables by artifact name.
    pub inputs: Vec<(ArtifactName, &'a Table)>,
    /// Artifacts the collaborator must return.
    pub outputs: &'a [ArtifactName],
}

impl Invocation<'_> {
    /// Returns an input table.
    #[must_use]
    pub fn input(&self, name: ArtifactName) -> Option<&Table> {
        self.inputs.iter().find(|(n, _)| *n == name).map(|(_, table)| *table)
    }
}

/// A collaborator's answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendResponse {
    /// Quality flag, for operations that produce one.
    pub flag: Option<OutcomeFlag>,
    /// Attributes to add or overwrite.
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Output tables by artifact name.
    pub outputs: HashMap<ArtifactName, Table>,
}

impl BackendResponse {
    /// Creates an empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag.
    #[must_use]
    pub fn with_flag(mut self, flag: OutcomeFlag) -> Self {
        self.flag = Some(flag);
        self
    }

    /// Adds an attribute update.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Adds an output table.
    #[must_use]
    pub fn with_output(mut self, name: ArtifactName, table: Table) -> Self {
        self.outputs.insert(name, table);
        self
    }
}

/// Trait for numeric collaborators.
///
/// Implementations must be safe to share; the runner holds one backend for
/// the whole run and awaits one invocation at a time.
#[async_trait]
pub trait NumericBackend: Send + Sync + fmt::Debug {
    /// Performs one operation.
    async fn invoke(&self, invocation: Invocation<'_>) -> Result<BackendResponse, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::CalcPds.to_string(), "calc_pds");
        assert_eq!(Operation::PeakBagModeId02.name(), "peak_bag_mode_id02");
    }

    #[test]
    fn test_invocation_input_lookup() {
        let attrs = Attributes::new();
        let pds = Table::new(["frequency", "power"]);
        let invocation = Invocation {
            item_id: "KIC001",
            stage: StageId::NumaxEstimate,
            operation: Operation::NumaxEstimate,
            options: serde_json::json!({}),
            attributes: &attrs,
            inputs: vec![(ArtifactName::Pds, &pds)],
            outputs: &[],
        };

        assert!(invocation.input(ArtifactName::Pds).is_some());
        assert!(invocation.input(ArtifactName::Filtered).is_none());
    }

    #[test]
    fn test_response_builder() {
        let response = BackendResponse::new()
            .with_flag(OutcomeFlag::SUCCESS)
            .with_attribute("numax", serde_json::json!(35.0))
            .with_output(ArtifactName::Peaks, Table::new(["frequency"]));

        assert_eq!(response.flag, Some(OutcomeFlag::SUCCESS));
        assert_eq!(response.attributes["numax"], serde_json::json!(35.0));
        assert!(response.outputs.contains_key(&ArtifactName::Peaks));
    }
}
