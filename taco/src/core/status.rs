//! Stage identifiers, stage kinds and per-item terminal outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The stages of the reference pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Filter the raw light curve.
    Filter,
    /// Compute the power density spectrum.
    Pds,
    /// Compute the oversampled power density spectrum.
    OversampledPds,
    /// Estimate numax.
    NumaxEstimate,
    /// Fit the granulation background.
    BackgroundFit,
    /// Find resolved peaks.
    PeakFind,
    /// Maximum-likelihood fit of the resolved peaks.
    PeaksMle,
    /// Identify l=0 and l=2 modes.
    PeakBagModeId02,
    /// Find mixed peaks with the l=0/2 modes removed.
    MixedPeakFind,
    /// Maximum-likelihood fit of the mixed peaks.
    MixedPeaksMle,
    /// Final maximum-likelihood fit over all peaks.
    FinalFit,
    /// Derive the period spacing.
    PeakBagPeriodSpacing,
}

impl StageId {
    /// Returns the stage name used in logs and events.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Pds => "pds",
            Self::OversampledPds => "oversampled_pds",
            Self::NumaxEstimate => "numax_estimate",
            Self::BackgroundFit => "background_fit",
            Self::PeakFind => "peak_find",
            Self::PeaksMle => "peaks_mle",
            Self::PeakBagModeId02 => "peak_bag_mode_id02",
            Self::MixedPeakFind => "mixed_peak_find",
            Self::MixedPeaksMle => "mixed_peaks_mle",
            Self::FinalFit => "final_fit",
            Self::PeakBagPeriodSpacing => "peak_bag_period_spacing",
        }
    }

    /// Returns the pipeline state reached once this stage has completed.
    #[must_use]
    pub const fn reached_state(self) -> &'static str {
        match self {
            Self::Filter => "FILTERED",
            Self::Pds | Self::OversampledPds => "SPECTRUM_COMPUTED",
            Self::NumaxEstimate => "NUMAX_ESTIMATED",
            Self::BackgroundFit => "BACKGROUND_FIT",
            Self::PeakFind => "PEAKS_FOUND",
            Self::PeaksMle => "PEAKS_MLE_RESOLVED",
            Self::PeakBagModeId02 => "MODES_IDENTIFIED_02",
            Self::MixedPeakFind => "MIXED_PEAKS_FOUND",
            Self::MixedPeaksMle => "MIXED_PEAKS_MLE",
            Self::FinalFit => "FINAL_FIT",
            Self::PeakBagPeriodSpacing => "PERIOD_SPACING_COMPUTED",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The shape of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Transforms item state and never short-circuits the pipeline.
    Unconditional,
    /// Transforms item state and is followed by a gate check.
    Gated,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconditional => write!(f, "unconditional"),
            Self::Gated => write!(f, "gated"),
        }
    }
}

/// The gate at which an item left the pipeline early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortCircuit {
    /// The numax estimate was not usable.
    Numax,
    /// Peak finding returned no peaks.
    NoPeaks,
    /// Fewer than three resolved peaks, or the resolved fit failed.
    Unresolved,
    /// The l=0/2 mode identification failed.
    ModeId02,
    /// The mixed-mode fit failed.
    MixedMle,
    /// The final fit failed.
    Final,
}

impl ShortCircuit {
    /// Returns the terminal state name.
    #[must_use]
    pub const fn state(self) -> &'static str {
        match self {
            Self::Numax => "SHORT_CIRCUITED_NUMAX",
            Self::NoPeaks => "SHORT_CIRCUITED_NO_PEAKS",
            Self::Unresolved => "SHORT_CIRCUITED_UNRESOLVED",
            Self::ModeId02 => "SHORT_CIRCUITED_02",
            Self::MixedMle => "SHORT_CIRCUITED_MIXED_MLE",
            Self::Final => "SHORT_CIRCUITED_FINAL",
        }
    }
}

impl fmt::Display for ShortCircuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state())
    }
}

/// The terminal state of one work item before it is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "gate")]
pub enum ItemOutcome {
    /// Every stage ran through period spacing.
    Completed,
    /// A gate stopped the item early.
    ShortCircuited(ShortCircuit),
}

impl ItemOutcome {
    /// Returns true if the item ran every stage.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("PERIOD_SPACING_COMPUTED"),
            Self::ShortCircuited(gate) => gate.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(StageId::Filter.to_string(), "filter");
        assert_eq!(StageId::PeakBagModeId02.to_string(), "peak_bag_mode_id02");
        assert_eq!(StageId::FinalFit.reached_state(), "FINAL_FIT");
    }

    #[test]
    fn test_stage_order_follows_pipeline() {
        assert!(StageId::Filter < StageId::NumaxEstimate);
        assert!(StageId::FinalFit < StageId::PeakBagPeriodSpacing);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(ItemOutcome::Completed.to_string(), "PERIOD_SPACING_COMPUTED");
        assert_eq!(
            ItemOutcome::ShortCircuited(ShortCircuit::NoPeaks).to_string(),
            "SHORT_CIRCUITED_NO_PEAKS"
        );
    }

    #[test]
    fn test_outcome_serialize() {
        let json =
            serde_json::to_string(&ItemOutcome::ShortCircuited(ShortCircuit::Numax)).unwrap();
        assert_eq!(json, r#"{"outcome":"short_circuited","gate":"numax"}"#);

        let json = serde_json::to_string(&ItemOutcome::Completed).unwrap();
        assert_eq!(json, r#"{"outcome":"completed"}"#);
    }

    #[test]
    fn test_stage_kind_serialize() {
        let json = serde_json::to_string(&StageKind::Gated).unwrap();
        assert_eq!(json, r#""gated""#);
    }
}
