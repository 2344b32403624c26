//! The reference TACO stages, each a thin adapter over one backend operation.

use super::Stage;
use crate::backend::Operation;
use crate::context::{StageContext, NYQUIST_ATTRIBUTE};
use crate::core::{ArtifactName, OutcomeFlag, StageId, StageOutput};
use crate::errors::TacoError;
use crate::settings::StageOptions;
use async_trait::async_trait;
use serde::Serialize;

fn mismatched(stage: StageId, options: &StageOptions) -> TacoError {
    TacoError::stage(
        stage.name(),
        format!("received '{}' options", options.kind()),
    )
}

fn to_json<T: Serialize>(stage: StageId, options: &T) -> Result<serde_json::Value, TacoError> {
    serde_json::to_value(options).map_err(|e| TacoError::stage(stage.name(), e.to_string()))
}

fn with_extra(
    mut options: serde_json::Value,
    key: &str,
    value: serde_json::Value,
) -> serde_json::Value {
    if let serde_json::Value::Object(map) = &mut options {
        map.insert(key.to_string(), value);
    }
    options
}

fn output(flag: Option<OutcomeFlag>) -> StageOutput {
    flag.map_or_else(StageOutput::done, StageOutput::flagged)
}

/// High-pass filters the raw light curve.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterStage;

#[async_trait]
impl Stage for FilterStage {
    fn id(&self) -> StageId {
        StageId::Filter
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> Result<StageOutput, TacoError> {
        let StageOptions::Filter(options) = ctx.options() else {
            return Err(mismatched(self.id(), ctx.options()));
        };
        let flag = ctx.invoke(Operation::Filter, to_json(self.id(), options)?).await?;
        Ok(output(flag))
    }
}

/// Computes the power density spectrum, or its oversampled variant.
///
/// The plain spectrum also records the Nyquist frequency, taken as its last
/// frequency bin.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectrumStage {
    oversampled: bool,
}

impl SpectrumStage {
    /// The plain spectrum.
    #[must_use]
    pub const fn plain() -> Self {
        Self { oversampled: false }
    }

    /// The oversampled spectrum.
    #[must_use]
    pub const fn oversampled() -> Self {
        Self { oversampled: true }
    }
}

#[async_trait]
impl Stage for SpectrumStage {
    fn id(&self) -> StageId {
        if self.oversampled {
            StageId::OversampledPds
        } else {
            StageId::Pds
        }
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> Result<StageOutput, TacoError> {
        let StageOptions::Pds(options) = ctx.options() else {
            return Err(mismatched(self.id(), ctx.options()));
        };
        ctx.invoke(Operation::CalcPds, to_json(self.id(), options)?).await?;

        if self.oversampled {
            return Ok(StageOutput::done());
        }

        let nyquist = ctx
            .state()
            .table(ArtifactName::Pds)
            .and_then(|pds| pds.last_value("frequency"))
            .ok_or_else(|| TacoError::stage(self.id().name(), "spectrum has no frequency bins"))?;
        ctx.state_mut()
            .attributes_mut()
            .set(NYQUIST_ATTRIBUTE, serde_json::json!(nyquist));

        Ok(StageOutput::done().add_metadata(NYQUIST_ATTRIBUTE, serde_json::json!(nyquist)))
    }
}

/// Estimates numax from the spectrum and reports its quality.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumaxEstimateStage;

#[async_trait]
impl Stage for NumaxEstimateStage {
    fn id(&self) -> StageId {
        StageId::NumaxEstimate
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> Result<StageOutput, TacoError> {
        let StageOptions::NumaxEstimate(options) = ctx.options() else {
            return Err(mismatched(self.id(), ctx.options()));
        };
        let flag = ctx.invoke(Operation::NumaxEstimate, to_json(self.id(), options)?).await?;
        Ok(output(flag))
    }
}

/// Fits and divides out the granulation background.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackgroundFitStage;

#[async_trait]
impl Stage for BackgroundFitStage {
    fn id(&self) -> StageId {
        StageId::BackgroundFit
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> Result<StageOutput, TacoError> {
        let StageOptions::BackgroundFit(options) = ctx.options() else {
            return Err(mismatched(self.id(), ctx.options()));
        };
        let flag = ctx.invoke(Operation::BackgroundFit, to_json(self.id(), options)?).await?;
        Ok(output(flag))
    }
}

/// Finds peaks in the background-corrected spectrum.
///
/// The mixed variant runs after 0/2 mode identification and asks the
/// collaborator to remove the identified l=0,2 modes first.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakFindStage {
    mixed: bool,
}

impl PeakFindStage {
    /// Resolved peak finding.
    #[must_use]
    pub const fn resolved() -> Self {
        Self { mixed: false }
    }

    /// Mixed-mode peak finding with l=0,2 modes removed.
    #[must_use]
    pub const fn mixed() -> Self {
        Self { mixed: true }
    }
}

#[async_trait]
impl Stage for PeakFindStage {
    fn id(&self) -> StageId {
        if self.mixed {
            StageId::MixedPeakFind
        } else {
            StageId::PeakFind
        }
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> Result<StageOutput, TacoError> {
        let StageOptions::PeakFind(options) = ctx.options() else {
            return Err(mismatched(self.id(), ctx.options()));
        };
        let mut request = to_json(self.id(), options)?;
        if self.mixed {
            request = with_extra(request, "remove_l02", serde_json::json!(true));
        }
        let flag = ctx.invoke(Operation::PeakFind, request).await?;

        let found = if self.mixed { ArtifactName::MixedPeaks } else { ArtifactName::Peaks };
        let count = ctx.state().row_count(found);
        tracing::debug!(item = ctx.item_id(), stage = %self.id(), peaks = count, "Peaks found");

        Ok(output(flag).add_metadata("peaks", serde_json::json!(count)))
    }
}

/// Which maximum likelihood fit a [`PeaksMleStage`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MleMode {
    /// Fit the resolved peaks.
    Resolved,
    /// Fit the mixed-mode peaks with l=0,2 modes removed.
    Mixed,
    /// Final fit of all peaks.
    Final,
}

/// Maximum likelihood fit of a peak list.
#[derive(Debug, Clone, Copy)]
pub struct PeaksMleStage {
    mode: MleMode,
}

impl PeaksMleStage {
    /// Creates a fit stage for `mode`.
    #[must_use]
    pub const fn new(mode: MleMode) -> Self {
        Self { mode }
    }

    /// Returns the fit mode.
    #[must_use]
    pub const fn mode(&self) -> MleMode {
        self.mode
    }
}

#[async_trait]
impl Stage for PeaksMleStage {
    fn id(&self) -> StageId {
        match self.mode {
            MleMode::Resolved => StageId::PeaksMle,
            MleMode::Mixed => StageId::MixedPeaksMle,
            MleMode::Final => StageId::FinalFit,
        }
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> Result<StageOutput, TacoError> {
        let StageOptions::PeaksMle(options) = ctx.options() else {
            return Err(mismatched(self.id(), ctx.options()));
        };
        let mut request =
            with_extra(to_json(self.id(), options)?, "mode", serde_json::json!(self.mode));
        if self.mode == MleMode::Mixed {
            request = with_extra(request, "remove_l02", serde_json::json!(true));
        }
        let flag = ctx.invoke(Operation::PeaksMle, request).await?;
        Ok(output(flag))
    }
}

/// Identifies the l=0 and l=2 modes among the resolved peaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeId02Stage;

#[async_trait]
impl Stage for ModeId02Stage {
    fn id(&self) -> StageId {
        StageId::PeakBagModeId02
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> Result<StageOutput, TacoError> {
        if !matches!(ctx.options(), StageOptions::None) {
            return Err(mismatched(self.id(), ctx.options()));
        }
        let flag = ctx.invoke(Operation::PeakBagModeId02, serde_json::json!({})).await?;
        Ok(output(flag))
    }
}

/// Fits the period spacing of the dipole mixed modes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodSpacingStage;

#[async_trait]
impl Stage for PeriodSpacingStage {
    fn id(&self) -> StageId {
        StageId::PeakBagPeriodSpacing
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> Result<StageOutput, TacoError> {
        let StageOptions::PeriodSpacing(options) = ctx.options() else {
            return Err(mismatched(self.id(), ctx.options()));
        };
        let flag = ctx.invoke(Operation::PeakBagPeriodSpacing, to_json(self.id(), options)?).await?;
        Ok(output(flag))
    }
}
