//! Stage trait and the reference TACO stages.
//!
//! Stages are the units of work in the pipeline. A stage does not decide
//! whether it runs or what happens after it; the runner does that from the
//! stage's spec. A stage only turns its inputs into outputs through the
//! numeric backend.

mod reference;

pub use reference::{
    BackgroundFitStage, FilterStage, MleMode, ModeId02Stage, NumaxEstimateStage, PeakFindStage,
    PeaksMleStage, PeriodSpacingStage, SpectrumStage,
};

use crate::context::StageContext;
use crate::core::{StageId, StageOutput};
use crate::errors::TacoError;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the stage id.
    fn id(&self) -> StageId;

    /// Executes the stage against one item.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The stage execution context
    ///
    /// # Returns
    ///
    /// The stage output carrying the stage's quality flag, if it has one.
    /// Errors abort the current item only.
    async fn execute(&self, ctx: &mut StageContext<'_>) -> Result<StageOutput, TacoError>;
}
