//! Stage registry with validation and settings binding.

use super::spec::{GateCheck, StageSpec};
use crate::core::{ArtifactName, FlagSlot, ShortCircuit, StageId};
use crate::errors::{ContractErrorInfo, RegistryError, SettingsError};
use crate::settings::{PipelineSettings, StageOptions};
use crate::stages::{
    BackgroundFitStage, FilterStage, MleMode, ModeId02Stage, NumaxEstimateStage, PeakFindStage,
    PeaksMleStage, PeriodSpacingStage, SpectrumStage,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Builder for creating validated registries.
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    stages: Vec<StageSpec>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage(mut self, spec: StageSpec) -> Self {
        self.stages.push(spec);
        self
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Validates the stage order and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is empty, a stage id repeats, a stage
    /// reads an artifact no earlier stage produces, two stages fill the same
    /// flag slot, or a gate reads a flag or artifact that is not available
    /// when it is evaluated.
    pub fn build(self) -> Result<StageRegistry, RegistryError> {
        if self.stages.is_empty() {
            return Err(RegistryError::new("Registry has no stages").with_error_info(
                ContractErrorInfo::new("REGISTRY-EMPTY", "Cannot build an empty registry")
                    .with_fix_hint("Add at least one stage before building."),
            ));
        }

        let mut seen: HashSet<StageId> = HashSet::new();
        let mut produced: HashSet<ArtifactName> = HashSet::from([ArtifactName::Raw]);
        let mut filled: HashMap<FlagSlot, StageId> = HashMap::new();

        for spec in &self.stages {
            let id = spec.id();
            if !seen.insert(id) {
                return Err(RegistryError::new(format!("Stage '{id}' is registered twice"))
                    .with_stages(vec![id.name().to_string()])
                    .with_error_info(
                        ContractErrorInfo::new(
                            "REGISTRY-DUPLICATE_STAGE",
                            format!("Duplicate stage '{id}'"),
                        )
                        .with_fix_hint("Each stage may appear only once in the sequence."),
                    ));
            }

            if let Some(missing) = spec.inputs.iter().find(|name| !produced.contains(*name)) {
                return Err(missing_artifact(id, *missing, "reads"));
            }

            if let Some(slot) = spec.flag_slot {
                if let Some(previous) = filled.insert(slot, id) {
                    return Err(RegistryError::new(format!(
                        "Flag '{slot}' is filled by both '{previous}' and '{id}'"
                    ))
                    .with_stages(vec![previous.name().to_string(), id.name().to_string()])
                    .with_error_info(
                        ContractErrorInfo::new(
                            "REGISTRY-DUPLICATE_FLAG",
                            format!("Flag '{slot}' filled twice"),
                        )
                        .with_context_entry("flag", slot.column()),
                    ));
                }
            }

            produced.extend(spec.outputs.iter().copied());

            let Some(gate) = &spec.gate else { continue };
            let unfilled = gate
                .check
                .flag_slots()
                .into_iter()
                .find(|slot| !filled.contains_key(slot));
            if let Some(slot) = unfilled {
                return Err(RegistryError::new(format!(
                    "Gate of stage '{id}' checks flag '{slot}', which no stage up to it fills"
                ))
                .with_stages(vec![id.name().to_string()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "REGISTRY-UNFILLED_FLAG",
                        format!("Flag '{slot}' is never set before the gate"),
                    )
                    .with_fix_hint("Gate on a flag filled by this stage or an earlier one.")
                    .with_context_entry("flag", slot.column()),
                ));
            }
            let missing = gate
                .check
                .artifacts()
                .into_iter()
                .find(|name| !produced.contains(name));
            if let Some(missing) = missing {
                return Err(missing_artifact(id, missing, "gates on"));
            }
        }

        Ok(StageRegistry { stages: self.stages })
    }
}

fn missing_artifact(stage: StageId, artifact: ArtifactName, verb: &str) -> RegistryError {
    RegistryError::new(format!(
        "Stage '{stage}' {verb} artifact '{artifact}', which no earlier stage produces"
    ))
    .with_stages(vec![stage.name().to_string()])
    .with_error_info(
        ContractErrorInfo::new(
            "REGISTRY-MISSING_INPUT",
            format!("Artifact '{artifact}' is not produced"),
        )
        .with_fix_hint("Add a stage producing the artifact before this one.")
        .with_context_entry("artifact", artifact.key()),
    )
}

/// A validated, ordered list of stages.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    stages: Vec<StageSpec>,
}

impl StageRegistry {
    /// Builds the reference twelve-stage TACO sequence.
    ///
    /// # Errors
    ///
    /// Returns an error only if the reference sequence itself is inconsistent.
    pub fn reference() -> Result<Self, RegistryError> {
        use ArtifactName::{
            Filtered, MixedPeaks, OversampledPds, OversampledPdsBgr, Pds, PdsBgr, Peaks, PeaksMle,
            Raw,
        };

        RegistryBuilder::new()
            .stage(
                StageSpec::new(Arc::new(FilterStage))
                    .with_inputs(&[Raw])
                    .with_outputs(&[Filtered])
                    .with_settings_key("filter"),
            )
            .stage(
                StageSpec::new(Arc::new(SpectrumStage::plain()))
                    .with_inputs(&[Filtered])
                    .with_outputs(&[Pds])
                    .with_settings_key("pds"),
            )
            .stage(
                StageSpec::new(Arc::new(SpectrumStage::oversampled()))
                    .with_inputs(&[Filtered])
                    .with_outputs(&[OversampledPds])
                    .with_settings_key("oversampled_pds"),
            )
            .stage(
                StageSpec::new(Arc::new(NumaxEstimateStage))
                    .with_inputs(&[Pds])
                    .with_settings_key("numax_estimate")
                    .fills(FlagSlot::Numax)
                    .with_gate(GateCheck::FlagOk(FlagSlot::Numax), ShortCircuit::Numax),
            )
            .stage(
                StageSpec::new(Arc::new(BackgroundFitStage))
                    .with_inputs(&[Pds, OversampledPds])
                    .with_outputs(&[PdsBgr, OversampledPdsBgr])
                    .with_settings_key("background_fit"),
            )
            .stage(
                StageSpec::new(Arc::new(PeakFindStage::resolved()))
                    .with_inputs(&[PdsBgr, OversampledPdsBgr])
                    .with_outputs(&[Peaks])
                    .with_settings_key("peak_find")
                    .with_gate(GateCheck::MinRows(Peaks, 1), ShortCircuit::NoPeaks),
            )
            .stage(
                StageSpec::new(Arc::new(PeaksMleStage::new(MleMode::Resolved)))
                    .with_inputs(&[PdsBgr, Peaks])
                    .with_outputs(&[PeaksMle])
                    .with_settings_key("peaks_mle")
                    .fills(FlagSlot::MleResolved)
                    .with_gate(
                        GateCheck::AllOf(vec![
                            GateCheck::MinRows(PeaksMle, 3),
                            GateCheck::FlagOk(FlagSlot::MleResolved),
                        ]),
                        ShortCircuit::Unresolved,
                    ),
            )
            .stage(
                StageSpec::new(Arc::new(ModeId02Stage))
                    .with_inputs(&[PdsBgr, PeaksMle])
                    .with_outputs(&[PeaksMle])
                    .fills(FlagSlot::ModeId02)
                    .with_gate(GateCheck::FlagOk(FlagSlot::ModeId02), ShortCircuit::ModeId02),
            )
            .stage(
                StageSpec::new(Arc::new(PeakFindStage::mixed()))
                    .with_inputs(&[PdsBgr, OversampledPdsBgr, PeaksMle])
                    .with_outputs(&[MixedPeaks])
                    .with_settings_key("peak_find"),
            )
            .stage(
                StageSpec::new(Arc::new(PeaksMleStage::new(MleMode::Mixed)))
                    .with_inputs(&[PdsBgr, PeaksMle, MixedPeaks])
                    .with_outputs(&[MixedPeaks])
                    .with_settings_key("peaks_mle")
                    .fills(FlagSlot::MleMixed)
                    .with_gate(GateCheck::FlagOk(FlagSlot::MleMixed), ShortCircuit::MixedMle),
            )
            .stage(
                StageSpec::new(Arc::new(PeaksMleStage::new(MleMode::Final)))
                    .with_inputs(&[PdsBgr, PeaksMle, MixedPeaks])
                    .with_outputs(&[MixedPeaks])
                    .with_settings_key("peaks_mle")
                    .fills(FlagSlot::MleFinal)
                    .with_gate(GateCheck::FlagOk(FlagSlot::MleFinal), ShortCircuit::Final),
            )
            .stage(
                StageSpec::new(Arc::new(PeriodSpacingStage))
                    .with_inputs(&[PdsBgr, MixedPeaks])
                    .with_outputs(&[PdsBgr, MixedPeaks])
                    .with_settings_key("peak_bag_period_spacing"),
            )
            .build()
    }

    /// Returns the stages in order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the registry has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the spec of a stage.
    #[must_use]
    pub fn get(&self, id: StageId) -> Option<&StageSpec> {
        self.stages.iter().find(|spec| spec.id() == id)
    }

    /// Resolves every stage's options from the settings document.
    ///
    /// The k-th stage declaring key K receives the k-th block keyed K.
    /// Stages without a key receive [`StageOptions::None`].
    ///
    /// # Errors
    ///
    /// Returns an error if a stage's block is missing.
    pub fn bind(&self, settings: &PipelineSettings) -> Result<BoundRegistry, SettingsError> {
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        let mut stages = Vec::with_capacity(self.stages.len());

        for spec in &self.stages {
            let options = match spec.settings_key.as_deref() {
                None => StageOptions::None,
                Some(key) => {
                    let occurrence = occurrences.entry(key).or_insert(0);
                    let options = settings.resolve(key, *occurrence).cloned().ok_or_else(|| {
                        SettingsError::MissingBlock {
                            stage: spec.id().name().to_string(),
                            key: key.to_string(),
                            occurrence: *occurrence + 1,
                        }
                    })?;
                    *occurrence += 1;
                    options
                }
            };
            stages.push(BoundStage {
                spec: spec.clone(),
                options,
            });
        }

        let consumed: usize = occurrences.values().sum();
        let unused_blocks = settings.blocks().len().saturating_sub(consumed);
        if unused_blocks > 0 {
            tracing::warn!(
                blocks = settings.blocks().len(),
                used = consumed,
                "Settings contain blocks no stage uses"
            );
        }

        Ok(BoundRegistry {
            stages,
            unused_blocks,
        })
    }
}

/// A stage together with its resolved options.
#[derive(Debug, Clone)]
pub struct BoundStage {
    /// The stage spec.
    pub spec: StageSpec,
    /// The options handed to the stage.
    pub options: StageOptions,
}

/// A registry whose stages all have their options.
#[derive(Debug, Clone)]
pub struct BoundRegistry {
    stages: Vec<BoundStage>,
    unused_blocks: usize,
}

impl BoundRegistry {
    /// Returns the bound stages in order.
    #[must_use]
    pub fn stages(&self) -> &[BoundStage] {
        &self.stages
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if there are no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns how many settings blocks were left over after binding.
    #[must_use]
    pub fn unused_blocks(&self) -> usize {
        self.unused_blocks
    }
}
