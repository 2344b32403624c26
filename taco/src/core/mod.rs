//! Core domain model types for the pipeline.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage identifiers, kinds and per-item terminal outcomes
//! - Outcome flags and the five ledger flag slots
//! - Numeric tables and the scalar attribute record
//! - Artifact names, stage outputs and progress events

mod artifact;
mod event;
mod flags;
mod output;
mod status;
pub(crate) mod table;

pub use artifact::{ArtifactName, ATTRIBUTES_FILE};
pub use event::PipelineEvent;
pub use flags::{FlagSlot, OutcomeFlag, OutcomeFlags};
pub use output::StageOutput;
pub use status::{ItemOutcome, ShortCircuit, StageId, StageKind};
pub use table::{Attributes, Table, TableError};
