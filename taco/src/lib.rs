//! # TACO
//!
//! Batch orchestration for the TACO asteroseismology pipeline.
//!
//! TACO drives a directory of stellar light curves through a fixed sequence
//! of numeric stages (filtering, spectra, numax estimation, background fit,
//! peak finding, peak fitting, mode identification, period spacing) with:
//!
//! - **Resumable runs**: a ledger records one row per finished item, and items
//!   already in it are skipped
//! - **Gated stages**: a failed quality check ends the item early and records
//!   explicit failure flags for everything downstream
//! - **Checkpointed artifacts**: every stage's tables and the running attribute
//!   table are written to the item's directory as the item progresses
//! - **A pluggable numeric backend**: the numerics live behind one async trait,
//!   with an external-process implementation for production
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use taco::prelude::*;
//!
//! let settings = PipelineSettings::load(Path::new("pipeline_settings.json"))?;
//! let registry = StageRegistry::reference()?.bind(&settings)?;
//! let backend = Arc::new(ProcessBackend::from_config(settings.backend().unwrap()));
//!
//! let mut runner = PipelineRunner::new(
//!     registry,
//!     Ledger::open("stars.csv")?,
//!     ArtifactStore::new("output"),
//!     backend,
//! );
//! let report = runner.run(&discover(Path::new("input"), "dat")?).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod artifacts;
pub mod backend;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod input;
pub mod ledger;
pub mod pipeline;
pub mod settings;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::artifacts::ArtifactStore;
    pub use crate::backend::{
        BackendResponse, Invocation, NumericBackend, Operation, ProcessBackend,
    };
    pub use crate::context::{ItemState, StageContext};
    pub use crate::core::{
        ArtifactName, Attributes, FlagSlot, ItemOutcome, OutcomeFlag, OutcomeFlags, PipelineEvent,
        ShortCircuit, StageId, StageKind, StageOutput, Table,
    };
    pub use crate::errors::{
        BackendError, ContractErrorInfo, LedgerError, RawInputError, RegistryError, SettingsError,
        TacoError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::input::{discover, WorkItem};
    pub use crate::ledger::{Ledger, LedgerRow};
    pub use crate::pipeline::{
        BoundRegistry, GateCheck, PipelineRunner, RegistryBuilder, RunReport, StageRegistry,
        StageSpec,
    };
    pub use crate::settings::{BackendConfig, PipelineSettings, StageOptions};
    pub use crate::stages::Stage;
    pub use crate::utils::{generate_run_id, git_revision, iso_timestamp};
}
