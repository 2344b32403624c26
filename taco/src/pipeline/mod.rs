//! Pipeline definition and execution.
//!
//! This module provides:
//! - Stage specifications with declared artifacts, flag slots and gates
//! - A validated stage registry and its binding to the settings document
//! - The sequential batch runner and its run report

mod registry;
mod report;
mod runner;
mod spec;


pub use registry::{BoundRegistry, BoundStage, RegistryBuilder, StageRegistry};
pub use report::{FailedItem, ItemReport, RunReport};
pub use runner::PipelineRunner;
pub use spec::{Gate, GateCheck, StageSpec};
