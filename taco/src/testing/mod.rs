//! Testing utilities for TACO pipelines.
//!
//! This module provides:
//! - A scripted numeric backend with a call log
//! - Scratch workspaces, raw light curves and settings documents

mod backend;
mod fixtures;

pub use backend::{BackendCall, ScriptedBackend};
pub use fixtures::{raw_series_text, TestWorkspace, REFERENCE_SETTINGS};
