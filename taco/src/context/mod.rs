//! Per-item state and the context handed to a running stage.
//!
//! This module provides:
//! - [`ItemState`], the evolving record of one work item (attributes,
//!   tables produced so far, outcome flags)
//! - [`StageContext`], the borrowed view a stage executes against

mod execution;
mod item;

pub use execution::StageContext;
pub use item::{
    ItemState, CATALOG_ATTRIBUTE, NYQUIST_ATTRIBUTE, RAW_DATA_ATTRIBUTE, REVISION_ATTRIBUTE,
};
