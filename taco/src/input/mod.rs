//! Work item discovery and raw time-series reading.

mod raw;

pub use raw::{catalog_id, parse_raw, read_raw, RawSeries, CATALOG_TOKEN};

use crate::errors::{SettingsError, TacoError};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Suffix of recognized raw input files.
pub const DEFAULT_SUFFIX: &str = "dat";

/// One observation to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Identifier, the input file name without its suffix.
    pub id: String,
    /// Path to the raw time series.
    pub raw_path: PathBuf,
}

impl WorkItem {
    /// Creates a work item.
    #[must_use]
    pub fn new(id: impl Into<String>, raw_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            raw_path: raw_path.into(),
        }
    }
}

/// Returns `true` if `id` can name an item directory and a ledger row.
///
/// The id must be a single normal path component (no separators, not `.`
/// or `..`) and must not contain line breaks.
#[must_use]
pub fn is_item_id(id: &str) -> bool {
    if id.trim().is_empty() || id.contains(['\n', '\r']) {
        return false;
    }
    let mut components = Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == id
    )
}

/// Scans `dir` for regular files ending in `.{suffix}`.
///
/// Items are returned sorted by file name so that processing order is
/// stable across runs and platforms.
///
/// Files whose stem is not a valid item id (see [`is_item_id`]) are skipped
/// with a warning.
///
/// # Errors
///
/// Returns a configuration error if `dir` does not exist and a discovery
/// error if it cannot be listed.
pub fn discover(dir: &Path, suffix: &str) -> Result<Vec<WorkItem>, TacoError> {
    if !dir.is_dir() {
        return Err(SettingsError::MissingInputDirectory {
            path: dir.to_path_buf(),
        }
        .into());
    }

    let entries = std::fs::read_dir(dir).map_err(|source| TacoError::Discovery {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut items = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| TacoError::Discovery {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(suffix) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            tracing::warn!(path = %path.display(), "Skipping input with non UTF-8 name");
            continue;
        };
        if !is_item_id(stem) {
            tracing::warn!(
                path = %path.display(),
                "Skipping input whose name is not a usable item id"
            );
            continue;
        }
        items.push(WorkItem::new(stem, path.clone()));
    }

    items.sort_by(|a, b| a.raw_path.file_name().cmp(&b.raw_path.file_name()));
    Ok(items)
}
