//! Pipeline settings document.
//!
//! The document is JSON:
//!
//! ```json
//! {
//!   "pipeline": [
//!     {"filter": {"width": 40}},
//!     {"pds": {}},
//!     {"oversampled_pds": {"ofac": 10}}
//!   ],
//!   "backend": {"program": "taco-numeric", "args": [], "timeout_secs": 600}
//! }
//! ```
//!
//! `pipeline` is an ordered list of single-key blocks. The same key may appear
//! more than once; stages that share a key receive its blocks in order.

mod options;

pub use options::{
    BackgroundFitOptions, FilterOptions, NumaxEstimateOptions, PdsOptions, PeakFindOptions,
    PeaksMleOptions, PeriodSpacingOptions, StageOptions,
};

use crate::errors::SettingsError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default settings file name.
pub const DEFAULT_SETTINGS_FILE: &str = "pipeline_settings.json";

/// Configuration of the external numeric collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Program to spawn.
    pub program: String,
    /// Arguments placed before the operation name.
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-invocation timeout in seconds; none means wait indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl BackendConfig {
    /// Creates a config for `program` with no arguments and no timeout.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_secs: None,
        }
    }
}

/// One parsed pipeline block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsBlock {
    /// The block's stage key.
    pub key: String,
    /// The typed options.
    pub options: StageOptions,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    pipeline: Vec<serde_json::Value>,
    #[serde(default)]
    backend: Option<BackendConfig>,
}

/// The loaded and validated settings document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSettings {
    blocks: Vec<SettingsBlock>,
    backend: Option<BackendConfig>,
}

impl PipelineSettings {
    /// Loads settings from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid settings
    /// document.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parses settings from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON, a block does not have
    /// exactly one key, a key is unknown, or a block's options do not fit its
    /// record.
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let raw: RawSettings =
            serde_json::from_str(text).map_err(|source| SettingsError::Parse { source })?;

        let mut blocks = Vec::with_capacity(raw.pipeline.len());
        for (index, block) in raw.pipeline.into_iter().enumerate() {
            let serde_json::Value::Object(map) = block else {
                return Err(SettingsError::MalformedBlock { index, found: 0 });
            };
            if map.len() != 1 {
                return Err(SettingsError::MalformedBlock {
                    index,
                    found: map.len(),
                });
            }
            let Some((key, body)) = map.into_iter().next() else {
                return Err(SettingsError::MalformedBlock { index, found: 0 });
            };

            let options = StageOptions::from_block(&key, body)
                .ok_or_else(|| SettingsError::UnknownKey {
                    index,
                    key: key.clone(),
                })?
                .map_err(|source| SettingsError::InvalidOptions {
                    key: key.clone(),
                    index,
                    source,
                })?;

            blocks.push(SettingsBlock { key, options });
        }

        Ok(Self {
            blocks,
            backend: raw.backend,
        })
    }

    /// Creates settings from already-typed blocks.
    #[must_use]
    pub fn from_blocks(blocks: Vec<SettingsBlock>, backend: Option<BackendConfig>) -> Self {
        Self { blocks, backend }
    }

    /// Returns every block in document order.
    #[must_use]
    pub fn blocks(&self) -> &[SettingsBlock] {
        &self.blocks
    }

    /// Returns the collaborator configuration, if any.
    #[must_use]
    pub fn backend(&self) -> Option<&BackendConfig> {
        self.backend.as_ref()
    }

    /// Returns the `occurrence`-th (zero-based) block keyed `key`.
    #[must_use]
    pub fn resolve(&self, key: &str, occurrence: usize) -> Option<&StageOptions> {
        self.blocks
            .iter()
            .filter(|block| block.key == key)
            .nth(occurrence)
            .map(|block| &block.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOCUMENT: &str = r#"{
        "pipeline": [
            {"filter": {"width": 40.0, "remove_gaps": -1}},
            {"pds": {}},
            {"oversampled_pds": {"ofac": 10}},
            {"numax_estimate": {"filter_width": 0.2}},
            {"background_fit": null},
            {"peak_find": {"snr": 1.1, "prob": 0.0001, "min_aic": 2}},
            {"peaks_mle": {"min_aic": 2}},
            {"peak_find": {"min_aic": 8, "navg": 1, "maxlwd": 0.6}},
            {"peaks_mle": {"min_aic": 2, "maxlwd": 0.5}},
            {"peaks_mle": {"min_aic": 2, "navg": 1}},
            {"peak_bag_period_spacing": {"maxiters": 10, "niters": 5, "dpi_only": false}}
        ],
        "backend": {"program": "taco-numeric", "args": ["--quiet"], "timeout_secs": 600}
    }"#;

    #[test]
    fn test_parse_full_document() {
        let settings = PipelineSettings::from_json(DOCUMENT).unwrap();

        assert_eq!(settings.blocks().len(), 11);
        assert_eq!(
            settings.backend(),
            Some(&BackendConfig {
                program: "taco-numeric".to_string(),
                args: vec!["--quiet".to_string()],
                timeout_secs: Some(600),
            })
        );
    }

    #[test]
    fn test_resolve_by_occurrence() {
        let settings = PipelineSettings::from_json(DOCUMENT).unwrap();

        let Some(StageOptions::PeakFind(second)) = settings.resolve("peak_find", 1) else {
            panic!("expected second peak_find block");
        };
        assert_eq!(second.maxlwd, Some(0.6));

        let Some(StageOptions::PeaksMle(third)) = settings.resolve("peaks_mle", 2) else {
            panic!("expected third peaks_mle block");
        };
        assert_eq!(third.maxlwd, None);

        assert!(settings.resolve("peaks_mle", 3).is_none());
        assert!(settings.resolve("filter", 0).is_some());
    }

    #[test]
    fn test_backend_is_optional() {
        let settings = PipelineSettings::from_json(r#"{"pipeline": []}"#).unwrap();
        assert!(settings.backend().is_none());
        assert!(settings.blocks().is_empty());
    }

    #[test]
    fn test_malformed_blocks() {
        let err = PipelineSettings::from_json(r#"{"pipeline": [{"filter": {}, "pds": {}}]}"#)
            .unwrap_err();
        assert!(matches!(err, SettingsError::MalformedBlock { index: 0, found: 2 }));

        let err = PipelineSettings::from_json(r#"{"pipeline": ["filter"]}"#).unwrap_err();
        assert!(matches!(err, SettingsError::MalformedBlock { index: 0, .. }));

        let err = PipelineSettings::from_json(r#"{"pipeline": [{"pds": {}}, {"fliter": {}}]}"#)
            .unwrap_err();
        assert!(matches!(err, SettingsError::UnknownKey { index: 1, .. }));

        let err =
            PipelineSettings::from_json(r#"{"pipeline": [{"pds": {"ofac": -1}}]}"#).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidOptions { index: 0, .. }));
    }

    #[test]
    fn test_not_json() {
        let err = PipelineSettings::from_json("pipeline:\n  - filter: {}\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));

        let err = PipelineSettings::from_json(r#"{"pipeline": [], "extra": 1}"#).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineSettings::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }
}
