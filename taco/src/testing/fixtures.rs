//! Test fixtures: scratch workspaces, raw files and settings documents.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::ledger::DEFAULT_LEDGER_FILE;
use crate::settings::DEFAULT_SETTINGS_FILE;

/// A settings document with one block per reference stage, in order.
pub const REFERENCE_SETTINGS: &str = r#"{
    "pipeline": [
        {"filter": {"width": 40.0, "remove_gaps": -1}},
        {"pds": {"ofac": 1}},
        {"oversampled_pds": {"ofac": 10}},
        {"numax_estimate": {"filter_width": 0.2}},
        {"background_fit": {"bins": 300}},
        {"peak_find": {"snr": 1.1, "prob": 0.0001, "min_aic": 2.0}},
        {"peaks_mle": {"min_aic": 2.0}},
        {"peak_find": {"min_aic": 8.0, "navg": 1, "maxlwd": 0.6}},
        {"peaks_mle": {"min_aic": 2.0, "maxlwd": 0.5}},
        {"peaks_mle": {"min_aic": 2.0}},
        {"peak_bag_period_spacing": {"maxiters": 10, "niters": 5}}
    ]
}"#;

/// Renders a raw light curve with a catalog header and `rows` samples.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn raw_series_text(catalog_id: &str, rows: usize) -> String {
    let mut text = format!("# KIC {catalog_id}\n# time flux\n");
    for i in 0..rows {
        let t = i as f64 * 0.02;
        let _ = writeln!(text, "{t} {}", (t * 3.0).sin());
    }
    text
}

/// A scratch directory laid out like a pipeline working directory:
/// `input/`, `output/`, a ledger path and a settings file path.
#[derive(Debug)]
pub struct TestWorkspace {
    root: TempDir,
}

impl TestWorkspace {
    /// Creates an empty workspace with `input/` and `output/` directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let root = tempfile::tempdir()?;
        std::fs::create_dir(root.path().join("input"))?;
        std::fs::create_dir(root.path().join("output"))?;
        Ok(Self { root })
    }

    /// Returns the workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Returns the input directory.
    #[must_use]
    pub fn input_dir(&self) -> PathBuf {
        self.root.path().join("input")
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("output")
    }

    /// Returns the ledger path.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.root.path().join(DEFAULT_LEDGER_FILE)
    }

    /// Returns the settings path.
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.root.path().join(DEFAULT_SETTINGS_FILE)
    }

    /// Returns the directory of item `id` below the output directory.
    #[must_use]
    pub fn item_dir(&self, id: &str) -> PathBuf {
        self.output_dir().join(id)
    }

    /// Writes `input/<id>.dat` with a generated light curve.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn add_star(&self, id: &str, catalog_id: &str) -> std::io::Result<PathBuf> {
        self.add_raw(id, &raw_series_text(catalog_id, 32))
    }

    /// Writes `input/<id>.dat` with the given contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn add_raw(&self, id: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.input_dir().join(format!("{id}.dat"));
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Writes the settings file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_settings(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.settings_path();
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Returns the ledger contents, or an empty string if it does not exist.
    #[must_use]
    pub fn ledger_text(&self) -> String {
        std::fs::read_to_string(self.ledger_path()).unwrap_or_default()
    }

    /// Returns the sorted file names in the directory of item `id`.
    #[must_use]
    pub fn artifacts(&self, id: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.item_dir(id))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::parse_raw;
    use crate::settings::PipelineSettings;

    #[test]
    fn test_raw_series_parses() {
        let text = raw_series_text("1234567", 8);
        let raw = parse_raw(Path::new("KIC001.dat"), &text).unwrap();

        assert_eq!(raw.table.len(), 8);
        assert_eq!(raw.catalog_id.as_deref(), Some("1234567"));
    }

    #[test]
    fn test_reference_settings_parse() {
        let settings = PipelineSettings::from_json(REFERENCE_SETTINGS).unwrap();
        assert_eq!(settings.blocks().len(), 11);
    }

    #[test]
    fn test_workspace_layout() {
        let ws = TestWorkspace::new().unwrap();
        ws.add_star("KIC001", "1234567").unwrap();

        assert!(ws.input_dir().join("KIC001.dat").is_file());
        assert!(ws.output_dir().is_dir());
        assert!(ws.artifacts("KIC001").is_empty());
        assert_eq!(ws.ledger_text(), "");
    }
}
