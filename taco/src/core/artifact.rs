//! Stable logical names for per-item tabular artifacts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tabular artifact held in item state and, except for the raw series,
/// persisted under a fixed file name in the item directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactName {
    /// The raw time series as read from the input file.
    Raw,
    /// The filtered time series.
    Filtered,
    /// The power density spectrum.
    Pds,
    /// The oversampled power density spectrum.
    OversampledPds,
    /// The background-subtracted power density spectrum.
    PdsBgr,
    /// The background-subtracted oversampled power density spectrum.
    OversampledPdsBgr,
    /// Peaks found in the background-subtracted spectrum.
    Peaks,
    /// Resolved peaks after maximum-likelihood fitting.
    PeaksMle,
    /// Mixed-mode peaks.
    MixedPeaks,
}

impl ArtifactName {
    /// Every artifact, in pipeline order.
    pub const ALL: [Self; 9] = [
        Self::Raw,
        Self::Filtered,
        Self::Pds,
        Self::OversampledPds,
        Self::PdsBgr,
        Self::OversampledPdsBgr,
        Self::Peaks,
        Self::PeaksMle,
        Self::MixedPeaks,
    ];

    /// The logical key used in logs and in the collaborator protocol.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Filtered => "filtered",
            Self::Pds => "pds",
            Self::OversampledPds => "ofac_pds",
            Self::PdsBgr => "pds_bgr",
            Self::OversampledPdsBgr => "ofac_pds_bgr",
            Self::Peaks => "peaks",
            Self::PeaksMle => "peaks_mle",
            Self::MixedPeaks => "mixed_peaks",
        }
    }

    /// The file name inside the item directory, `None` for in-memory only.
    #[must_use]
    pub const fn file_name(self) -> Option<&'static str> {
        match self {
            Self::Raw => None,
            Self::Filtered => Some("filtered.csv"),
            Self::Pds => Some("pds.csv"),
            Self::OversampledPds => Some("ofac_pds.csv"),
            Self::PdsBgr => Some("pds_bgr.csv"),
            Self::OversampledPdsBgr => Some("ofac_pds_bgr.csv"),
            Self::Peaks => Some("peaks.csv"),
            Self::PeaksMle => Some("peaks_mle.csv"),
            Self::MixedPeaks => Some("mixed_peaks.csv"),
        }
    }

    /// Looks up an artifact by its logical key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.key() == key)
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// File name of the running scalar-attribute table.
pub const ATTRIBUTES_FILE: &str = "data.csv";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_is_not_persisted() {
        assert_eq!(ArtifactName::Raw.file_name(), None);
        assert_eq!(ArtifactName::PdsBgr.file_name(), Some("pds_bgr.csv"));
    }

    #[test]
    fn test_key_lookup() {
        for name in ArtifactName::ALL {
            assert_eq!(ArtifactName::from_key(name.key()), Some(name));
        }
        assert_eq!(ArtifactName::from_key("nope"), None);
    }

    #[test]
    fn test_file_names_unique() {
        let mut names: Vec<_> = ArtifactName::ALL.iter().filter_map(|n| n.file_name()).collect();
        names.push(ATTRIBUTES_FILE);
        let count = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), count);
    }
}
