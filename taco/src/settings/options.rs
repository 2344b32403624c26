//! Typed option records, one per settings key.
//!
//! Every record fills missing fields from its defaults and rejects fields it
//! does not know, so a typo in the settings document fails at load time
//! rather than silently falling back to a default.

use serde::{Deserialize, Serialize};

/// Options for light-curve filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterOptions {
    /// Width of the high-pass filter in days.
    pub width: f64,
    /// Gaps longer than this many days are removed; negative disables.
    pub remove_gaps: f64,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            width: 40.0,
            remove_gaps: -1.0,
        }
    }
}

/// Options for power density spectrum computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PdsOptions {
    /// Oversampling factor.
    pub ofac: u32,
}

impl Default for PdsOptions {
    fn default() -> Self {
        Self { ofac: 1 }
    }
}

/// Options for the numax estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NumaxEstimateOptions {
    /// Width of the log-frequency smoothing filter.
    pub filter_width: f64,
}

impl Default for NumaxEstimateOptions {
    fn default() -> Self {
        Self { filter_width: 0.2 }
    }
}

/// Options for the background fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundFitOptions {
    /// Number of log-spaced bins the spectrum is averaged into.
    pub bins: u32,
    /// Upper bound on sampler steps.
    pub maxsteps: u32,
    /// Steps taken before convergence is checked.
    pub minsteps: u32,
    /// Number of walkers in the ensemble sampler.
    pub nwalkers: u32,
    /// Worker threads for the sampler.
    pub nthreads: u32,
    /// Sampler seed; random when absent.
    pub seed: Option<u64>,
}

impl Default for BackgroundFitOptions {
    fn default() -> Self {
        Self {
            bins: 300,
            maxsteps: 5000,
            minsteps: 2000,
            nwalkers: 50,
            nthreads: 1,
            seed: None,
        }
    }
}

/// Options for peak finding, used by both peak-finding stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeakFindOptions {
    /// Minimum signal-to-noise ratio of a candidate peak.
    pub snr: f64,
    /// False-alarm probability threshold.
    pub prob: f64,
    /// Minimum AIC improvement for a peak to be kept.
    pub min_aic: f64,
    /// Number of averaged spectra.
    pub navg: u32,
    /// Maximum linewidth, unbounded when absent.
    pub maxlwd: Option<f64>,
}

impl Default for PeakFindOptions {
    fn default() -> Self {
        Self {
            snr: 1.1,
            prob: 0.0001,
            min_aic: 2.0,
            navg: 1,
            maxlwd: None,
        }
    }
}

/// Options for maximum likelihood peak fitting, used by all three fits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeaksMleOptions {
    /// Minimum AIC improvement for a fitted peak to be kept.
    pub min_aic: f64,
    /// Number of averaged spectra.
    pub navg: u32,
    /// Maximum linewidth, unbounded when absent.
    pub maxlwd: Option<f64>,
}

impl Default for PeaksMleOptions {
    fn default() -> Self {
        Self {
            min_aic: 2.0,
            navg: 1,
            maxlwd: None,
        }
    }
}

/// Options for the period spacing analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeriodSpacingOptions {
    /// Maximum outer iterations of the fit.
    pub maxiters: u32,
    /// Restarts per iteration.
    pub niters: u32,
    /// Only fit the period spacing, keeping coupling fixed.
    pub dpi_only: bool,
    /// Worker processes for the fit.
    pub ncores: u32,
}

impl Default for PeriodSpacingOptions {
    fn default() -> Self {
        Self {
            maxiters: 10,
            niters: 5,
            dpi_only: true,
            ncores: 1,
        }
    }
}

/// The option record handed to one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageOptions {
    /// The stage takes no options.
    None,
    /// Light-curve filter options.
    Filter(FilterOptions),
    /// Power density spectrum options, shared by both spectra.
    Pds(PdsOptions),
    /// Numax estimate options.
    NumaxEstimate(NumaxEstimateOptions),
    /// Background fit options.
    BackgroundFit(BackgroundFitOptions),
    /// Peak finding options.
    PeakFind(PeakFindOptions),
    /// Peak fitting options.
    PeaksMle(PeaksMleOptions),
    /// Period spacing options.
    PeriodSpacing(PeriodSpacingOptions),
}

impl StageOptions {
    /// Settings keys that have an option record.
    pub const KEYS: [&'static str; 8] = [
        "filter",
        "pds",
        "oversampled_pds",
        "numax_estimate",
        "background_fit",
        "peak_find",
        "peaks_mle",
        "peak_bag_period_spacing",
    ];

    /// Deserializes the record for settings key `key`.
    ///
    /// Returns `None` for an unknown key. A JSON `null` body means "all
    /// defaults".
    pub(crate) fn from_block(
        key: &str,
        body: serde_json::Value,
    ) -> Option<Result<Self, serde_json::Error>> {
        let body = if body.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            body
        };

        let parsed = match key {
            "filter" => serde_json::from_value(body).map(Self::Filter),
            "pds" | "oversampled_pds" => serde_json::from_value(body).map(Self::Pds),
            "numax_estimate" => serde_json::from_value(body).map(Self::NumaxEstimate),
            "background_fit" => serde_json::from_value(body).map(Self::BackgroundFit),
            "peak_find" => serde_json::from_value(body).map(Self::PeakFind),
            "peaks_mle" => serde_json::from_value(body).map(Self::PeaksMle),
            "peak_bag_period_spacing" => serde_json::from_value(body).map(Self::PeriodSpacing),
            _ => return None,
        };
        Some(parsed)
    }

    /// Returns a short name of the record type, for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Filter(_) => "filter",
            Self::Pds(_) => "pds",
            Self::NumaxEstimate(_) => "numax_estimate",
            Self::BackgroundFit(_) => "background_fit",
            Self::PeakFind(_) => "peak_find",
            Self::PeaksMle(_) => "peaks_mle",
            Self::PeriodSpacing(_) => "peak_bag_period_spacing",
        }
    }
}
