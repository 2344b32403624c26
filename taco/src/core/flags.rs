//! Stage outcome flags and the five checkpointed flag slots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A quality/convergence signal emitted by a gated stage.
///
/// `0.0` means success and lets the pipeline continue. Any other value
/// (the reference collaborators emit `1.0`) means failure or insufficient
/// quality and short-circuits the remaining stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeFlag(f64);

impl OutcomeFlag {
    /// The success sentinel.
    pub const SUCCESS: Self = Self(0.0);
    /// The failure sentinel, also the value of a flag that was never reached.
    pub const FAILURE: Self = Self(1.0);

    /// Wraps a raw flag value.
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Returns true if the flag equals the success sentinel.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_success(self) -> bool {
        self.0 == 0.0
    }
}

impl Default for OutcomeFlag {
    fn default() -> Self {
        Self::FAILURE
    }
}

impl fmt::Display for OutcomeFlag {
    // Debug formatting keeps the fractional part: 0.0, 1.0, 0.5.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// The decision points recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSlot {
    /// Quality of the numax estimate.
    Numax,
    /// Quality of the resolved-peak maximum-likelihood fit.
    MleResolved,
    /// Quality of the l=0/2 mode identification.
    ModeId02,
    /// Quality of the mixed-mode maximum-likelihood fit.
    MleMixed,
    /// Quality of the final fit over all peaks.
    MleFinal,
}

impl FlagSlot {
    /// All slots in ledger column order.
    pub const ALL: [Self; 5] = [
        Self::Numax,
        Self::MleResolved,
        Self::ModeId02,
        Self::MleMixed,
        Self::MleFinal,
    ];

    /// The ledger column name for this slot.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Numax => "flag_numax",
            Self::MleResolved => "flag_mle_resolved",
            Self::ModeId02 => "flag_02",
            Self::MleMixed => "flag_mle_mixed",
            Self::MleFinal => "flag_mle_final",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Numax => 0,
            Self::MleResolved => 1,
            Self::ModeId02 => 2,
            Self::MleMixed => 3,
            Self::MleFinal => 4,
        }
    }
}

impl fmt::Display for FlagSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// The five outcome flags of one work item.
///
/// Every slot starts at [`OutcomeFlag::FAILURE`], so an item that
/// short-circuits early is recorded with all downstream flags still failed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OutcomeFlags([OutcomeFlag; 5]);

impl OutcomeFlags {
    /// Creates a flag set with every slot at the failure sentinel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a flag set from raw values in ledger column order.
    #[must_use]
    pub const fn from_values(values: [f64; 5]) -> Self {
        Self([
            OutcomeFlag::new(values[0]),
            OutcomeFlag::new(values[1]),
            OutcomeFlag::new(values[2]),
            OutcomeFlag::new(values[3]),
            OutcomeFlag::new(values[4]),
        ])
    }

    /// Returns the flag in a slot.
    #[must_use]
    pub const fn get(&self, slot: FlagSlot) -> OutcomeFlag {
        self.0[slot.index()]
    }

    /// Stores a flag in a slot.
    pub fn set(&mut self, slot: FlagSlot, flag: OutcomeFlag) {
        self.0[slot.index()] = flag;
    }

    /// Iterates slots and flags in ledger column order.
    pub fn iter(&self) -> impl Iterator<Item = (FlagSlot, OutcomeFlag)> + '_ {
        FlagSlot::ALL.iter().map(move |slot| (*slot, self.get(*slot)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_display_keeps_fraction() {
        assert_eq!(OutcomeFlag::SUCCESS.to_string(), "0.0");
        assert_eq!(OutcomeFlag::FAILURE.to_string(), "1.0");
        assert_eq!(OutcomeFlag::new(0.5).to_string(), "0.5");
        assert_eq!(OutcomeFlag::new(2.0).to_string(), "2.0");
    }

    #[test]
    fn test_flag_success() {
        assert!(OutcomeFlag::SUCCESS.is_success());
        assert!(OutcomeFlag::new(-0.0).is_success());
        assert!(!OutcomeFlag::FAILURE.is_success());
        assert!(!OutcomeFlag::new(f64::NAN).is_success());
    }

    #[test]
    fn test_flags_start_failed() {
        let flags = OutcomeFlags::new();
        assert!(flags.iter().all(|(_, flag)| flag == OutcomeFlag::FAILURE));
    }

    #[test]
    fn test_flags_set_get() {
        let mut flags = OutcomeFlags::new();
        flags.set(FlagSlot::ModeId02, OutcomeFlag::SUCCESS);

        assert_eq!(flags.get(FlagSlot::ModeId02), OutcomeFlag::SUCCESS);
        assert_eq!(flags.get(FlagSlot::Numax), OutcomeFlag::FAILURE);
    }

    #[test]
    fn test_slot_columns_in_order() {
        let columns: Vec<_> = FlagSlot::ALL.iter().map(|s| s.column()).collect();
        assert_eq!(
            columns,
            vec!["flag_numax", "flag_mle_resolved", "flag_02", "flag_mle_mixed", "flag_mle_final"]
        );
    }
}
