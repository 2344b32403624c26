//! Error types for the TACO pipeline.
//!
//! The taxonomy separates errors that must abort the whole run (configuration,
//! registry, ledger and artifact I/O) from errors that only abort the work
//! item currently being processed (malformed raw input, collaborator failures).
//! Numeric quality failures are not errors at all: they travel as outcome
//! flags and end in a recorded short-circuit.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum TacoError {
    /// The settings document could not be loaded or bound to the registry.
    #[error("{0}")]
    Config(#[from] SettingsError),

    /// The stage registry is inconsistent.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// The ledger could not be read or appended.
    #[error("{0}")]
    Ledger(#[from] LedgerError),

    /// An artifact could not be written.
    #[error("Failed to write artifact {}: {source}", path.display())]
    Artifact {
        /// The artifact path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The input directory could not be scanned.
    #[error("Failed to scan input directory {}: {source}", path.display())]
    Discovery {
        /// The input directory.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A raw time-series file could not be parsed.
    #[error("{0}")]
    RawInput(#[from] RawInputError),

    /// The numeric collaborator failed.
    #[error("{0}")]
    Backend(#[from] BackendError),

    /// A stage could not run against the current item state.
    #[error("Stage '{stage}' failed: {message}")]
    Stage {
        /// The stage name.
        stage: String,
        /// What went wrong.
        message: String,
    },
}

impl TacoError {
    /// Creates a stage error.
    #[must_use]
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error must abort the whole run.
    ///
    /// Item-level errors leave no ledger row for the item, so the item is
    /// retried from raw input on the next run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Registry(_)
                | Self::Ledger(_)
                | Self::Artifact { .. }
                | Self::Discovery { .. }
        )
    }
}

/// Metadata about a registry contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "REGISTRY-MISSING_INPUT").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when the stage registry fails validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RegistryError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl RegistryError {
    /// Creates a new registry error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Errors raised while reading or appending the ledger.
///
/// Every variant is fatal: the ledger decides which items are skipped, so a
/// ledger that cannot be trusted must stop the run.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger file could not be read or written.
    #[error("Ledger I/O error on {}: {source}", path.display())]
    Io {
        /// The ledger path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The ledger exists but has no header line.
    #[error("Ledger {} has no header row", path.display())]
    MissingHeader {
        /// The ledger path.
        path: PathBuf,
    },

    /// The header does not match the expected columns.
    #[error("Ledger {} has header '{found}', expected '{expected}'", path.display())]
    HeaderMismatch {
        /// The ledger path.
        path: PathBuf,
        /// The header found on disk.
        found: String,
        /// The expected header.
        expected: String,
    },

    /// A data row could not be parsed.
    #[error("Ledger {} line {line}: {reason}", path.display())]
    MalformedRow {
        /// The ledger path.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// What is wrong with the row.
        reason: String,
    },

    /// An id appears more than once.
    #[error("Ledger already contains a row for '{id}'")]
    DuplicateId {
        /// The duplicated id.
        id: String,
    },

    /// An id that could not be read back from the ledger.
    #[error("Item id {id:?} cannot be stored in the ledger")]
    InvalidId {
        /// The rejected id.
        id: String,
    },
}

/// Errors raised while loading settings or binding them to stages.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("Failed to read settings file {}: {source}", path.display())]
    Read {
        /// The settings path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings document is not valid JSON of the expected shape.
    #[error("Failed to parse settings: {source}")]
    Parse {
        /// The parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A pipeline block is not a single-key object.
    #[error("Pipeline block {index} must contain exactly one stage key, found {found}")]
    MalformedBlock {
        /// Zero-based block index.
        index: usize,
        /// Number of keys found.
        found: usize,
    },

    /// A pipeline block names a stage no option record exists for.
    #[error("Pipeline block {index} has unknown stage key '{key}'")]
    UnknownKey {
        /// Zero-based block index.
        index: usize,
        /// The unknown key.
        key: String,
    },

    /// A pipeline block has fields that do not fit its option record.
    #[error("Invalid options for '{key}' (block {index}): {source}")]
    InvalidOptions {
        /// The stage key.
        key: String,
        /// Zero-based block index.
        index: usize,
        /// The deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// A stage declares a settings key with no matching block.
    #[error("Stage '{stage}' needs settings block '{key}' (occurrence {occurrence}), none found")]
    MissingBlock {
        /// The stage name.
        stage: String,
        /// The settings key.
        key: String,
        /// One-based occurrence of the key among stages.
        occurrence: usize,
    },

    /// The input directory does not exist.
    #[error("Input directory {} does not exist", path.display())]
    MissingInputDirectory {
        /// The input directory.
        path: PathBuf,
    },
}

/// Errors raised while reading a raw time-series file.
#[derive(Debug, Error)]
pub enum RawInputError {
    /// The file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// The raw file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file has no data rows.
    #[error("{} contains no data rows", path.display())]
    Empty {
        /// The raw file path.
        path: PathBuf,
    },

    /// A data row could not be parsed.
    #[error("{} line {line}: {reason}", path.display())]
    Malformed {
        /// The raw file path.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// What is wrong with the row.
        reason: String,
    },
}

/// Errors raised by a numeric collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The collaborator program could not be started.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        /// The program.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The collaborator exited unsuccessfully.
    #[error("Operation '{operation}' exited with {status}: {stderr}")]
    Exit {
        /// The operation.
        operation: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The collaborator did not finish in time.
    #[error("Operation '{operation}' timed out after {seconds}s")]
    Timeout {
        /// The operation.
        operation: String,
        /// The timeout in seconds.
        seconds: u64,
    },

    /// The collaborator response violated the exchange protocol.
    #[error("Operation '{operation}' protocol error: {reason}")]
    Protocol {
        /// The operation.
        operation: String,
        /// What is wrong with the exchange.
        reason: String,
    },

    /// An exchange file could not be read or written.
    #[error("Operation '{operation}' I/O error: {source}")]
    Io {
        /// The operation.
        operation: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The collaborator reported a failure it could not express as a flag.
    #[error("Operation '{operation}' failed: {reason}")]
    Failed {
        /// The operation.
        operation: String,
        /// The reason for failure.
        reason: String,
    },
}

impl BackendError {
    /// Creates a protocol error.
    #[must_use]
    pub fn protocol(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Protocol {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Creates a failure error.
    #[must_use]
    pub fn failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "filter");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"filter".to_string()));
    }

    #[test]
    fn test_registry_error_code() {
        let err = RegistryError::new("bad")
            .with_error_info(ContractErrorInfo::new("REGISTRY-EMPTY", "empty"));
        assert_eq!(err.code(), Some("REGISTRY-EMPTY"));
        assert_eq!(RegistryError::new("bad").code(), None);
    }

    #[test]
    fn test_fatal_classification() {
        let ledger = TacoError::from(LedgerError::DuplicateId { id: "KIC001".into() });
        assert!(ledger.is_fatal());

        let artifact = TacoError::Artifact {
            path: PathBuf::from("out/KIC001/pds.csv"),
            source: std::io::Error::other("disk full"),
        };
        assert!(artifact.is_fatal());

        let raw = TacoError::from(RawInputError::Empty { path: PathBuf::from("KIC001.dat") });
        assert!(!raw.is_fatal());

        let backend = TacoError::from(BackendError::failed("peaks_mle", "diverged"));
        assert!(!backend.is_fatal());

        assert!(!TacoError::stage("filter", "missing input").is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = TacoError::stage("peak_find", "missing input 'pds_bgr'");
        assert_eq!(err.to_string(), "Stage 'peak_find' failed: missing input 'pds_bgr'");

        let err = BackendError::Timeout { operation: "background_fit".into(), seconds: 30 };
        assert!(err.to_string().contains("timed out after 30s"));
    }
}
