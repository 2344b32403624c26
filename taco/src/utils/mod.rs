//! Utility functions for run identifiers, timestamps and provenance.

use chrono::Utc;
use std::path::Path;
use std::process::Command;
use uuid::Uuid;

/// Placeholder recorded when no revision can be determined.
pub const UNKNOWN_REVISION: &str = "N/A";

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// # Examples
///
/// ```
/// use taco::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Generates a new random (v4) UUID for a pipeline run.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}

/// Returns the short git revision of the repository containing `dir`.
///
/// Falls back to [`UNKNOWN_REVISION`] when git is unavailable or `dir` is not
/// inside a work tree.
#[must_use]
pub fn git_revision(dir: &Path) -> String {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .current_dir(dir)
        .output();

    match output {
        Ok(out) if out.status.success() => {
            let rev = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if rev.is_empty() {
                UNKNOWN_REVISION.to_string()
            } else {
                rev
            }
        }
        _ => {
            tracing::debug!(dir = %dir.display(), "No git revision hash found");
            UNKNOWN_REVISION.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_run_id_is_v4() {
        let id = generate_run_id();
        assert_eq!(id.get_version_num(), 4);
    }

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.contains(':'));
    }

    #[test]
    fn test_git_revision_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        let rev = git_revision(dir.path());
        assert_eq!(rev, UNKNOWN_REVISION);
    }
}
