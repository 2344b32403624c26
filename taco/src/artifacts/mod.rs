//! Per-item artifact directories.
//!
//! Every work item owns `<output_root>/<id>/`. Tabular artifacts are written
//! there under their stable names after each stage, together with the running
//! attribute table `data.csv`. Writes go through a temporary sibling that is
//! synced and then renamed over the target, so a reader never sees a
//! half-written file.

use crate::core::{ArtifactName, Attributes, Table, ATTRIBUTES_FILE};
use crate::errors::TacoError;
use crate::input::is_item_id;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes per-item artifacts below an output root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `root`. Nothing is created until an item
    /// directory is requested.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory of item `id` without creating it.
    #[must_use]
    pub fn item_directory(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Returns the path an artifact of item `id` is written to.
    ///
    /// The raw series is never persisted and has no path.
    #[must_use]
    pub fn artifact_path(&self, id: &str, name: ArtifactName) -> Option<PathBuf> {
        name.file_name().map(|file| self.item_directory(id).join(file))
    }

    /// Creates the directory of item `id` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`TacoError::Artifact`] if `id` is not a single path component
    /// or the directory cannot be created.
    pub fn ensure_item_directory(&self, id: &str) -> Result<PathBuf, TacoError> {
        let dir = self.item_directory(id);
        if !is_item_id(id) {
            return Err(TacoError::Artifact {
                path: dir,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("item id {id:?} does not name a directory below the output root"),
                ),
            });
        }
        std::fs::create_dir_all(&dir).map_err(|source| TacoError::Artifact {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Writes a tabular artifact, replacing any previous version.
    ///
    /// Writing [`ArtifactName::Raw`] is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TacoError::Artifact`] if the file cannot be written.
    pub fn write_table(
        &self,
        id: &str,
        name: ArtifactName,
        table: &Table,
    ) -> Result<(), TacoError> {
        let Some(path) = self.artifact_path(id, name) else {
            return Ok(());
        };
        self.ensure_item_directory(id)?;
        write_atomic(&path, table.to_csv().as_bytes())?;
        tracing::debug!(item = id, artifact = %name, rows = table.len(), "Wrote artifact");
        Ok(())
    }

    /// Writes the running attribute table `data.csv`.
    ///
    /// # Errors
    ///
    /// Returns [`TacoError::Artifact`] if the file cannot be written.
    pub fn write_attributes(&self, id: &str, attributes: &Attributes) -> Result<(), TacoError> {
        let dir = self.ensure_item_directory(id)?;
        write_atomic(&dir.join(ATTRIBUTES_FILE), attributes.to_csv().as_bytes())
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), TacoError> {
    let artifact_err = |source| TacoError::Artifact {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(artifact_err)?;
    tmp.write_all(contents).map_err(artifact_err)?;
    tmp.as_file().sync_all().map_err(artifact_err)?;
    tmp.persist(path).map_err(|e| artifact_err(e.error))?;
    Ok(())
}
