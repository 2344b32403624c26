//! The evolving state of one work item.

use crate::core::{ArtifactName, Attributes, FlagSlot, OutcomeFlag, OutcomeFlags, Table};
use crate::input::{RawSeries, WorkItem};
use std::collections::HashMap;

/// Attribute holding the catalog identifier.
pub const CATALOG_ATTRIBUTE: &str = "KIC";
/// Attribute holding the input name.
pub const RAW_DATA_ATTRIBUTE: &str = "raw_data";
/// Attribute holding the code revision.
pub const REVISION_ATTRIBUTE: &str = "git-rev-hash";
/// Attribute holding the Nyquist frequency.
pub const NYQUIST_ATTRIBUTE: &str = "nuNyq";

/// Everything known about one work item while it is being processed.
///
/// Owned by the runner for the duration of one item and never shared.
/// All five flags start at the failure sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemState {
    id: String,
    attributes: Attributes,
    tables: HashMap<ArtifactName, Table>,
    flags: OutcomeFlags,
}

impl ItemState {
    /// Creates a state holding only the raw series.
    #[must_use]
    pub fn new(id: impl Into<String>, raw: Table) -> Self {
        let mut tables = HashMap::new();
        tables.insert(ArtifactName::Raw, raw);
        Self {
            id: id.into(),
            attributes: Attributes::new(),
            tables,
            flags: OutcomeFlags::new(),
        }
    }

    /// Creates a state from a parsed raw file, seeding the provenance
    /// attributes.
    #[must_use]
    pub fn from_raw(item: &WorkItem, raw: RawSeries, revision: &str) -> Self {
        let mut state = Self::new(item.id.clone(), raw.table);
        let catalog = raw.catalog_id.unwrap_or_default();
        state.attributes.set(CATALOG_ATTRIBUTE, serde_json::json!(catalog));
        state.attributes.set(RAW_DATA_ATTRIBUTE, serde_json::json!(item.id));
        state.attributes.set(REVISION_ATTRIBUTE, serde_json::json!(revision));
        state
    }

    /// Returns the item id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the attributes.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns the attributes for modification.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Returns a table, if it has been produced.
    #[must_use]
    pub fn table(&self, name: ArtifactName) -> Option<&Table> {
        self.tables.get(&name)
    }

    /// Returns true if a table has been produced.
    #[must_use]
    pub fn has_table(&self, name: ArtifactName) -> bool {
        self.tables.contains_key(&name)
    }

    /// Returns the row count of a table, zero if absent.
    #[must_use]
    pub fn row_count(&self, name: ArtifactName) -> usize {
        self.tables.get(&name).map_or(0, Table::len)
    }

    /// Stores a table, replacing any earlier version.
    pub fn insert_table(&mut self, name: ArtifactName, table: Table) {
        self.tables.insert(name, table);
    }

    /// Returns the flags.
    #[must_use]
    pub fn flags(&self) -> &OutcomeFlags {
        &self.flags
    }

    /// Sets one flag.
    pub fn set_flag(&mut self, slot: FlagSlot, flag: OutcomeFlag) {
        self.flags.set(slot, flag);
    }
}
