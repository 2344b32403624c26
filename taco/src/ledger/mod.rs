//! Durable ledger of processed work items.
//!
//! The ledger is a comma-separated file with one row per work item that
//! reached a terminal state. It is the single source of truth for "done":
//! it is loaded once per run, consulted before each item, and appended to
//! exactly once per newly processed item. Existing rows are never rewritten.

use crate::core::table::{escape_field, split_record};
use crate::core::{FlagSlot, OutcomeFlags};
use crate::errors::LedgerError;
use crate::input::is_item_id;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default ledger file name, relative to the working directory.
pub const DEFAULT_LEDGER_FILE: &str = "stars.csv";

/// Name of the identifier column.
pub const ID_COLUMN: &str = "ID";

/// Returns the ledger header columns.
#[must_use]
pub fn header_columns() -> Vec<&'static str> {
    std::iter::once(ID_COLUMN)
        .chain(FlagSlot::ALL.iter().map(|slot| slot.column()))
        .collect()
}

/// One ledger row: an item id and its terminal flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// The work item id.
    pub id: String,
    /// The five outcome flags.
    pub flags: OutcomeFlags,
}

impl LedgerRow {
    /// Creates a ledger row.
    #[must_use]
    pub fn new(id: impl Into<String>, flags: OutcomeFlags) -> Self {
        Self { id: id.into(), flags }
    }

    /// Renders the row as one line, including the trailing newline.
    #[must_use]
    pub fn to_line(&self) -> String {
        let mut fields = vec![escape_field(&self.id)];
        fields.extend(self.flags.iter().map(|(_, flag)| flag.to_string()));
        format!("{}\n", fields.join(","))
    }

    fn parse(path: &Path, line_no: usize, line: &str) -> Result<Self, LedgerError> {
        let malformed = |reason: String| LedgerError::MalformedRow {
            path: path.to_path_buf(),
            line: line_no,
            reason,
        };

        let fields = split_record(line);
        let expected = FlagSlot::ALL.len() + 1;
        if fields.len() != expected {
            return Err(malformed(format!("expected {expected} fields, found {}", fields.len())));
        }

        let id = fields[0].trim().to_string();
        if id.is_empty() {
            return Err(malformed("empty ID".to_string()));
        }

        let mut values = [0.0; 5];
        for (value, field) in values.iter_mut().zip(&fields[1..]) {
            *value = field
                .trim()
                .parse::<f64>()
                .map_err(|_| malformed(format!("flag '{field}' is not a number")))?;
        }

        Ok(Self::new(id, OutcomeFlags::from_values(values)))
    }
}

/// The file-backed ledger, fully loaded into memory.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    rows: Vec<LedgerRow>,
    done: HashSet<String>,
    needs_newline: bool,
}

impl Ledger {
    /// Opens the ledger at `path`, creating it header-only if absent, and
    /// loads every row.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or read, or if it is
    /// corrupt (wrong header, malformed row, duplicate id).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if Self::initialize_if_absent(&path)? {
            tracing::info!(path = %path.display(), "Created ledger");
        } else {
            tracing::info!(path = %path.display(), "Ledger exists");
        }

        let text = std::fs::read_to_string(&path).map_err(|source| LedgerError::Io {
            path: path.clone(),
            source,
        })?;

        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        let (_, header) = lines.next().ok_or_else(|| LedgerError::MissingHeader {
            path: path.clone(),
        })?;

        let found: Vec<String> = split_record(header)
            .iter()
            .map(|f| f.trim().to_string())
            .collect();
        let expected = header_columns();
        if found != expected {
            return Err(LedgerError::HeaderMismatch {
                path,
                found: found.join(","),
                expected: expected.join(","),
            });
        }

        let mut rows = Vec::new();
        let mut done = HashSet::new();
        for (index, line) in lines {
            let row = LedgerRow::parse(&path, index + 1, line)?;
            if !done.insert(row.id.clone()) {
                return Err(LedgerError::DuplicateId { id: row.id });
            }
            rows.push(row);
        }

        tracing::debug!(path = %path.display(), rows = rows.len(), "Loaded ledger");

        Ok(Self {
            needs_newline: !text.is_empty() && !text.ends_with('\n'),
            path,
            rows,
            done,
        })
    }

    /// Creates the ledger with its header row if it does not exist.
    ///
    /// Returns true if the file was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn initialize_if_absent(path: &Path) -> Result<bool, LedgerError> {
        let io_err = |source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(io_err(e)),
        };

        let header = format!("{}\n", header_columns().join(","));
        file.write_all(header.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        Ok(true)
    }

    /// Returns true if `id` already has a row.
    #[must_use]
    pub fn is_done(&self, id: &str) -> bool {
        self.done.contains(id)
    }

    /// Appends one row and makes it durable before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the id already has a row, cannot be stored as a
    /// single ledger line (see [`is_item_id`]), or the write fails.
    pub fn append(&mut self, row: LedgerRow) -> Result<(), LedgerError> {
        if !is_item_id(&row.id) {
            return Err(LedgerError::InvalidId { id: row.id });
        }
        if self.done.contains(&row.id) {
            return Err(LedgerError::DuplicateId { id: row.id });
        }

        let io_err = |source| LedgerError::Io {
            path: self.path.clone(),
            source,
        };

        let mut line = String::new();
        if self.needs_newline {
            line.push('\n');
        }
        line.push_str(&row.to_line());

        let mut file = OpenOptions::new().append(true).open(&self.path).map_err(io_err)?;
        // One write per row so a reader never sees a partial line.
        file.write_all(line.as_bytes()).map_err(io_err)?;
        file.sync_data().map_err(io_err)?;

        self.needs_newline = false;
        self.done.insert(row.id.clone());
        self.rows.push(row);
        Ok(())
    }

    /// Returns the ledger path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns every row, in file order.
    #[must_use]
    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    /// Returns the row for `id`, if any.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&LedgerRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the ledger has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutcomeFlag;
    use pretty_assertions::assert_eq;
    use std::fs;

    const HEADER: &str = "ID,flag_numax,flag_mle_resolved,flag_02,flag_mle_mixed,flag_mle_final\n";

    #[test]
    fn test_open_creates_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stars.csv");

        let ledger = Ledger::open(&path).unwrap();

        assert!(ledger.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), HEADER);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stars.csv");

        assert!(Ledger::initialize_if_absent(&path).unwrap());
        fs::write(&path, format!("{HEADER}KIC001,0.0,0.0,0.0,0.0,0.0\n")).unwrap();
        assert!(!Ledger::initialize_if_absent(&path).unwrap());

        assert!(fs::read_to_string(&path).unwrap().contains("KIC001"));
    }

    #[test]
    fn test_append_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stars.csv");

        let mut ledger = Ledger::open(&path).unwrap();
        ledger
            .append(LedgerRow::new("KIC001", OutcomeFlags::from_values([0.0; 5])))
            .unwrap();
        ledger.append(LedgerRow::new("KIC002", OutcomeFlags::new())).unwrap();
        assert!(ledger.is_done("KIC001"));

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            format!("{HEADER}KIC001,0.0,0.0,0.0,0.0,0.0\nKIC002,1.0,1.0,1.0,1.0,1.0\n")
        );

        let reloaded = Ledger::open(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.is_done("KIC002"));
        assert!(!reloaded.is_done("KIC003"));
        assert_eq!(
            reloaded.get("KIC002").unwrap().flags.get(FlagSlot::Numax),
            OutcomeFlag::FAILURE
        );
    }

    #[test]
    fn test_append_rejects_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(dir.path().join("stars.csv")).unwrap();
        ledger.append(LedgerRow::new("KIC001", OutcomeFlags::new())).unwrap();

        let err = ledger.append(LedgerRow::new("KIC001", OutcomeFlags::new())).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateId { .. }));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_integer_flags_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stars.csv");
        fs::write(&path, format!("{HEADER}KIC001,1,1,1,1,1\n")).unwrap();

        let ledger = Ledger::open(&path).unwrap();
        assert!(ledger.is_done("KIC001"));
    }

    #[test]
    fn test_missing_trailing_newline_is_repaired_on_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stars.csv");
        fs::write(&path, format!("{HEADER}KIC001,0.0,0.0,0.0,0.0,0.0")).unwrap();

        let mut ledger = Ledger::open(&path).unwrap();
        ledger.append(LedgerRow::new("KIC002", OutcomeFlags::new())).unwrap();

        let reloaded = Ledger::open(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_corrupt_ledgers_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stars.csv");

        fs::write(&path, "").unwrap();
        assert!(matches!(Ledger::open(&path), Err(LedgerError::MissingHeader { .. })));

        fs::write(&path, "ID,flag\n").unwrap();
        assert!(matches!(Ledger::open(&path), Err(LedgerError::HeaderMismatch { .. })));

        fs::write(&path, format!("{HEADER}KIC001,0.0,0.0\n")).unwrap();
        assert!(matches!(Ledger::open(&path), Err(LedgerError::MalformedRow { line: 2, .. })));

        fs::write(&path, format!("{HEADER}KIC001,0.0,x,0.0,0.0,0.0\n")).unwrap();
        assert!(matches!(Ledger::open(&path), Err(LedgerError::MalformedRow { .. })));

        fs::write(&path, format!("{HEADER}KIC001,1,1,1,1,1\nKIC001,1,1,1,1,1\n")).unwrap();
        assert!(matches!(Ledger::open(&path), Err(LedgerError::DuplicateId { .. })));
    }

    #[test]
    fn test_quoted_id_round_trip() {
        let row = LedgerRow::new("odd,name", OutcomeFlags::new());
        assert_eq!(row.to_line(), "\"odd,name\",1.0,1.0,1.0,1.0,1.0\n");

        let parsed = LedgerRow::parse(Path::new("stars.csv"), 2, row.to_line().trim_end()).unwrap();
        assert_eq!(parsed, row);
    }

    #[test]
    fn test_append_rejects_ids_that_break_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stars.csv");

        let mut ledger = Ledger::open(&path).unwrap();
        for id in ["KIC\n001", "KIC\r001", ""] {
            let err = ledger.append(LedgerRow::new(id, OutcomeFlags::new())).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidId { .. }), "{id:?}: {err}");
        }
        assert!(ledger.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), HEADER);

        ledger.append(LedgerRow::new("KIC001", OutcomeFlags::new())).unwrap();
        assert_eq!(Ledger::open(&path).unwrap().len(), 1);
    }
}
