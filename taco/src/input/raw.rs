//! Reader for whitespace-delimited raw light curves.

use crate::core::Table;
use crate::errors::RawInputError;
use std::path::Path;

/// Token marking the catalog-identifier metadata line.
pub const CATALOG_TOKEN: &str = "KIC";

const COMMENT: char = '#';

/// A parsed raw input file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    /// The numeric rows, columns named `time`, `flux`, `column_2`, ...
    pub table: Table,
    /// The catalog identifier, if a metadata line carried one.
    pub catalog_id: Option<String>,
}

/// Reads and parses a raw time-series file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is malformed.
pub fn read_raw(path: &Path) -> Result<RawSeries, RawInputError> {
    let text = std::fs::read_to_string(path).map_err(|source| RawInputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_raw(path, &text)
}

/// Parses raw time-series text.
///
/// Everything from `#` to the end of a line is a comment, blank lines are
/// ignored, and there is no header row. Every data row must have the same
/// number of numeric fields.
///
/// # Errors
///
/// Returns an error if there are no data rows, a field is not numeric, or
/// rows differ in width.
pub fn parse_raw(path: &Path, text: &str) -> Result<RawSeries, RawInputError> {
    let mut table: Option<Table> = None;

    for (index, line) in text.lines().enumerate() {
        let data = line.split(COMMENT).next().unwrap_or_default().trim();
        if data.is_empty() {
            continue;
        }

        let row = data
            .split_whitespace()
            .map(|field| {
                field.parse::<f64>().map_err(|_| RawInputError::Malformed {
                    path: path.to_path_buf(),
                    line: index + 1,
                    reason: format!("'{field}' is not a number"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let table = table.get_or_insert_with(|| Table::new(column_names(row.len())));
        let (expected, found) = (table.columns().len(), row.len());
        table.push_row(row).map_err(|_| RawInputError::Malformed {
            path: path.to_path_buf(),
            line: index + 1,
            reason: format!("expected {expected} fields, found {found}"),
        })?;
    }

    let table = table.ok_or_else(|| RawInputError::Empty {
        path: path.to_path_buf(),
    })?;

    Ok(RawSeries {
        table,
        catalog_id: catalog_id(text),
    })
}

/// Extracts the catalog identifier from raw file text.
///
/// Every line containing [`CATALOG_TOKEN`] is considered; the last such line
/// wins and its last whitespace-delimited field is the identifier.
#[must_use]
pub fn catalog_id(text: &str) -> Option<String> {
    text.lines()
        .filter(|line| line.contains(CATALOG_TOKEN))
        .filter_map(|line| line.split_whitespace().last())
        .last()
        .map(str::to_string)
}

fn column_names(width: usize) -> Vec<String> {
    (0..width)
        .map(|i| match i {
            0 => "time".to_string(),
            1 => "flux".to_string(),
            n => format!("column_{n}"),
        })
        .collect()
}
