//! Numeric tables, the scalar attribute record, and their delimited-text form.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;

/// Errors raised while building or parsing a table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// A row has a different number of fields than the header.
    #[error("line {line}: expected {expected} fields, found {found}")]
    Width {
        /// One-based line number.
        line: usize,
        /// Number of columns.
        expected: usize,
        /// Number of fields in the row.
        found: usize,
    },

    /// A field is not a number.
    #[error("line {line}: '{field}' is not a number")]
    NotNumeric {
        /// One-based line number.
        line: usize,
        /// The offending field.
        field: String,
    },

    /// The text has no header line.
    #[error("missing header line")]
    MissingHeader,
}

/// A rectangular table of floating point values with named columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl Table {
    /// Creates an empty table with the given columns.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row width differs from the column count.
    pub fn push_row(&mut self, row: Vec<f64>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::Width {
                line: self.rows.len() + 2,
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Returns the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the values of a named column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[index]).collect())
    }

    /// Returns the last value of a named column.
    #[must_use]
    pub fn last_value(&self, name: &str) -> Option<f64> {
        let index = self.columns.iter().position(|c| c == name)?;
        self.rows.last().map(|row| row[index])
    }

    /// Renders the table as comma-separated text with a header line.
    #[must_use]
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let header: Vec<String> = self.columns.iter().map(|c| escape_field(c)).collect();
        out.push_str(&header.join(","));
        out.push('\n');
        for row in &self.rows {
            for (i, value) in row.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{value}");
            }
            out.push('\n');
        }
        out
    }

    /// Parses comma-separated text with a header line.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is missing, a row has the wrong width,
    /// or a field is not numeric.
    pub fn from_csv(text: &str) -> Result<Self, TableError> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        let (_, header) = lines.next().ok_or(TableError::MissingHeader)?;
        let mut table = Self::new(split_record(header));

        for (index, line) in lines {
            let fields = split_record(line);
            if fields.len() != table.columns.len() {
                return Err(TableError::Width {
                    line: index + 1,
                    expected: table.columns.len(),
                    found: fields.len(),
                });
            }
            let row = fields
                .iter()
                .map(|field| parse_number(field, index + 1))
                .collect::<Result<Vec<_>, _>>()?;
            table.rows.push(row);
        }

        Ok(table)
    }
}

fn parse_number(field: &str, line: usize) -> Result<f64, TableError> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Ok(f64::NAN);
    }
    trimmed.parse::<f64>().map_err(|_| TableError::NotNumeric {
        line,
        field: trimmed.to_string(),
    })
}

/// The running record of scalar attributes for one work item.
///
/// Keys keep their first insertion order so that `data.csv` columns are
/// stable from one checkpoint to the next.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Attributes {
    entries: Vec<(String, serde_json::Value)>,
}

impl Attributes {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an attribute, keeping its position if it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Merges a JSON object into the record; new keys are appended.
    pub fn merge(&mut self, updates: serde_json::Map<String, serde_json::Value>) {
        for (key, value) in updates {
            self.set(key, value);
        }
    }

    /// Returns the record as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> =
            self.entries.iter().cloned().collect();
        serde_json::Value::Object(map)
    }

    /// Returns the number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Renders the record as a one-row comma-separated table.
    #[must_use]
    pub fn to_csv(&self) -> String {
        let header: Vec<String> = self.entries.iter().map(|(k, _)| escape_field(k)).collect();
        let values: Vec<String> = self
            .entries
            .iter()
            .map(|(_, v)| escape_field(&render_value(v)))
            .collect();
        format!("{}\n{}\n", header.join(","), values.join(","))
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Quotes a field if it contains a delimiter, quote or line break.
pub(crate) fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Splits one comma-separated record, honouring double-quoted fields.
pub(crate) fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if current.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spectrum() -> Table {
        let mut table = Table::new(["frequency", "power"]);
        table.push_row(vec![1.0, 10.5]).unwrap();
        table.push_row(vec![2.0, 8.25]).unwrap();
        table.push_row(vec![283.2, 0.5]).unwrap();
        table
    }

    #[test]
    fn test_table_csv() {
        assert_eq!(spectrum().to_csv(), "frequency,power\n1,10.5\n2,8.25\n283.2,0.5\n");
    }

    #[test]
    fn test_table_parse() {
        let table = Table::from_csv("frequency,power\n1,10.5\n\n2,8.25\n283.2,0.5\n").unwrap();
        assert_eq!(table, spectrum());
    }

    #[test]
    fn test_table_parse_nan_and_empty() {
        let table = Table::from_csv("a,b\nnan,\n").unwrap();
        assert!(table.rows()[0][0].is_nan());
        assert!(table.rows()[0][1].is_nan());
    }

    #[test]
    fn test_table_parse_errors() {
        assert_eq!(Table::from_csv(""), Err(TableError::MissingHeader));
        assert_eq!(
            Table::from_csv("a,b\n1\n"),
            Err(TableError::Width { line: 2, expected: 2, found: 1 })
        );
        assert_eq!(
            Table::from_csv("a\nx\n"),
            Err(TableError::NotNumeric { line: 2, field: "x".to_string() })
        );
    }

    #[test]
    fn test_push_row_width() {
        let mut table = Table::new(["a", "b"]);
        assert!(table.push_row(vec![1.0]).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_column_access() {
        let table = spectrum();
        assert_eq!(table.column("power"), Some(vec![10.5, 8.25, 0.5]));
        assert_eq!(table.last_value("frequency"), Some(283.2));
        assert_eq!(table.column("missing"), None);
        assert_eq!(Table::new(["frequency"]).last_value("frequency"), None);
    }

    #[test]
    fn test_attributes_keep_order() {
        let mut attrs = Attributes::new();
        attrs.set("KIC", serde_json::json!("1234567"));
        attrs.set("raw_data", serde_json::json!("KIC001"));
        attrs.set("KIC", serde_json::json!("7654321"));

        let keys: Vec<_> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["KIC", "raw_data"]);
        assert_eq!(attrs.get("KIC"), Some(&serde_json::json!("7654321")));
    }

    #[test]
    fn test_attributes_csv() {
        let mut attrs = Attributes::new();
        attrs.set("KIC", serde_json::json!("1234567"));
        attrs.set("note", serde_json::json!("a, b"));
        attrs.set("numax", serde_json::json!(35.5));
        attrs.set("missing", serde_json::Value::Null);

        assert_eq!(attrs.to_csv(), "KIC,note,numax,missing\n1234567,\"a, b\",35.5,\n");
    }

    #[test]
    fn test_attributes_merge() {
        let mut attrs = Attributes::new();
        attrs.set("numax", serde_json::json!(1.0));
        let serde_json::Value::Object(updates) = serde_json::json!({"numax": 35.5, "sigma": 2.0})
        else {
            unreachable!()
        };
        attrs.merge(updates);

        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get("numax"), Some(&serde_json::json!(35.5)));
    }

    #[test]
    fn test_split_record_quotes() {
        assert_eq!(split_record("a,\"b,c\",\"d\"\"e\""), vec!["a", "b,c", "d\"e"]);
        assert_eq!(split_record("KIC001,1.0\r\n"), vec!["KIC001", "1.0"]);
        assert_eq!(split_record(""), vec![""]);
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
