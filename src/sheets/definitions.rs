// src/sheets/definitions.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One raw row of cell values, left to right.
pub type Row = Vec<String>;

/// A rectangular (possibly ragged) block of rows.
pub type Grid = Vec<Row>;

/// Ordered column names taken from a table's header row (row 1).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    columns: Vec<String>,
}

impl TableSchema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a schema from a raw header row. Trailing blank header cells are
    /// padding from the used range, not columns.
    pub fn from_header(header: &[String]) -> Self {
        let used = header
            .iter()
            .rposition(|cell| !cell.is_empty())
            .map_or(0, |last| last + 1);
        Self::new(header[..used].iter().cloned())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Zero-based position of `column` in the header.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Zips a raw row against the header. Cells missing at the end of the
    /// row become empty strings; cells past the last column are dropped.
    pub fn row_to_record(&self, row: &[String]) -> Record {
        let mut record = Record::new();
        for (idx, name) in self.columns.iter().enumerate() {
            let value = row.get(idx).cloned().unwrap_or_default();
            record.set(name.clone(), value);
        }
        record
    }

    /// Produces one cell per column, in header order. Keys the record has but
    /// the header does not are ignored; absent keys serialize as "".
    pub fn record_to_row(&self, record: &Record) -> Row {
        self.columns
            .iter()
            .map(|name| record.get(name).to_string())
            .collect()
    }
}

/// Column-name keyed view of one data row. Absent columns read as "".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter, handy for literals in tests and callers.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Restricts the record to `schema`, filling every missing column with "".
    pub fn normalized(&self, schema: &TableSchema) -> Record {
        schema.row_to_record(&schema.record_to_row(self))
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

/// What `append`/`update` accept: a record resolved against the schema, or a
/// raw row written positionally.
#[derive(Debug, Clone, PartialEq)]
pub enum RowInput {
    Record(Record),
    Row(Row),
}

impl RowInput {
    pub(crate) fn into_row(self, schema: &TableSchema) -> Row {
        match self {
            RowInput::Record(record) => schema.record_to_row(&record),
            RowInput::Row(row) => row,
        }
    }
}

impl From<Record> for RowInput {
    fn from(record: Record) -> Self {
        RowInput::Record(record)
    }
}

impl From<&Record> for RowInput {
    fn from(record: &Record) -> Self {
        RowInput::Record(record.clone())
    }
}

impl From<Row> for RowInput {
    fn from(row: Row) -> Self {
        RowInput::Row(row)
    }
}

impl From<&[&str]> for RowInput {
    fn from(row: &[&str]) -> Self {
        RowInput::Row(row.iter().map(|cell| cell.to_string()).collect())
    }
}

/// Whether an append hits storage now or waits for `process_appends`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppendMode {
    #[default]
    Immediate,
    Batched,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pets() -> TableSchema {
        TableSchema::new(["id", "name", "pet"])
    }

    #[test]
    fn test_row_to_record_pads_missing_cells() {
        let record = pets().row_to_record(&["30".to_string()]);
        assert_eq!(record.get("id"), "30");
        assert_eq!(record.get("name"), "");
        assert_eq!(record.get("pet"), "");
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_record_to_row_follows_header_order() {
        let record = Record::new()
            .with("pet", "cat")
            .with("id", "30")
            .with("unrelated", "x");
        assert_eq!(pets().record_to_row(&record), vec!["30", "", "cat"]);
    }

    #[test]
    fn test_schema_round_trip() {
        let schema = pets();
        let record = Record::new().with("id", "1").with("name", "Mary");
        let back = schema.row_to_record(&schema.record_to_row(&record));
        assert_eq!(back, record.normalized(&schema));
        assert_eq!(back.get("pet"), "");
    }

    #[test]
    fn test_from_header_drops_trailing_blanks() {
        let header = vec!["a".to_string(), "b".to_string(), String::new()];
        assert_eq!(TableSchema::from_header(&header).columns(), ["a", "b"]);
        assert!(TableSchema::from_header(&[]).is_empty());
    }

    #[test]
    fn test_missing_column_reads_empty() {
        assert_eq!(Record::new().get("anything"), "");
    }
}
