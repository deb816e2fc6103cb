// src/sheets/backing.rs
//! The narrow contract the core uses to reach a physical tabular medium.
//!
//! Documents hold named tables; tables are 1-indexed grids whose row 1 is the
//! header. `last_row` reports how many rows the table holds: every row written
//! by `set_range` or `append_row` counts, blank or not, until `delete_row`
//! removes it. `last_column` reports the last column holding a non-empty cell.
//! Both are 0 for an empty table. Reads past the used range are padded with
//! empty strings, and writing an empty string clears a cell.

use super::definitions::{Grid, Row};
use super::error::StoreResult;
use serde::{Deserialize, Serialize};

/// Identity of one physical document. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// A table inside a document. `id` is stable for the table's lifetime and is
/// unique within its document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub id: i64,
    pub name: String,
}

pub trait BackingStore: Send + Sync {
    // Documents
    fn create_document(&self, name: &str) -> StoreResult<DocumentRef>;
    fn open_document(&self, id: &str) -> StoreResult<DocumentRef>;
    fn document_exists(&self, id: &str) -> StoreResult<bool>;
    fn copy_document(&self, id: &str, name: &str) -> StoreResult<DocumentRef>;
    fn delete_document(&self, id: &str) -> StoreResult<()>;
    /// Places the document under `folder` (outermost segment first), creating
    /// folders as needed.
    fn move_document(&self, id: &str, folder: &[String]) -> StoreResult<()>;

    // Tables
    fn list_tables(&self, doc: &str) -> StoreResult<Vec<TableRef>>;
    fn create_table(&self, doc: &str, name: &str) -> StoreResult<TableRef>;
    fn delete_table(&self, doc: &str, name: &str) -> StoreResult<()>;
    fn rename_table(&self, doc: &str, name: &str, new_name: &str) -> StoreResult<TableRef>;
    /// Copies a table into `target_doc`. The copy is named `Copy of <name>`,
    /// with a numeric suffix when that name is taken.
    fn copy_table(&self, doc: &str, name: &str, target_doc: &str) -> StoreResult<TableRef>;
    fn duplicate_table(&self, doc: &str, name: &str, new_name: &str) -> StoreResult<TableRef>;

    // Cells
    fn get_range(
        &self,
        doc: &str,
        table: &str,
        row: usize,
        col: usize,
        num_rows: usize,
        num_cols: usize,
    ) -> StoreResult<Grid>;
    fn set_range(&self, doc: &str, table: &str, row: usize, col: usize, grid: &[Row])
        -> StoreResult<()>;
    fn append_row(&self, doc: &str, table: &str, row: &[String]) -> StoreResult<()>;
    fn delete_row(&self, doc: &str, table: &str, row_index: usize) -> StoreResult<()>;
    fn last_row(&self, doc: &str, table: &str) -> StoreResult<usize>;
    fn last_column(&self, doc: &str, table: &str) -> StoreResult<usize>;
}

/// Picks the name a cross-document copy lands under, skipping names in use.
pub(crate) fn copy_name(name: &str, taken: impl Fn(&str) -> bool) -> String {
    let base = format!("Copy of {}", name);
    if !taken(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{} {}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Used extent of a grid: (last non-empty row, last non-empty column).
pub(crate) fn used_extent(grid: &[Row]) -> (usize, usize) {
    let mut last_row = 0;
    let mut last_col = 0;
    for (r, row) in grid.iter().enumerate() {
        if let Some(c) = row.iter().rposition(|cell| !cell.is_empty()) {
            last_row = r + 1;
            last_col = last_col.max(c + 1);
        }
    }
    (last_row, last_col)
}

pub(crate) fn validate_origin(row: usize, col: usize) -> StoreResult<()> {
    if row == 0 || col == 0 {
        return Err(super::error::StoreError::InvalidRange(format!(
            "ranges are 1-indexed, got row {} col {}",
            row, col
        )));
    }
    Ok(())
}
