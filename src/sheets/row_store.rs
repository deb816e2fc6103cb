// src/sheets/row_store.rs
//! Record-oriented access to one table.
//!
//! Row 1 is the header and defines the schema; everything below it is data.
//! Row numbers in this API are the table's own 1-based numbers, so the first
//! data row is row 2.
//!
//! A `RowStore` optionally holds a full snapshot of the table (`cache`). With a
//! snapshot, reads and writes go to memory until `flush`. Without one, every
//! call goes to the backing store and only derived values (last row, last
//! column, column indices) are memoized. Those memos are dropped by
//! `invalidate`, which every structural mutator calls.

use super::backing::{BackingStore, TableRef};
use super::definitions::{AppendMode, Grid, Record, Row, RowInput, TableSchema};
use super::error::{SheetError, SheetResult, StoreResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Value -> zero-based data offset of its first occurrence in one column.
#[derive(Debug, Default)]
struct ColumnIndex {
    first: HashMap<String, usize>,
}

impl ColumnIndex {
    fn build(values: Vec<String>) -> Self {
        let mut first = HashMap::with_capacity(values.len());
        for (offset, value) in values.into_iter().enumerate() {
            first.entry(value).or_insert(offset);
        }
        Self { first }
    }
}

pub struct RowStore {
    store: Arc<dyn BackingStore>,
    document_id: String,
    table: TableRef,
    cache: Option<Grid>,
    schema: Option<TableSchema>,
    last_row: Option<usize>,
    last_column: Option<usize>,
    indices: HashMap<String, ColumnIndex>,
    append_queue: Vec<Row>,
}

impl std::fmt::Debug for RowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStore")
            .field("document_id", &self.document_id)
            .field("table", &self.table)
            .field("cached", &self.cache.is_some())
            .field("pending_appends", &self.append_queue.len())
            .finish()
    }
}

impl RowStore {
    /// Bind to an existing table. With `cache` the whole used range is loaded
    /// up front.
    pub fn open(
        store: Arc<dyn BackingStore>,
        document_id: impl Into<String>,
        table: TableRef,
        cache: bool,
    ) -> StoreResult<Self> {
        let document_id = document_id.into();
        let snapshot = if cache {
            let rows = store.last_row(&document_id, &table.name)?;
            let cols = store.last_column(&document_id, &table.name)?;
            let grid = if rows == 0 {
                Grid::new()
            } else {
                store.get_range(&document_id, &table.name, 1, 1, rows, cols.max(1))?
            };
            debug!(
                "Cached table '{}' ({} rows x {} cols)",
                table.name, rows, cols
            );
            Some(grid)
        } else {
            None
        };

        Ok(Self {
            store,
            document_id,
            table,
            cache: snapshot,
            schema: None,
            last_row: None,
            last_column: None,
            indices: HashMap::new(),
            append_queue: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    /// Stable table id within its document.
    pub fn id(&self) -> i64 {
        self.table.id
    }

    pub fn table_ref(&self) -> &TableRef {
        &self.table
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    pub fn pending_appends(&self) -> usize {
        self.append_queue.len()
    }

    /// Drop every derived memo. The schema survives: the header is immutable.
    pub fn invalidate(&mut self) {
        self.last_row = None;
        self.last_column = None;
        self.indices.clear();
    }

    // ------------------------------------------------------------------
    // Shape
    // ------------------------------------------------------------------

    pub fn schema(&mut self) -> StoreResult<&TableSchema> {
        let schema = match self.schema.take() {
            Some(schema) => schema,
            None => {
                let header = self.row(1)?.unwrap_or_default();
                TableSchema::from_header(&header)
            }
        };
        Ok(self.schema.insert(schema))
    }

    pub fn last_row(&mut self) -> StoreResult<usize> {
        if let Some(last) = self.last_row {
            return Ok(last);
        }
        let last = match &self.cache {
            Some(grid) => grid.len(),
            None => self.store.last_row(&self.document_id, &self.table.name)?,
        };
        self.last_row = Some(last);
        Ok(last)
    }

    pub fn last_column(&mut self) -> StoreResult<usize> {
        if let Some(last) = self.last_column {
            return Ok(last);
        }
        let last = match &self.cache {
            Some(grid) => grid.iter().map(Vec::len).max().unwrap_or(0),
            None => self.store.last_column(&self.document_id, &self.table.name)?,
        };
        self.last_column = Some(last);
        Ok(last)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Raw row `row_number` (1 = header), or `None` past the last row.
    pub fn row(&mut self, row_number: usize) -> StoreResult<Option<Row>> {
        if row_number == 0 {
            return Ok(None);
        }
        if let Some(grid) = &self.cache {
            return Ok(grid.get(row_number - 1).cloned());
        }
        if row_number > self.last_row()? {
            return Ok(None);
        }
        let width = self.last_column()?.max(1);
        let mut grid =
            self.store
                .get_range(&self.document_id, &self.table.name, row_number, 1, 1, width)?;
        Ok(grid.pop())
    }

    pub fn record_at(&mut self, row_number: usize) -> StoreResult<Option<Record>> {
        let Some(row) = self.row(row_number)? else {
            return Ok(None);
        };
        Ok(Some(self.schema()?.row_to_record(&row)))
    }

    /// Every data row, header excluded.
    pub fn all_rows(&mut self) -> StoreResult<Vec<Row>> {
        if let Some(grid) = &self.cache {
            return Ok(grid.iter().skip(1).cloned().collect());
        }
        let last = self.last_row()?;
        if last <= 1 {
            return Ok(Vec::new());
        }
        let width = self.last_column()?.max(1);
        self.store
            .get_range(&self.document_id, &self.table.name, 2, 1, last - 1, width)
    }

    pub fn all(&mut self) -> StoreResult<Vec<Record>> {
        let rows = self.all_rows()?;
        let schema = self.schema()?;
        Ok(rows.iter().map(|row| schema.row_to_record(row)).collect())
    }

    /// The final data record, or `None` when only the header exists.
    pub fn last(&mut self) -> StoreResult<Option<Record>> {
        let last = self.last_row()?;
        if last <= 1 {
            return Ok(None);
        }
        self.record_at(last)
    }

    /// All data values of one column, top to bottom.
    pub fn column(&mut self, column: &str) -> SheetResult<Vec<String>> {
        let position = self
            .schema()?
            .position(column)
            .ok_or_else(|| SheetError::UnknownColumn {
                table: self.table.name.clone(),
                column: column.to_string(),
            })?;
        Ok(self.column_values(position)?)
    }

    fn column_values(&mut self, position: usize) -> StoreResult<Vec<String>> {
        if let Some(grid) = &self.cache {
            return Ok(grid
                .iter()
                .skip(1)
                .map(|row| row.get(position).cloned().unwrap_or_default())
                .collect());
        }
        let last = self.last_row()?;
        if last <= 1 {
            return Ok(Vec::new());
        }
        let grid = self.store.get_range(
            &self.document_id,
            &self.table.name,
            2,
            position + 1,
            last - 1,
            1,
        )?;
        Ok(grid
            .into_iter()
            .map(|mut row| row.pop().unwrap_or_default())
            .collect())
    }

    /// Row number of the first row whose `column` equals `value`.
    pub fn row_index(&mut self, column: &str, value: &str) -> StoreResult<Option<usize>> {
        if self.last_row()? <= 1 {
            return Ok(None);
        }
        if !self.indices.contains_key(column) {
            let Some(position) = self.schema()?.position(column) else {
                return Ok(None);
            };
            let values = self.column_values(position)?;
            trace!("Built index on '{}'.'{}' ({} values)", self.table.name, column, values.len());
            self.indices
                .insert(column.to_string(), ColumnIndex::build(values));
        }
        Ok(self
            .indices
            .get(column)
            .and_then(|index| index.first.get(value))
            .map(|offset| offset + 2))
    }

    pub fn find(&mut self, column: &str, value: &str) -> StoreResult<Option<Record>> {
        match self.row_index(column, value)? {
            Some(row_number) => self.record_at(row_number),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    fn resolve(&mut self, data: RowInput) -> StoreResult<Row> {
        Ok(match data {
            RowInput::Row(row) => row,
            input => input.into_row(self.schema()?),
        })
    }

    pub fn append(&mut self, data: impl Into<RowInput>, mode: AppendMode) -> StoreResult<()> {
        let row = self.resolve(data.into())?;
        match mode {
            AppendMode::Batched => {
                self.append_queue.push(row);
                return Ok(());
            }
            AppendMode::Immediate => match &mut self.cache {
                Some(grid) => grid.push(row),
                None => self
                    .store
                    .append_row(&self.document_id, &self.table.name, &row)?,
            },
        }
        self.invalidate();
        Ok(())
    }

    /// Write every queued append in one go.
    pub fn process_appends(&mut self) -> StoreResult<()> {
        if self.append_queue.is_empty() {
            return Ok(());
        }
        let queue = std::mem::take(&mut self.append_queue);
        let count = queue.len();
        if let Some(grid) = &mut self.cache {
            grid.extend(queue);
        } else {
            let start = self.last_row()? + 1;
            self.store
                .set_range(&self.document_id, &self.table.name, start, 1, &queue)?;
        }
        debug!("Processed {} queued append(s) on '{}'", count, self.table.name);
        self.invalidate();
        Ok(())
    }

    /// Overwrite the whole of row `row_number`. Rows before 2 belong to the
    /// header and are refused.
    pub fn update(&mut self, row_number: usize, data: impl Into<RowInput>) -> SheetResult<()> {
        if row_number < 2 {
            warn!(
                "Refusing to update row {} of '{}': data rows start at 2",
                row_number, self.table.name
            );
            return Err(SheetError::InvalidRowIndex {
                table: self.table.name.clone(),
                row_index: row_number,
            });
        }
        let mut row = self.resolve(data.into())?;
        match &mut self.cache {
            Some(grid) => {
                if grid.len() < row_number {
                    grid.resize_with(row_number, Vec::new);
                }
                grid[row_number - 1] = row;
            }
            None => {
                // Blank out stale cells to the right of the new row.
                let width = self.last_column()?;
                if row.len() < width {
                    row.resize(width, String::new());
                }
                self.store
                    .set_range(&self.document_id, &self.table.name, row_number, 1, &[row])?;
            }
        }
        self.invalidate();
        Ok(())
    }

    fn delete_physical(&mut self, row_number: usize) -> StoreResult<()> {
        match &mut self.cache {
            Some(grid) => {
                if row_number <= grid.len() {
                    grid.remove(row_number - 1);
                }
                Ok(())
            }
            None => self
                .store
                .delete_row(&self.document_id, &self.table.name, row_number),
        }
    }

    /// Remove one data row; later rows move up.
    pub fn remove_row(&mut self, row_number: usize) -> SheetResult<()> {
        if row_number < 2 {
            warn!(
                "Refusing to remove row {} of '{}': data rows start at 2",
                row_number, self.table.name
            );
            return Err(SheetError::InvalidRowIndex {
                table: self.table.name.clone(),
                row_index: row_number,
            });
        }
        self.delete_physical(row_number)?;
        self.invalidate();
        Ok(())
    }

    /// Remove and return the first data record.
    pub fn shift(&mut self) -> SheetResult<Option<Record>> {
        let Some(record) = self.record_at(2)? else {
            return Ok(None);
        };
        self.remove_row(2)?;
        Ok(Some(record))
    }

    /// Delete every data row for which `predicate(record, row_number)` holds.
    /// `row_number` is the row's position at the moment it is tested, i.e.
    /// after earlier deletions in the same scan have shifted it up. Returns the
    /// number of rows removed.
    pub fn delete_where<F>(&mut self, mut predicate: F) -> StoreResult<usize>
    where
        F: FnMut(&Record, usize) -> bool,
    {
        let rows = self.all_rows()?;
        let schema = self.schema()?.clone();
        let mut deleted = 0;
        for (offset, row) in rows.iter().enumerate() {
            let row_number = offset + 2 - deleted;
            let record = schema.row_to_record(row);
            if predicate(&record, row_number) {
                self.delete_physical(row_number)?;
                deleted += 1;
            }
        }
        if deleted > 0 {
            debug!("Deleted {} row(s) from '{}'", deleted, self.table.name);
        }
        self.invalidate();
        Ok(deleted)
    }

    /// Write the cached snapshot back in one rectangular write. Cells to the
    /// right of the snapshot are blanked and physical rows below it are
    /// deleted, so removed rows stay removed.
    pub fn flush(&mut self) -> StoreResult<()> {
        let Some(grid) = &self.cache else {
            return Ok(());
        };
        let physical_rows = self.store.last_row(&self.document_id, &self.table.name)?;
        let physical_cols = self.store.last_column(&self.document_id, &self.table.name)?;
        let height = grid.len();
        let width = grid
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(physical_cols)
            .max(1);

        if height > 0 {
            let padded: Grid = grid
                .iter()
                .map(|row| {
                    let mut row = row.clone();
                    row.resize(width, String::new());
                    row
                })
                .collect();
            self.store
                .set_range(&self.document_id, &self.table.name, 1, 1, &padded)?;
        }
        for row_number in (height + 1..=physical_rows).rev() {
            self.store
                .delete_row(&self.document_id, &self.table.name, row_number)?;
        }
        trace!(
            "Flushed '{}' ({} x {}, {} stale row(s) dropped)",
            self.table.name,
            height,
            width,
            physical_rows.saturating_sub(height)
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Structural copies
    // ------------------------------------------------------------------

    /// Duplicate this table inside its own document under `new_name`.
    pub fn duplicate_as(&self, new_name: &str) -> StoreResult<RowStore> {
        let table = self
            .store
            .duplicate_table(&self.document_id, &self.table.name, new_name)?;
        RowStore::open(
            Arc::clone(&self.store),
            self.document_id.clone(),
            table,
            self.is_cached(),
        )
    }

    /// Copy this table into another document, keeping its name.
    pub fn copy_to(&self, target_document: &str) -> StoreResult<RowStore> {
        let copied = self
            .store
            .copy_table(&self.document_id, &self.table.name, target_document)?;
        let table = self
            .store
            .rename_table(target_document, &copied.name, &self.table.name)?;
        RowStore::open(
            Arc::clone(&self.store),
            target_document.to_string(),
            table,
            self.is_cached(),
        )
    }
}
