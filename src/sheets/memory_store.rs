// src/sheets/memory_store.rs
//! In-process `BackingStore`. Used by tests and for throwaway runs; nothing
//! survives the process.

use super::backing::{copy_name, used_extent, validate_origin, BackingStore, DocumentRef, TableRef};
use super::definitions::{Grid, Row};
use super::error::{StoreError, StoreResult};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
struct MemoryTable {
    id: i64,
    name: String,
    grid: Grid,
}

#[derive(Debug, Clone)]
struct MemoryDocument {
    doc: DocumentRef,
    folder: Vec<String>,
    tables: Vec<MemoryTable>,
    next_table_id: i64,
}

impl MemoryDocument {
    fn new(doc: DocumentRef) -> Self {
        Self {
            doc,
            folder: Vec::new(),
            tables: Vec::new(),
            next_table_id: 1,
        }
    }

    fn table(&self, name: &str) -> StoreResult<&MemoryTable> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| self.missing(name))
    }

    fn table_mut(&mut self, name: &str) -> StoreResult<&mut MemoryTable> {
        let missing = self.missing(name);
        self.tables
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or(missing)
    }

    fn has_table(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name)
    }

    fn insert_table(&mut self, name: &str, grid: Grid) -> StoreResult<TableRef> {
        if self.has_table(name) {
            return Err(StoreError::TableExists {
                document: self.doc.id.clone(),
                table: name.to_string(),
            });
        }
        let id = self.next_table_id;
        self.next_table_id += 1;
        self.tables.push(MemoryTable {
            id,
            name: name.to_string(),
            grid,
        });
        Ok(TableRef {
            id,
            name: name.to_string(),
        })
    }

    fn missing(&self, name: &str) -> StoreError {
        StoreError::TableNotFound {
            document: self.doc.id.clone(),
            table: name.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    documents: HashMap<String, MemoryDocument>,
    cell_writes: usize,
}

impl Inner {
    fn document(&self, id: &str) -> StoreResult<&MemoryDocument> {
        self.documents
            .get(id)
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string()))
    }

    fn document_mut(&mut self, id: &str) -> StoreResult<&mut MemoryDocument> {
        self.documents
            .get_mut(id)
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string()))
    }

    fn register(&mut self, name: &str) -> DocumentRef {
        let id = uuid::Uuid::new_v4().to_string();
        let doc = DocumentRef {
            url: format!("memory://{}", id),
            id: id.clone(),
            name: name.to_string(),
        };
        self.documents.insert(id, MemoryDocument::new(doc.clone()));
        doc
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Other("memory store lock poisoned".to_string()))
    }

    /// Number of cell-level writes (`set_range`, `append_row`, `delete_row`)
    /// served so far.
    pub fn cell_writes(&self) -> usize {
        self.lock().map(|inner| inner.cell_writes).unwrap_or(0)
    }

    /// Folder a document was last moved into.
    pub fn folder_of(&self, id: &str) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.document(id)?.folder.clone())
    }

    pub fn document_count(&self) -> usize {
        self.lock().map(|inner| inner.documents.len()).unwrap_or(0)
    }
}

fn write_grid(target: &mut Grid, row: usize, col: usize, grid: &[Row]) {
    for (r_off, cells) in grid.iter().enumerate() {
        let r = row - 1 + r_off;
        if target.len() <= r {
            target.resize_with(r + 1, Vec::new);
        }
        let dest = &mut target[r];
        let needed = col - 1 + cells.len();
        if dest.len() < needed {
            dest.resize(needed, String::new());
        }
        for (c_off, value) in cells.iter().enumerate() {
            dest[col - 1 + c_off] = value.clone();
        }
    }
}

impl BackingStore for MemoryStore {
    fn create_document(&self, name: &str) -> StoreResult<DocumentRef> {
        let doc = self.lock()?.register(name);
        debug!("MemoryStore: created document '{}' ({})", name, doc.id);
        Ok(doc)
    }

    fn open_document(&self, id: &str) -> StoreResult<DocumentRef> {
        Ok(self.lock()?.document(id)?.doc.clone())
    }

    fn document_exists(&self, id: &str) -> StoreResult<bool> {
        Ok(self.lock()?.documents.contains_key(id))
    }

    fn copy_document(&self, id: &str, name: &str) -> StoreResult<DocumentRef> {
        let mut inner = self.lock()?;
        let source = inner.document(id)?.clone();
        let doc = inner.register(name);
        let copy = inner.document_mut(&doc.id)?;
        copy.tables = source.tables;
        copy.next_table_id = source.next_table_id;
        copy.folder = source.folder;
        debug!("MemoryStore: copied document {} to {}", id, doc.id);
        Ok(doc)
    }

    fn delete_document(&self, id: &str) -> StoreResult<()> {
        self.lock()?
            .documents
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string()))
    }

    fn move_document(&self, id: &str, folder: &[String]) -> StoreResult<()> {
        self.lock()?.document_mut(id)?.folder = folder.to_vec();
        Ok(())
    }

    fn list_tables(&self, doc: &str) -> StoreResult<Vec<TableRef>> {
        Ok(self
            .lock()?
            .document(doc)?
            .tables
            .iter()
            .map(|t| TableRef {
                id: t.id,
                name: t.name.clone(),
            })
            .collect())
    }

    fn create_table(&self, doc: &str, name: &str) -> StoreResult<TableRef> {
        self.lock()?.document_mut(doc)?.insert_table(name, Grid::new())
    }

    fn delete_table(&self, doc: &str, name: &str) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let document = inner.document_mut(doc)?;
        let before = document.tables.len();
        document.tables.retain(|t| t.name != name);
        if document.tables.len() == before {
            return Err(document.missing(name));
        }
        Ok(())
    }

    fn rename_table(&self, doc: &str, name: &str, new_name: &str) -> StoreResult<TableRef> {
        let mut inner = self.lock()?;
        let document = inner.document_mut(doc)?;
        if name != new_name && document.has_table(new_name) {
            return Err(StoreError::TableExists {
                document: doc.to_string(),
                table: new_name.to_string(),
            });
        }
        let table = document.table_mut(name)?;
        table.name = new_name.to_string();
        Ok(TableRef {
            id: table.id,
            name: table.name.clone(),
        })
    }

    fn copy_table(&self, doc: &str, name: &str, target_doc: &str) -> StoreResult<TableRef> {
        let mut inner = self.lock()?;
        let grid = inner.document(doc)?.table(name)?.grid.clone();
        let target = inner.document_mut(target_doc)?;
        let new_name = copy_name(name, |candidate| target.has_table(candidate));
        target.insert_table(&new_name, grid)
    }

    fn duplicate_table(&self, doc: &str, name: &str, new_name: &str) -> StoreResult<TableRef> {
        let mut inner = self.lock()?;
        let document = inner.document_mut(doc)?;
        let grid = document.table(name)?.grid.clone();
        document.insert_table(new_name, grid)
    }

    fn get_range(
        &self,
        doc: &str,
        table: &str,
        row: usize,
        col: usize,
        num_rows: usize,
        num_cols: usize,
    ) -> StoreResult<Grid> {
        validate_origin(row, col)?;
        let inner = self.lock()?;
        let grid = &inner.document(doc)?.table(table)?.grid;
        Ok((row..row + num_rows)
            .map(|r| {
                (col..col + num_cols)
                    .map(|c| {
                        grid.get(r - 1)
                            .and_then(|cells| cells.get(c - 1))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect())
    }

    fn set_range(
        &self,
        doc: &str,
        table: &str,
        row: usize,
        col: usize,
        grid: &[Row],
    ) -> StoreResult<()> {
        validate_origin(row, col)?;
        let mut inner = self.lock()?;
        inner.cell_writes += 1;
        let target = &mut inner.document_mut(doc)?.table_mut(table)?.grid;
        write_grid(target, row, col, grid);
        trace!("MemoryStore: wrote {} row(s) at {}:{} in '{}'", grid.len(), row, col, table);
        Ok(())
    }

    fn append_row(&self, doc: &str, table: &str, row: &[String]) -> StoreResult<()> {
        let mut inner = self.lock()?;
        inner.cell_writes += 1;
        let target = &mut inner.document_mut(doc)?.table_mut(table)?.grid;
        target.push(row.to_vec());
        Ok(())
    }

    fn delete_row(&self, doc: &str, table: &str, row_index: usize) -> StoreResult<()> {
        validate_origin(row_index, 1)?;
        let mut inner = self.lock()?;
        inner.cell_writes += 1;
        let target = &mut inner.document_mut(doc)?.table_mut(table)?.grid;
        if row_index <= target.len() {
            target.remove(row_index - 1);
        }
        Ok(())
    }

    fn last_row(&self, doc: &str, table: &str) -> StoreResult<usize> {
        let inner = self.lock()?;
        Ok(inner.document(doc)?.table(table)?.grid.len())
    }

    fn last_column(&self, doc: &str, table: &str) -> StoreResult<usize> {
        let inner = self.lock()?;
        Ok(used_extent(&inner.document(doc)?.table(table)?.grid).1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_ranges_pad_and_extend() {
        let store = MemoryStore::new();
        let doc = store.create_document("d").unwrap();
        store.create_table(&doc.id, "t").unwrap();
        store
            .set_range(&doc.id, "t", 2, 2, &[row(&["x", "y"])])
            .unwrap();
        assert_eq!(store.last_row(&doc.id, "t").unwrap(), 2);
        assert_eq!(store.last_column(&doc.id, "t").unwrap(), 3);
        let grid = store.get_range(&doc.id, "t", 1, 1, 2, 4).unwrap();
        assert_eq!(grid, vec![row(&["", "", "", ""]), row(&["", "x", "y", ""])]);
    }

    #[test]
    fn test_append_and_delete_rows() {
        let store = MemoryStore::new();
        let doc = store.create_document("d").unwrap();
        store.create_table(&doc.id, "t").unwrap();
        for value in ["h", "a", "b", "c"] {
            store.append_row(&doc.id, "t", &row(&[value])).unwrap();
        }
        store.delete_row(&doc.id, "t", 3).unwrap();
        let grid = store.get_range(&doc.id, "t", 1, 1, 3, 1).unwrap();
        assert_eq!(grid, vec![row(&["h"]), row(&["a"]), row(&["c"])]);
        assert_eq!(store.cell_writes(), 5);
    }

    #[test]
    fn test_copy_table_across_documents() {
        let store = MemoryStore::new();
        let a = store.create_document("a").unwrap();
        let b = store.create_document("b").unwrap();
        store.create_table(&a.id, "t").unwrap();
        store.append_row(&a.id, "t", &row(&["h"])).unwrap();
        let copied = store.copy_table(&a.id, "t", &b.id).unwrap();
        assert_eq!(copied.name, "Copy of t");
        let renamed = store.rename_table(&b.id, &copied.name, "t").unwrap();
        assert_eq!(renamed.id, copied.id);
        assert_eq!(store.get_range(&b.id, "t", 1, 1, 1, 1).unwrap(), vec![row(&["h"])]);
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let store = MemoryStore::new();
        let doc = store.create_document("d").unwrap();
        assert!(matches!(
            store.last_row(&doc.id, "nope"),
            Err(StoreError::TableNotFound { .. })
        ));
        assert!(matches!(
            store.open_document("nope"),
            Err(StoreError::DocumentNotFound(_))
        ));
    }
}
