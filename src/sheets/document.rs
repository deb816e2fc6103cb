// src/sheets/document.rs
//! One backing document plus the row stores opened against it.
//!
//! `atomic` gives a coarse all-or-nothing envelope by forking the whole
//! document, running the caller's work on the fork and copying every table
//! back. It narrows the window in which readers can see half-done work; it is
//! not isolation and does nothing against a second writer.

use super::backing::{BackingStore, DocumentRef};
use super::error::{SheetError, SheetResult, StoreResult};
use super::row_store::RowStore;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct Document {
    store: Arc<dyn BackingStore>,
    original: DocumentRef,
    working: DocumentRef,
    tables: BTreeMap<String, RowStore>,
    cache: bool,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("original", &self.original)
            .field("working", &self.working)
            .field("open_tables", &self.tables.keys().collect::<Vec<_>>())
            .field("cache", &self.cache)
            .finish()
    }
}

impl Document {
    pub fn open(store: Arc<dyn BackingStore>, id: &str, cache: bool) -> StoreResult<Self> {
        let doc = store.open_document(id)?;
        Ok(Self::from_ref(store, doc, cache))
    }

    pub fn from_ref(store: Arc<dyn BackingStore>, doc: DocumentRef, cache: bool) -> Self {
        Self {
            store,
            working: doc.clone(),
            original: doc,
            tables: BTreeMap::new(),
            cache,
        }
    }

    /// Id of the document table access currently goes to (the fork while a
    /// transaction runs).
    pub fn id(&self) -> &str {
        &self.working.id
    }

    pub fn original(&self) -> &DocumentRef {
        &self.original
    }

    pub fn url(&self) -> &str {
        &self.original.url
    }

    pub fn name(&self) -> &str {
        &self.original.name
    }

    pub fn is_forked(&self) -> bool {
        self.working.id != self.original.id
    }

    /// Memoized row store for `name`, opened with this document's cache
    /// policy on first access.
    pub fn table(&mut self, name: &str) -> StoreResult<Option<&mut RowStore>> {
        if !self.tables.contains_key(name) {
            let Some(table) = self
                .store
                .list_tables(&self.working.id)?
                .into_iter()
                .find(|t| t.name == name)
            else {
                return Ok(None);
            };
            let rows = RowStore::open(
                Arc::clone(&self.store),
                self.working.id.clone(),
                table,
                self.cache,
            )?;
            self.tables.insert(name.to_string(), rows);
        }
        Ok(self.tables.get_mut(name))
    }

    /// Remove the row store for `name` from the open set and hand it to the
    /// caller. Later `table(name)` calls open a fresh one.
    pub fn take_table(&mut self, name: &str) -> StoreResult<Option<RowStore>> {
        self.table(name)?;
        Ok(self.tables.remove(name))
    }

    pub fn into_table(mut self, name: &str) -> StoreResult<Option<RowStore>> {
        self.take_table(name)
    }

    pub fn table_names(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .store
            .list_tables(&self.working.id)?
            .into_iter()
            .map(|t| t.name)
            .collect())
    }

    pub fn has_table(&self, name: &str) -> StoreResult<bool> {
        Ok(self.table_names()?.iter().any(|n| n == name))
    }

    /// Create a table whose row 1 is `header`.
    pub fn create_table(&mut self, name: &str, header: &[String]) -> StoreResult<&mut RowStore> {
        let table = self.store.create_table(&self.working.id, name)?;
        if !header.is_empty() {
            self.store
                .set_range(&self.working.id, name, 1, 1, &[header.to_vec()])?;
        }
        let rows = RowStore::open(
            Arc::clone(&self.store),
            self.working.id.clone(),
            table,
            self.cache,
        )?;
        debug!("Created table '{}' in document {}", name, self.working.id);
        Ok(self.tables.entry(name.to_string()).or_insert(rows))
    }

    pub fn delete_table(&mut self, name: &str) -> StoreResult<()> {
        self.tables.remove(name);
        self.store.delete_table(&self.working.id, name)
    }

    /// Number of tables in the original document, regardless of any fork.
    pub fn table_count(&self) -> StoreResult<usize> {
        Ok(self.store.list_tables(&self.original.id)?.len())
    }

    pub fn process_appends(&mut self) -> StoreResult<()> {
        for rows in self.tables.values_mut() {
            rows.process_appends()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> StoreResult<()> {
        for rows in self.tables.values_mut() {
            rows.flush()?;
        }
        Ok(())
    }

    /// Place the document under `parent_folder/folder_name` (or just
    /// `folder_name` without a parent).
    pub fn move_to_folder(&self, folder_name: &str, parent_folder: Option<&str>) -> StoreResult<()> {
        let path: Vec<String> = parent_folder
            .into_iter()
            .chain(std::iter::once(folder_name))
            .map(str::to_string)
            .collect();
        self.store.move_document(&self.original.id, &path)
    }

    // ------------------------------------------------------------------
    // Fork / merge
    // ------------------------------------------------------------------

    /// Run `action` against a private copy of this document and, if it
    /// succeeds, replace every table of the original with the copy's tables.
    /// If `action` (or the commit) fails the copy is deleted and the original
    /// is left untouched.
    pub fn atomic<T, F>(&mut self, action: F) -> SheetResult<T>
    where
        F: FnOnce(&mut Document) -> SheetResult<T>,
    {
        if self.is_forked() {
            return Err(SheetError::TransactionInProgress(self.original.id.clone()));
        }
        self.fork()?;

        let outcome = action(self).and_then(|value| {
            self.commit()?;
            Ok(value)
        });

        match outcome {
            Ok(value) => {
                self.merge()?;
                Ok(value)
            }
            Err(e) => {
                warn!(
                    "Transaction on document {} failed, discarding fork: {}",
                    self.original.id, e
                );
                self.discard_fork();
                Err(e)
            }
        }
    }

    fn fork(&mut self) -> StoreResult<()> {
        let pending: usize = self.tables.values().map(RowStore::pending_appends).sum();
        if pending > 0 {
            warn!(
                "Dropping {} queued append(s) on document {} before forking",
                pending, self.original.id
            );
        }

        let name = format!(
            "Temporary {}, {}",
            self.original.name,
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        let fork = self.store.copy_document(&self.original.id, &name)?;
        info!("Forked document {} into {}", self.original.id, fork.id);
        self.working = fork;
        self.tables.clear();
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.process_appends()?;
        self.flush()
    }

    fn merge(&mut self) -> StoreResult<()> {
        let fork = std::mem::replace(&mut self.working, self.original.clone());
        self.tables.clear();

        if let Err(e) = self.replace_tables_from(&fork.id) {
            error!(
                "Merging fork {} into {} failed; the fork is kept for recovery: {}",
                fork.id, self.original.id, e
            );
            return Err(e);
        }

        self.store.delete_document(&fork.id)?;
        info!("Merged fork {} into document {}", fork.id, self.original.id);
        Ok(())
    }

    fn replace_tables_from(&self, fork_id: &str) -> StoreResult<()> {
        let original_id = &self.original.id;
        for table in self.store.list_tables(original_id)? {
            self.store.delete_table(original_id, &table.name)?;
        }
        for table in self.store.list_tables(fork_id)? {
            let copied = self.store.copy_table(fork_id, &table.name, original_id)?;
            self.store
                .rename_table(original_id, &copied.name, &table.name)?;
        }
        Ok(())
    }

    fn discard_fork(&mut self) {
        let fork = std::mem::replace(&mut self.working, self.original.clone());
        self.tables.clear();
        if let Err(e) = self.store.delete_document(&fork.id) {
            error!("Could not delete fork {}: {}", fork.id, e);
        }
    }
}

/// Run `f` as one fork/merge transaction on `doc`.
pub fn with_transaction<T, F>(doc: &mut Document, f: F) -> SheetResult<T>
where
    F: FnOnce(&mut Document) -> SheetResult<T>,
{
    doc.atomic(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::definitions::{AppendMode, Record};
    use crate::sheets::memory_store::MemoryStore;

    fn header(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    fn doc_with(tables: &[&str], cache: bool) -> (Arc<MemoryStore>, Document) {
        let mem = Arc::new(MemoryStore::new());
        let doc_ref = mem.create_document("main").unwrap();
        let mut doc = Document::from_ref(mem.clone(), doc_ref, cache);
        for name in tables {
            doc.create_table(name, &header(&["k", "v"])).unwrap();
        }
        (mem, doc)
    }

    #[test]
    fn test_table_is_memoized_and_missing_is_none() {
        let (_mem, mut doc) = doc_with(&["A"], false);
        doc.table("A")
            .unwrap()
            .unwrap()
            .append(Record::new().with("k", "1"), AppendMode::Batched)
            .unwrap();
        assert_eq!(doc.table("A").unwrap().unwrap().pending_appends(), 1);
        assert!(doc.table("missing").unwrap().is_none());
    }

    #[test]
    fn test_process_appends_fans_out() {
        let (_mem, mut doc) = doc_with(&["A", "B"], false);
        for name in ["A", "B"] {
            doc.table(name)
                .unwrap()
                .unwrap()
                .append(Record::new().with("k", name), AppendMode::Batched)
                .unwrap();
        }
        doc.process_appends().unwrap();
        for name in ["A", "B"] {
            let rows = doc.table(name).unwrap().unwrap();
            assert_eq!(rows.all().unwrap()[0].get("k"), name);
        }
    }

    #[test]
    fn test_atomic_replaces_tables_and_drops_fork() {
        let (mem, mut doc) = doc_with(&["A", "B"], true);
        assert_eq!(mem.document_count(), 1);

        doc.atomic(|d| {
            assert!(d.is_forked());
            d.create_table("C", &header(&["k", "v"]))?
                .append(Record::new().with("k", "c1"), AppendMode::Immediate)?;
            d.delete_table("A")?;
            Ok(())
        })
        .unwrap();

        assert!(!doc.is_forked());
        assert_eq!(doc.table_names().unwrap(), vec!["B", "C"]);
        assert_eq!(mem.document_count(), 1);
        let c = doc.table("C").unwrap().unwrap();
        assert_eq!(c.all().unwrap()[0].get("k"), "c1");
    }

    #[test]
    fn test_failed_atomic_discards_fork() {
        let (mem, mut doc) = doc_with(&["A"], false);
        let result: SheetResult<()> = doc.atomic(|d| {
            d.delete_table("A")?;
            Err(SheetError::InvalidKey("boom".to_string()))
        });
        assert!(matches!(result, Err(SheetError::InvalidKey(_))));
        assert!(!doc.is_forked());
        assert_eq!(mem.document_count(), 1);
        assert_eq!(doc.table_names().unwrap(), vec!["A"]);
    }

    #[test]
    fn test_table_count_reads_original_during_fork() {
        let (_mem, mut doc) = doc_with(&["A"], false);
        with_transaction(&mut doc, |d| {
            d.create_table("B", &[])?;
            assert_eq!(d.table_count()?, 1);
            Ok(())
        })
        .unwrap();
        assert_eq!(doc.table_count().unwrap(), 2);
    }

    #[test]
    fn test_move_to_folder() {
        let (mem, doc) = doc_with(&[], false);
        doc.move_to_folder("data", Some("base")).unwrap();
        assert_eq!(
            mem.folder_of(&doc.original().id).unwrap(),
            vec!["base".to_string(), "data".to_string()]
        );
    }
}
