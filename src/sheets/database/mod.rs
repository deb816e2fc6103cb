// src/sheets/database/mod.rs
// SQLite-backed document store: one database file per document

mod cells;
pub mod checkpoint;
pub mod connection;
pub mod schema;
mod tables;

pub use connection::DbConnection;

use crate::sheets::backing::{validate_origin, BackingStore, DocumentRef, TableRef};
use crate::sheets::definitions::{Grid, Row};
use crate::sheets::error::{StoreError, StoreResult};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

const DOCUMENT_EXTENSION: &str = "db";

/// Stores every document as `<id>.db` somewhere under `root`. Documents start
/// at the root and `move_document` relocates them into folders beneath it.
/// Located paths are remembered; clones share them.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    root: PathBuf,
    paths: Arc<RwLock<HashMap<String, PathBuf>>>,
}

impl SqliteStore {
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            paths: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_name(id: &str) -> String {
        format!("{}.{}", id, DOCUMENT_EXTENSION)
    }

    fn poisoned() -> StoreError {
        StoreError::Other("document path cache lock poisoned".to_string())
    }

    fn remember(&self, id: &str, path: &Path) -> StoreResult<()> {
        self.paths
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(id.to_string(), path.to_path_buf());
        Ok(())
    }

    fn forget(&self, id: &str) -> StoreResult<()> {
        self.paths.write().map_err(|_| Self::poisoned())?.remove(id);
        Ok(())
    }

    /// Find a document file, trying the remembered path before walking the
    /// whole root.
    fn locate(&self, id: &str) -> StoreResult<PathBuf> {
        let known = self
            .paths
            .read()
            .map_err(|_| Self::poisoned())?
            .get(id)
            .cloned();
        if let Some(path) = known {
            if path.is_file() {
                return Ok(path);
            }
            trace!("Remembered path {:?} for document {} is gone", path, id);
            self.forget(id)?;
        }

        let target = Self::file_name(id);
        let path = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .find(|e| e.file_name().to_string_lossy() == target)
            .map(|e| e.into_path())
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string()))?;
        self.remember(id, &path)?;
        Ok(path)
    }

    fn connect(&self, id: &str) -> StoreResult<Connection> {
        let path = self.locate(id)?;
        DbConnection::open_existing(&path)
    }

    fn document_ref(id: &str, path: &Path, conn: &Connection) -> StoreResult<DocumentRef> {
        let name = schema::read_document_name(conn)?.unwrap_or_else(|| id.to_string());
        Ok(DocumentRef {
            id: id.to_string(),
            name,
            url: format!("file://{}", path.display()),
        })
    }

    fn table_id(conn: &Connection, doc: &str, table: &str) -> StoreResult<i64> {
        tables::require_table(conn, doc, table)
    }

    fn remove_side_files(path: &Path) {
        for side in checkpoint::side_files(path) {
            if side.exists() {
                if let Err(e) = std::fs::remove_file(&side) {
                    warn!("Could not remove {:?}: {}", side, e);
                }
            }
        }
    }
}

impl BackingStore for SqliteStore {
    fn create_document(&self, name: &str) -> StoreResult<DocumentRef> {
        let id = uuid::Uuid::new_v4().to_string();
        let path = self.root.join(Self::file_name(&id));
        let conn = DbConnection::create_new(&path, name)?;
        self.remember(&id, &path)?;
        info!("Created document '{}' at {:?}", name, path);
        Self::document_ref(&id, &path, &conn)
    }

    fn open_document(&self, id: &str) -> StoreResult<DocumentRef> {
        let path = self.locate(id)?;
        let conn = DbConnection::open_existing(&path)?;
        Self::document_ref(id, &path, &conn)
    }

    fn document_exists(&self, id: &str) -> StoreResult<bool> {
        match self.locate(id) {
            Ok(_) => Ok(true),
            Err(StoreError::DocumentNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn copy_document(&self, id: &str, name: &str) -> StoreResult<DocumentRef> {
        let source = self.locate(id)?;
        checkpoint::checkpoint_database_file(&source)?;

        let copy_id = uuid::Uuid::new_v4().to_string();
        let dest = self.root.join(Self::file_name(&copy_id));
        std::fs::copy(&source, &dest)?;

        let conn = DbConnection::open_existing(&dest)?;
        schema::write_document_name(&conn, name)?;
        self.remember(&copy_id, &dest)?;
        debug!("Copied document {} to {} ('{}')", id, copy_id, name);
        Self::document_ref(&copy_id, &dest, &conn)
    }

    fn delete_document(&self, id: &str) -> StoreResult<()> {
        let path = self.locate(id)?;
        self.forget(id)?;
        std::fs::remove_file(&path)?;
        Self::remove_side_files(&path);
        debug!("Deleted document {}", id);
        Ok(())
    }

    fn move_document(&self, id: &str, folder: &[String]) -> StoreResult<()> {
        let source = self.locate(id)?;
        let dir = folder
            .iter()
            .fold(self.root.clone(), |path, segment| path.join(segment));
        std::fs::create_dir_all(&dir)?;

        let dest = dir.join(Self::file_name(id));
        if dest == source {
            return Ok(());
        }

        checkpoint::checkpoint_database_file(&source)?;
        let options = fs_extra::file::CopyOptions::new();
        self.forget(id)?;
        fs_extra::file::move_file(&source, &dest, &options)?;
        self.remember(id, &dest)?;
        Self::remove_side_files(&source);
        info!("Moved document {} into {:?}", id, dir);
        Ok(())
    }

    fn list_tables(&self, doc: &str) -> StoreResult<Vec<TableRef>> {
        tables::list_tables(&self.connect(doc)?)
    }

    fn create_table(&self, doc: &str, name: &str) -> StoreResult<TableRef> {
        tables::create_table(&self.connect(doc)?, doc, name)
    }

    fn delete_table(&self, doc: &str, name: &str) -> StoreResult<()> {
        tables::delete_table(&mut self.connect(doc)?, doc, name)
    }

    fn rename_table(&self, doc: &str, name: &str, new_name: &str) -> StoreResult<TableRef> {
        tables::rename_table(&self.connect(doc)?, doc, name, new_name)
    }

    fn copy_table(&self, doc: &str, name: &str, target_doc: &str) -> StoreResult<TableRef> {
        let source = self.locate(doc)?;
        checkpoint::checkpoint_database_file(&source)?;
        let mut conn = self.connect(target_doc)?;
        tables::copy_table_from(&mut conn, &source, doc, target_doc, name)
    }

    fn duplicate_table(&self, doc: &str, name: &str, new_name: &str) -> StoreResult<TableRef> {
        tables::duplicate_table(&mut self.connect(doc)?, doc, name, new_name)
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
        let conn = self.connect(doc)?;
        let table_id = Self::table_id(&conn, doc, table)?;
        cells::get_range(&conn, table_id, row, col, num_rows, num_cols)
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
        let mut conn = self.connect(doc)?;
        let table_id = Self::table_id(&conn, doc, table)?;
        cells::set_range(&mut conn, table_id, row, col, grid)
    }

    fn append_row(&self, doc: &str, table: &str, row: &[String]) -> StoreResult<()> {
        let mut conn = self.connect(doc)?;
        let table_id = Self::table_id(&conn, doc, table)?;
        let next = cells::last_row(&conn, table_id)? + 1;
        cells::set_range(&mut conn, table_id, next, 1, &[row.to_vec()])
    }

    fn delete_row(&self, doc: &str, table: &str, row_index: usize) -> StoreResult<()> {
        validate_origin(row_index, 1)?;
        let mut conn = self.connect(doc)?;
        let table_id = Self::table_id(&conn, doc, table)?;
        cells::delete_row(&mut conn, table_id, row_index)
    }

    fn last_row(&self, doc: &str, table: &str) -> StoreResult<usize> {
        let conn = self.connect(doc)?;
        let table_id = Self::table_id(&conn, doc, table)?;
        cells::last_row(&conn, table_id)
    }

    fn last_column(&self, doc: &str, table: &str) -> StoreResult<usize> {
        let conn = self.connect(doc)?;
        let table_id = Self::table_id(&conn, doc, table)?;
        cells::last_column(&conn, table_id)
    }
}
