// src/sheets/database/connection.rs

use super::schema;
use crate::sheets::error::StoreResult;
use rusqlite::Connection;
use std::path::Path;

pub struct DbConnection;

impl DbConnection {
    /// Creates a new document file with WAL mode enabled and the document
    /// schema in place.
    pub fn create_new(path: &Path, document_name: &str) -> StoreResult<Connection> {
        let conn = Connection::open(path)?;

        let journal_mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            tracing::error!(
                "Failed to set WAL mode on new document {:?}. Current mode: {}",
                path.file_name(),
                journal_mode
            );
        } else {
            tracing::debug!("WAL mode activated for new document {:?}", path.file_name());
        }

        conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA temp_store=MEMORY;",
        )?;

        schema::ensure_document_schema(&conn)?;
        schema::write_document_name(&conn, document_name)?;

        Ok(conn)
    }

    /// Opens an existing document file. PRAGMA settings are per connection,
    /// so WAL mode is requested on every open.
    pub fn open_existing(path: &Path) -> StoreResult<Connection> {
        let conn = Connection::open(path)?;

        let journal_mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            tracing::warn!(
                "Failed to set WAL mode on document {:?}. Current mode: {}. The file may be in use by another connection.",
                path.file_name(),
                journal_mode
            );
        }

        conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        schema::ensure_document_schema(&conn)?;

        Ok(conn)
    }
}
