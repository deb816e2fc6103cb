// src/sheets/database/schema.rs
//! Layout of one document file.
//!
//! - `_document`: key/value facts about the document (its display name).
//! - `_tables`: registry of logical tables; `id` is the stable sheet id,
//!   `position` the display order and `row_count` the number of rows the
//!   table holds, blank rows included.
//! - `_cells`: sparse cell storage. Empty cells are never stored, so the used
//!   width of a table is simply the max col present.

use crate::sheets::error::StoreResult;
use rusqlite::{params, Connection, OptionalExtension};

pub fn ensure_document_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _document (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS _tables (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            position INTEGER NOT NULL,
            row_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE IF NOT EXISTS _cells (
            table_id INTEGER NOT NULL,
            row_index INTEGER NOT NULL,
            col_index INTEGER NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (table_id, row_index, col_index)
        ) WITHOUT ROWID;",
    )?;
    Ok(())
}

pub fn write_document_name(conn: &Connection, name: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO _document (key, value) VALUES ('name', ?)",
        params![name],
    )?;
    Ok(())
}

pub fn read_document_name(conn: &Connection) -> StoreResult<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM _document WHERE key = 'name'", [], |row| {
            row.get(0)
        })
        .optional()?)
}
