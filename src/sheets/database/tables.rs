// src/sheets/database/tables.rs
// Table registry operations inside a single document file

use crate::sheets::backing::{copy_name, TableRef};
use crate::sheets::error::{StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

fn missing(doc: &str, name: &str) -> StoreError {
    StoreError::TableNotFound {
        document: doc.to_string(),
        table: name.to_string(),
    }
}

fn exists_error(doc: &str, name: &str) -> StoreError {
    StoreError::TableExists {
        document: doc.to_string(),
        table: name.to_string(),
    }
}

pub fn find_table(conn: &Connection, name: &str) -> StoreResult<Option<i64>> {
    Ok(conn
        .query_row("SELECT id FROM _tables WHERE name = ?", params![name], |row| {
            row.get(0)
        })
        .optional()?)
}

/// Resolve a table name to its id or fail with `TableNotFound`.
pub fn require_table(conn: &Connection, doc: &str, name: &str) -> StoreResult<i64> {
    find_table(conn, name)?.ok_or_else(|| missing(doc, name))
}

pub fn list_tables(conn: &Connection) -> StoreResult<Vec<TableRef>> {
    let mut stmt = conn.prepare("SELECT id, name FROM _tables ORDER BY position, id")?;
    let tables = stmt
        .query_map([], |row| {
            Ok(TableRef {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tables)
}

pub fn create_table(conn: &Connection, doc: &str, name: &str) -> StoreResult<TableRef> {
    if find_table(conn, name)?.is_some() {
        return Err(exists_error(doc, name));
    }
    conn.execute(
        "INSERT INTO _tables (name, position)
         VALUES (?, (SELECT COALESCE(MAX(position), 0) + 1 FROM _tables))",
        params![name],
    )?;
    Ok(TableRef {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
    })
}

pub fn delete_table(conn: &mut Connection, doc: &str, name: &str) -> StoreResult<()> {
    let id = require_table(conn, doc, name)?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM _cells WHERE table_id = ?", params![id])?;
    tx.execute("DELETE FROM _tables WHERE id = ?", params![id])?;
    tx.commit()?;
    Ok(())
}

pub fn rename_table(conn: &Connection, doc: &str, name: &str, new_name: &str) -> StoreResult<TableRef> {
    let id = require_table(conn, doc, name)?;
    if name != new_name && find_table(conn, new_name)?.is_some() {
        return Err(exists_error(doc, new_name));
    }
    conn.execute(
        "UPDATE _tables SET name = ? WHERE id = ?",
        params![new_name, id],
    )?;
    Ok(TableRef {
        id,
        name: new_name.to_string(),
    })
}

pub fn duplicate_table(
    conn: &mut Connection,
    doc: &str,
    name: &str,
    new_name: &str,
) -> StoreResult<TableRef> {
    let source_id = require_table(conn, doc, name)?;
    let tx = conn.transaction()?;
    let table = create_table(&tx, doc, new_name)?;
    tx.execute(
        "INSERT INTO _cells (table_id, row_index, col_index, value)
         SELECT ?, row_index, col_index, value FROM _cells WHERE table_id = ?",
        params![table.id, source_id],
    )?;
    tx.execute(
        "UPDATE _tables SET row_count = (SELECT row_count FROM _tables WHERE id = ?2) WHERE id = ?1",
        params![table.id, source_id],
    )?;
    tx.commit()?;
    Ok(table)
}

/// Copy a table from the document file at `source_path` into the document
/// open on `conn`.
pub fn copy_table_from(
    conn: &mut Connection,
    source_path: &Path,
    source_doc: &str,
    target_doc: &str,
    name: &str,
) -> StoreResult<TableRef> {
    conn.execute(
        "ATTACH DATABASE ? AS source",
        params![source_path.to_string_lossy().into_owned()],
    )?;
    let copied = copy_attached(conn, source_doc, target_doc, name);
    conn.execute("DETACH DATABASE source", [])?;
    copied
}

fn copy_attached(
    conn: &mut Connection,
    source_doc: &str,
    target_doc: &str,
    name: &str,
) -> StoreResult<TableRef> {
    let source_id: i64 = conn
        .query_row(
            "SELECT id FROM source._tables WHERE name = ?",
            params![name],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| missing(source_doc, name))?;

    let existing: Vec<String> = list_tables(conn)?.into_iter().map(|t| t.name).collect();
    let new_name = copy_name(name, |candidate| existing.iter().any(|n| n == candidate));

    let tx = conn.transaction()?;
    let table = create_table(&tx, target_doc, &new_name)?;
    tx.execute(
        "INSERT INTO main._cells (table_id, row_index, col_index, value)
         SELECT ?, row_index, col_index, value FROM source._cells WHERE table_id = ?",
        params![table.id, source_id],
    )?;
    tx.execute(
        "UPDATE main._tables SET row_count = (SELECT row_count FROM source._tables WHERE id = ?2)
         WHERE id = ?1",
        params![table.id, source_id],
    )?;
    tx.commit()?;
    Ok(table)
}
