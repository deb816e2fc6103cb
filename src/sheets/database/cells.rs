// src/sheets/database/cells.rs
// Range reads and writes against the sparse `_cells` table

use crate::sheets::definitions::{Grid, Row};
use crate::sheets::error::StoreResult;
use rusqlite::{params, Connection};

pub fn get_range(
    conn: &Connection,
    table_id: i64,
    row: usize,
    col: usize,
    num_rows: usize,
    num_cols: usize,
) -> StoreResult<Grid> {
    let mut grid = vec![vec![String::new(); num_cols]; num_rows];
    if num_rows == 0 || num_cols == 0 {
        return Ok(grid);
    }

    let mut stmt = conn.prepare(
        "SELECT row_index, col_index, value FROM _cells
         WHERE table_id = ?1
           AND row_index BETWEEN ?2 AND ?3
           AND col_index BETWEEN ?4 AND ?5",
    )?;
    let cells = stmt.query_map(
        params![
            table_id,
            row as i64,
            (row + num_rows - 1) as i64,
            col as i64,
            (col + num_cols - 1) as i64
        ],
        |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?, r.get::<_, String>(2)?)),
    )?;

    for cell in cells {
        let (r, c, value) = cell?;
        grid[r as usize - row][c as usize - col] = value;
    }
    Ok(grid)
}

/// Write `grid` with its top-left corner at (row, col). Empty strings clear
/// the cell; every written row counts towards the table's rows even if blank.
pub fn set_range(
    conn: &mut Connection,
    table_id: i64,
    row: usize,
    col: usize,
    grid: &[Row],
) -> StoreResult<()> {
    let tx = conn.transaction()?;
    {
        let mut upsert = tx.prepare(
            "INSERT OR REPLACE INTO _cells (table_id, row_index, col_index, value)
             VALUES (?, ?, ?, ?)",
        )?;
        let mut clear = tx.prepare(
            "DELETE FROM _cells WHERE table_id = ? AND row_index = ? AND col_index = ?",
        )?;
        for (r_off, cells) in grid.iter().enumerate() {
            let r = (row + r_off) as i64;
            for (c_off, value) in cells.iter().enumerate() {
                let c = (col + c_off) as i64;
                if value.is_empty() {
                    clear.execute(params![table_id, r, c])?;
                } else {
                    upsert.execute(params![table_id, r, c, value])?;
                }
            }
        }
    }
    if !grid.is_empty() {
        tx.execute(
            "UPDATE _tables SET row_count = MAX(row_count, ?) WHERE id = ?",
            params![(row + grid.len() - 1) as i64, table_id],
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Remove a row and shift every later row up by one. Row indices pass
/// through negative values so the primary key never collides mid-update.
pub fn delete_row(conn: &mut Connection, table_id: i64, row_index: usize) -> StoreResult<()> {
    let row_index = row_index as i64;
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM _cells WHERE table_id = ? AND row_index = ?",
        params![table_id, row_index],
    )?;
    tx.execute(
        "UPDATE _cells SET row_index = -(row_index - 1) WHERE table_id = ? AND row_index > ?",
        params![table_id, row_index],
    )?;
    tx.execute(
        "UPDATE _cells SET row_index = -row_index WHERE table_id = ? AND row_index < 0",
        params![table_id],
    )?;
    tx.execute(
        "UPDATE _tables SET row_count = row_count - 1 WHERE id = ? AND row_count >= ?",
        params![table_id, row_index],
    )?;
    tx.commit()?;
    Ok(())
}

/// Rows the table holds, trailing blank rows included.
pub fn last_row(conn: &Connection, table_id: i64) -> StoreResult<usize> {
    let last: i64 = conn.query_row(
        "SELECT row_count FROM _tables WHERE id = ?",
        params![table_id],
        |row| row.get(0),
    )?;
    Ok(last as usize)
}

pub fn last_column(conn: &Connection, table_id: i64) -> StoreResult<usize> {
    let last: i64 = conn.query_row(
        "SELECT COALESCE(MAX(col_index), 0) FROM _cells WHERE table_id = ?",
        params![table_id],
        |row| row.get(0),
    )?;
    Ok(last as usize)
}
