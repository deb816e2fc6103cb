// src/sheets/database/checkpoint.rs
//! Documents run in WAL mode, so recent writes can sit in the `-wal` file
//! rather than the main database file. Anything that copies or moves the
//! file itself must checkpoint first or the copy silently misses them.

use crate::sheets::error::StoreResult;
use rusqlite::Connection;
use std::path::Path;
use tracing::trace;

/// Force a WAL checkpoint and truncate the WAL file.
pub fn checkpoint_database(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
    trace!("WAL checkpoint completed");
    Ok(())
}

/// Checkpoint a document file by path.
pub fn checkpoint_database_file(db_path: &Path) -> StoreResult<()> {
    if !db_path.exists() {
        return Ok(());
    }

    let conn = Connection::open(db_path)?;
    checkpoint_database(&conn)?;
    Ok(())
}

/// Paths of the WAL side files SQLite keeps next to `db_path`.
pub fn side_files(db_path: &Path) -> [std::path::PathBuf; 2] {
    let base = db_path.as_os_str().to_owned();
    let mut wal = base.clone();
    wal.push("-wal");
    let mut shm = base;
    shm.push("-shm");
    [wal.into(), shm.into()]
}
