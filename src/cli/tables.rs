// src/cli/tables.rs
// Per-key table commands

use super::{unknown_key, CliContext};
use crate::sheets::{AppendMode, Record, RowStore, SheetError, SheetResult};
use serde_json::json;
use tracing::debug;

fn open_table(ctx: &CliContext, key: &str) -> SheetResult<RowStore> {
    ctx.router()?.table(key)?.ok_or_else(|| unknown_key(key))
}

fn require_column(rows: &mut RowStore, key: &str, column: &str) -> SheetResult<()> {
    if rows.schema()?.position(column).is_none() {
        return Err(SheetError::UnknownColumn {
            table: key.to_string(),
            column: column.to_string(),
        });
    }
    Ok(())
}

pub fn create_table(ctx: &CliContext, key: &str) -> SheetResult<serde_json::Value> {
    let mut router = ctx.router()?;
    router.create_table(key)?;
    let location = router.location(key)?.ok_or_else(|| unknown_key(key))?;
    Ok(json!(location))
}

pub fn show(ctx: &CliContext, key: &str) -> SheetResult<serde_json::Value> {
    let mut rows = open_table(ctx, key)?;
    Ok(json!(rows.all()?))
}

pub fn append(
    ctx: &CliContext,
    key: &str,
    values: &[(String, String)],
) -> SheetResult<serde_json::Value> {
    let mut rows = open_table(ctx, key)?;
    for (column, _) in values {
        require_column(&mut rows, key, column)?;
    }
    let schema = rows.schema()?.clone();

    let record: Record = values.iter().cloned().collect();
    rows.append(&record, AppendMode::Immediate)?;
    rows.flush()?;
    debug!("Appended to '{}' as row {}", key, rows.last_row()?);
    Ok(json!(record.normalized(&schema)))
}

pub fn find(
    ctx: &CliContext,
    key: &str,
    column: &str,
    value: &str,
) -> SheetResult<serde_json::Value> {
    let mut rows = open_table(ctx, key)?;
    require_column(&mut rows, key, column)?;
    Ok(json!(rows.find(column, value)?))
}

pub fn delete(
    ctx: &CliContext,
    key: &str,
    column: &str,
    value: &str,
) -> SheetResult<serde_json::Value> {
    let mut rows = open_table(ctx, key)?;
    require_column(&mut rows, key, column)?;
    let deleted = rows.delete_where(|record, _| record.get(column) == value)?;
    rows.flush()?;
    Ok(json!({ "deleted": deleted }))
}
