// src/cli/index.rs

use super::CliContext;
use crate::sheets::SheetResult;
use serde_json::json;

pub fn documents(ctx: &CliContext) -> SheetResult<serde_json::Value> {
    Ok(json!(ctx.router()?.documents()?))
}

pub fn keys(ctx: &CliContext) -> SheetResult<serde_json::Value> {
    Ok(json!(ctx.router()?.keys()?))
}
