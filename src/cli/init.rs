// src/cli/init.rs

use super::CliContext;
use crate::sheets::{DistributionRouter, RouterConfig, SheetResult};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub fn run(ctx: &mut CliContext, columns: &[String]) -> SheetResult<serde_json::Value> {
    let columns: Vec<String> = columns
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    let config = RouterConfig::new("")
        .with_sheet_limit(ctx.settings.sheet_limit)
        .with_folder(ctx.settings.folder_name.clone(), ctx.settings.base_folder.clone())
        .with_cache(ctx.settings.cache);
    let router = DistributionRouter::bootstrap(Arc::clone(&ctx.store), config, &columns)?;
    let index = router.index_document();
    info!("Initialised index document {} at {}", index.id, index.url);

    ctx.settings.index_document = Some(index.id.clone());
    Ok(json!({
        "index_document": index.id,
        "url": index.url,
        "columns": columns,
    }))
}
