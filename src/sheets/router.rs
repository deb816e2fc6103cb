// src/sheets/router.rs
//! Routes logical keys to physical (document, table) pairs.
//!
//! An index document holds three system tables: `documents` (known shards,
//! oldest first), `keys` (key -> table location) and `template` (the header
//! every provisioned table starts from). New tables always go to the newest
//! shard while it has room; once it is full a fresh shard is created. Older
//! shards with spare room are never revisited.

use super::backing::{BackingStore, DocumentRef};
use super::document::Document;
use super::error::{SheetError, SheetResult, StoreError};
use super::index::{
    DocumentIndex, DocumentIndexEntry, KeyIndex, KeyIndexEntry, DOCUMENT_INDEX_COLUMNS,
    KEY_INDEX_COLUMNS,
};
use super::row_store::RowStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const DOCUMENT_INDEX_TABLE: &str = "documents";
pub const KEY_INDEX_TABLE: &str = "keys";
pub const TEMPLATE_TABLE: &str = "template";

pub const DEFAULT_SHEET_LIMIT: usize = 200;
pub const DEFAULT_FOLDER_NAME: &str = "data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Id of the document holding the system tables.
    pub index_document: String,
    /// Data tables a shard may hold before a new shard is started.
    pub sheet_limit: usize,
    pub base_folder: Option<String>,
    pub folder_name: String,
    /// Open provisioned tables with a full in-memory snapshot.
    pub cache: bool,
}

impl RouterConfig {
    pub fn new(index_document: impl Into<String>) -> Self {
        Self {
            index_document: index_document.into(),
            sheet_limit: DEFAULT_SHEET_LIMIT,
            base_folder: None,
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            cache: false,
        }
    }

    pub fn with_sheet_limit(mut self, sheet_limit: usize) -> Self {
        self.sheet_limit = sheet_limit;
        self
    }

    pub fn with_folder(mut self, folder_name: impl Into<String>, base_folder: Option<String>) -> Self {
        self.folder_name = folder_name.into();
        self.base_folder = base_folder;
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn validate(&self) -> SheetResult<()> {
        if self.sheet_limit == 0 {
            return Err(SheetError::Config("sheet_limit must be at least 1".to_string()));
        }
        if self.folder_name.is_empty() {
            return Err(SheetError::Config("folder_name must not be empty".to_string()));
        }
        Ok(())
    }
}

pub struct DistributionRouter {
    store: Arc<dyn BackingStore>,
    config: RouterConfig,
    index_document: DocumentRef,
    documents: DocumentIndex,
    keys: KeyIndex,
}

impl DistributionRouter {
    /// Bind to an existing index document.
    pub fn open(store: Arc<dyn BackingStore>, config: RouterConfig) -> SheetResult<Self> {
        config.validate()?;
        let index_document = store.open_document(&config.index_document)?;
        let mut index = Document::from_ref(Arc::clone(&store), index_document.clone(), false);

        for required in [DOCUMENT_INDEX_TABLE, KEY_INDEX_TABLE, TEMPLATE_TABLE] {
            if !index.has_table(required)? {
                return Err(SheetError::MissingSystemTable {
                    document: index_document.id.clone(),
                    table: required.to_string(),
                });
            }
        }

        let documents = DocumentIndex::new(Self::take_table(&mut index, DOCUMENT_INDEX_TABLE)?);
        let keys = KeyIndex::new(Self::take_table(&mut index, KEY_INDEX_TABLE)?);
        debug!("Router bound to index document {}", index_document.id);

        Ok(Self {
            store,
            config,
            index_document,
            documents,
            keys,
        })
    }

    /// Create a fresh index document with empty system tables and a template
    /// whose header is `template_columns`, then bind to it. The
    /// `index_document` field of `config` is replaced by the new id.
    pub fn bootstrap(
        store: Arc<dyn BackingStore>,
        mut config: RouterConfig,
        template_columns: &[String],
    ) -> SheetResult<Self> {
        config.validate()?;
        if template_columns.is_empty() {
            return Err(SheetError::Config(
                "template needs at least one column".to_string(),
            ));
        }

        let doc = store.create_document("sheetshard index")?;
        let mut index = Document::from_ref(Arc::clone(&store), doc.clone(), false);
        index.create_table(DOCUMENT_INDEX_TABLE, &to_header(&DOCUMENT_INDEX_COLUMNS))?;
        index.create_table(KEY_INDEX_TABLE, &to_header(&KEY_INDEX_COLUMNS))?;
        index.create_table(TEMPLATE_TABLE, template_columns)?;
        info!("Bootstrapped index document {}", doc.id);

        config.index_document = doc.id;
        Self::open(store, config)
    }

    fn take_table(doc: &mut Document, name: &str) -> SheetResult<RowStore> {
        let document = doc.id().to_string();
        doc.take_table(name)?
            .ok_or_else(|| SheetError::MissingSystemTable {
                document,
                table: name.to_string(),
            })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn index_document(&self) -> &DocumentRef {
        &self.index_document
    }

    /// Known shards, oldest first.
    pub fn documents(&mut self) -> SheetResult<Vec<DocumentIndexEntry>> {
        Ok(self.documents.entries()?)
    }

    pub fn keys(&mut self) -> SheetResult<Vec<KeyIndexEntry>> {
        Ok(self.keys.entries()?)
    }

    /// The newest shard if it still has room, otherwise a brand-new one.
    pub fn available_shard(&mut self) -> SheetResult<Document> {
        let Some(latest) = self.documents.latest()? else {
            return self.create_shard();
        };

        let shard = Document::open(Arc::clone(&self.store), &latest.docid, self.config.cache)?;
        let used = data_table_count(&shard)?;
        if used < self.config.sheet_limit {
            debug!(
                "Shard {} has room ({}/{})",
                latest.docid, used, self.config.sheet_limit
            );
            return Ok(shard);
        }

        info!(
            "Shard {} is full ({}/{}), starting a new one",
            latest.docid, used, self.config.sheet_limit
        );
        self.create_shard()
    }

    /// Provision a new shard document, file it under the configured folder and
    /// record it in the document index.
    pub fn create_shard(&mut self) -> SheetResult<Document> {
        let name = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let created = self.store.create_document(&name)?;
        let shard = Document::from_ref(Arc::clone(&self.store), created, self.config.cache);
        shard.move_to_folder(&self.config.folder_name, self.config.base_folder.as_deref())?;

        // The url can change with the move.
        let placed = self.store.open_document(shard.id())?;
        self.documents.push(&DocumentIndexEntry {
            docid: placed.id.clone(),
            url: placed.url.clone(),
        })?;
        info!("Created shard {} ('{}')", placed.id, placed.name);

        Ok(Document::from_ref(
            Arc::clone(&self.store),
            placed,
            self.config.cache,
        ))
    }

    pub fn has_key(&mut self, key: &str) -> SheetResult<bool> {
        Ok(self.keys.contains(key)?)
    }

    /// Where `key` lives. The recorded `sheetid` and url are refreshed from
    /// the live table of the same name, since a transaction on the shard
    /// re-creates its tables under new ids.
    pub fn location(&mut self, key: &str) -> SheetResult<Option<KeyIndexEntry>> {
        let Some(mut entry) = self.keys.get(key)? else {
            return Ok(None);
        };
        let live = self
            .store
            .list_tables(&entry.docid)?
            .into_iter()
            .find(|t| t.name == entry.sheetname);
        if let Some(table) = live {
            if table.id != entry.sheetid {
                debug!(
                    "Key '{}' recorded sheetid {}, table now has id {}",
                    key, entry.sheetid, table.id
                );
                let shard = self.store.open_document(&entry.docid)?;
                entry.sheetid = table.id;
                entry.url = format!("{}#gid={}", shard.url, table.id);
            }
        }
        Ok(Some(entry))
    }

    /// The table provisioned for `key`, if any.
    pub fn table(&mut self, key: &str) -> SheetResult<Option<RowStore>> {
        let Some(location) = self.keys.get(key)? else {
            return Ok(None);
        };
        let doc = Document::open(Arc::clone(&self.store), &location.docid, self.config.cache)?;
        Ok(doc.into_table(&location.sheetname)?)
    }

    /// Return the table for `key`, provisioning it from the template first if
    /// the key is new.
    pub fn create_table(&mut self, key: &str) -> SheetResult<RowStore> {
        validate_key(key)?;
        if let Some(location) = self.keys.get(key)? {
            return self.table(key)?.ok_or_else(|| {
                SheetError::Store(StoreError::TableNotFound {
                    document: location.docid,
                    table: location.sheetname,
                })
            });
        }

        let mut shard = self.available_shard()?;
        self.ensure_template(&shard)?;

        let shard_id = shard.id().to_string();
        let template = shard
            .table(TEMPLATE_TABLE)?
            .ok_or_else(|| StoreError::TableNotFound {
                document: shard_id.clone(),
                table: TEMPLATE_TABLE.to_string(),
            })?;
        let rows = template.duplicate_as(key)?;

        self.keys.insert(&KeyIndexEntry {
            key: key.to_string(),
            sheetid: rows.id(),
            docid: shard_id.clone(),
            sheetname: key.to_string(),
            url: format!("{}#gid={}", shard.url(), rows.id()),
        })?;
        info!("Provisioned table '{}' in shard {}", key, shard_id);
        Ok(rows)
    }

    /// Copy the global template into `shard` unless it already has one.
    fn ensure_template(&self, shard: &Document) -> SheetResult<()> {
        if shard.has_table(TEMPLATE_TABLE)? {
            return Ok(());
        }
        let template = self
            .store
            .list_tables(&self.index_document.id)?
            .into_iter()
            .find(|t| t.name == TEMPLATE_TABLE)
            .ok_or_else(|| SheetError::MissingSystemTable {
                document: self.index_document.id.clone(),
                table: TEMPLATE_TABLE.to_string(),
            })?;
        let source = RowStore::open(
            Arc::clone(&self.store),
            self.index_document.id.clone(),
            template,
            false,
        )?;
        source.copy_to(shard.id())?;
        debug!("Copied template into shard {}", shard.id());
        Ok(())
    }
}

/// Tables in a shard that count against the limit; the template does not.
fn data_table_count(shard: &Document) -> SheetResult<usize> {
    let names = shard.table_names()?;
    Ok(names.iter().filter(|name| *name != TEMPLATE_TABLE).count())
}

fn validate_key(key: &str) -> SheetResult<()> {
    if key.trim().is_empty() || key == TEMPLATE_TABLE {
        return Err(SheetError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn to_header(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}
