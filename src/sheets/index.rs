// src/sheets/index.rs
//! Typed views over the router's two system tables.

use super::definitions::{AppendMode, Record};
use super::error::{SheetError, SheetResult, StoreResult};
use super::row_store::RowStore;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DOCUMENT_INDEX_COLUMNS: [&str; 2] = ["docid", "url"];
pub const KEY_INDEX_COLUMNS: [&str; 5] = ["key", "sheetid", "docid", "sheetname", "url"];

/// One known shard. Rows are append-only, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIndexEntry {
    pub docid: String,
    pub url: String,
}

impl DocumentIndexEntry {
    fn from_record(record: &Record) -> Self {
        Self {
            docid: record.get("docid").to_string(),
            url: record.get("url").to_string(),
        }
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("docid", self.docid.as_str())
            .with("url", self.url.as_str())
    }
}

/// Where one logical key lives, as recorded when its table was provisioned.
/// `sheetname` is authoritative: a transaction on the shard re-creates its
/// tables, after which `sheetid` and the `#gid=` part of `url` are stale until
/// re-resolved (`DistributionRouter::location` does this).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyIndexEntry {
    pub key: String,
    pub sheetid: i64,
    pub docid: String,
    pub sheetname: String,
    pub url: String,
}

impl KeyIndexEntry {
    fn from_record(record: &Record) -> Self {
        let raw_id = record.get("sheetid");
        let sheetid = raw_id.parse().unwrap_or_else(|_| {
            warn!("Key index entry '{}' has a non-numeric sheetid '{}'", record.get("key"), raw_id);
            0
        });
        Self {
            key: record.get("key").to_string(),
            sheetid,
            docid: record.get("docid").to_string(),
            sheetname: record.get("sheetname").to_string(),
            url: record.get("url").to_string(),
        }
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("key", self.key.as_str())
            .with("sheetid", self.sheetid.to_string())
            .with("docid", self.docid.as_str())
            .with("sheetname", self.sheetname.as_str())
            .with("url", self.url.as_str())
    }
}

#[derive(Debug)]
pub struct DocumentIndex {
    rows: RowStore,
}

impl DocumentIndex {
    pub fn new(rows: RowStore) -> Self {
        Self { rows }
    }

    pub fn entries(&mut self) -> StoreResult<Vec<DocumentIndexEntry>> {
        Ok(self
            .rows
            .all()?
            .iter()
            .map(DocumentIndexEntry::from_record)
            .collect())
    }

    /// Most recently created shard.
    pub fn latest(&mut self) -> StoreResult<Option<DocumentIndexEntry>> {
        Ok(self.rows.last()?.as_ref().map(DocumentIndexEntry::from_record))
    }

    pub fn push(&mut self, entry: &DocumentIndexEntry) -> StoreResult<()> {
        self.rows.append(entry.to_record(), AppendMode::Immediate)
    }
}

/// Global key -> table mapping. Keys are unique across the whole index and
/// `insert` enforces it.
#[derive(Debug)]
pub struct KeyIndex {
    rows: RowStore,
}

impl KeyIndex {
    pub fn new(rows: RowStore) -> Self {
        Self { rows }
    }

    pub fn get(&mut self, key: &str) -> StoreResult<Option<KeyIndexEntry>> {
        Ok(self
            .rows
            .find("key", key)?
            .as_ref()
            .map(KeyIndexEntry::from_record))
    }

    pub fn contains(&mut self, key: &str) -> StoreResult<bool> {
        Ok(self.rows.row_index("key", key)?.is_some())
    }

    pub fn entries(&mut self) -> StoreResult<Vec<KeyIndexEntry>> {
        Ok(self
            .rows
            .all()?
            .iter()
            .map(KeyIndexEntry::from_record)
            .collect())
    }

    pub fn insert(&mut self, entry: &KeyIndexEntry) -> SheetResult<()> {
        if self.contains(&entry.key)? {
            return Err(SheetError::DuplicateKey(entry.key.clone()));
        }
        self.rows.append(entry.to_record(), AppendMode::Immediate)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::backing::BackingStore;
    use crate::sheets::memory_store::MemoryStore;
    use std::sync::Arc;

    fn system_table(columns: &[&str]) -> RowStore {
        let mem: Arc<dyn BackingStore> = Arc::new(MemoryStore::new());
        let doc = mem.create_document("index").unwrap();
        let table = mem.create_table(&doc.id, "t").unwrap();
        let header: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        mem.set_range(&doc.id, "t", 1, 1, &[header]).unwrap();
        RowStore::open(mem, doc.id, table, false).unwrap()
    }

    fn entry(key: &str, docid: &str) -> KeyIndexEntry {
        KeyIndexEntry {
            key: key.to_string(),
            sheetid: 7,
            docid: docid.to_string(),
            sheetname: key.to_string(),
            url: format!("memory://{}#gid=7", docid),
        }
    }

    #[test]
    fn test_key_index_rejects_duplicates() {
        let mut keys = KeyIndex::new(system_table(&KEY_INDEX_COLUMNS));
        keys.insert(&entry("alpha", "d1")).unwrap();
        let err = keys.insert(&entry("alpha", "d2")).unwrap_err();
        assert!(matches!(err, SheetError::DuplicateKey(ref k) if k == "alpha"));
        assert_eq!(keys.entries().unwrap().len(), 1);
        assert_eq!(keys.get("alpha").unwrap().unwrap().docid, "d1");
        assert!(keys.get("beta").unwrap().is_none());
    }

    #[test]
    fn test_document_index_latest_is_last_pushed() {
        let mut docs = DocumentIndex::new(system_table(&DOCUMENT_INDEX_COLUMNS));
        assert!(docs.latest().unwrap().is_none());
        for id in ["d1", "d2"] {
            docs.push(&DocumentIndexEntry {
                docid: id.to_string(),
                url: format!("memory://{}", id),
            })
            .unwrap();
        }
        assert_eq!(docs.latest().unwrap().unwrap().docid, "d2");
        assert_eq!(docs.entries().unwrap().len(), 2);
    }
}
