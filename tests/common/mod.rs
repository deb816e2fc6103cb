// tests/common/mod.rs
#![allow(dead_code)]

use sheetshard::{BackingStore, Document, MemoryStore, RowStore, SqliteStore};
use std::sync::Arc;
use tempfile::TempDir;

/// A backing store plus whatever keeps it alive.
pub struct Fixture {
    pub label: &'static str,
    pub store: Arc<dyn BackingStore>,
    _dir: Option<TempDir>,
}

pub fn memory() -> Fixture {
    Fixture {
        label: "memory",
        store: Arc::new(MemoryStore::new()),
        _dir: None,
    }
}

pub fn sqlite() -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let store = SqliteStore::open(dir.path()).expect("sqlite store");
    Fixture {
        label: "sqlite",
        store: Arc::new(store),
        _dir: Some(dir),
    }
}

pub fn both() -> Vec<Fixture> {
    vec![memory(), sqlite()]
}

pub fn header(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// A fresh document holding one table `name` with the given header.
pub fn table(fixture: &Fixture, name: &str, columns: &[&str], cache: bool) -> RowStore {
    let doc_ref = fixture.store.create_document("fixture").expect("create document");
    let mut doc = Document::from_ref(Arc::clone(&fixture.store), doc_ref, cache);
    doc.create_table(name, &header(columns)).expect("create table");
    doc.into_table(name)
        .expect("open table")
        .expect("table exists")
}
