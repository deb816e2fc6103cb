// src/lib.rs
//! Key-addressed tables sharded across size-limited backing documents.

pub mod cli;
pub mod settings;
pub mod sheets;

pub use sheets::{
    with_transaction, AppendMode, BackingStore, DistributionRouter, Document, DocumentRef,
    MemoryStore, Record, RouterConfig, RowStore, SheetError, SheetResult, SqliteStore,
    StoreError, StoreResult, TableRef, TableSchema,
};
