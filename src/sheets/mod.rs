// src/sheets/mod.rs

pub mod backing;
pub mod database;
pub mod definitions;
pub mod document;
pub mod error;
pub mod index;
pub mod memory_store;
pub mod router;
pub mod row_store;

pub use backing::{BackingStore, DocumentRef, TableRef};
pub use database::SqliteStore;
pub use definitions::{AppendMode, Grid, Record, Row, RowInput, TableSchema};
pub use document::{with_transaction, Document};
pub use error::{SheetError, SheetResult, StoreError, StoreResult};
pub use index::{DocumentIndexEntry, KeyIndexEntry};
pub use memory_store::MemoryStore;
pub use router::{DistributionRouter, RouterConfig};
pub use row_store::RowStore;
