//! Query history persistence.
//!
//! Records are append-only from the dispatcher's side; the history endpoints
//! can also create records explicitly and delete them.

mod memory;
mod sqlite;

pub use memory::MemoryHistoryStore;
pub use sqlite::SqliteHistoryStore;

use crate::config::HistoryBackend;
use crate::error::DbResult;
use crate::models::{HistoryRecord, NewHistoryRecord};
use async_trait::async_trait;
use std::sync::Arc;

/// Resource name used in `NotFound` errors.
pub const RESOURCE: &str = "history record";

/// Storage for executed-query records.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist a record, assigning its id and creation time.
    async fn create(&self, record: NewHistoryRecord) -> DbResult<HistoryRecord>;

    /// Newest first. `None` means one full page; larger values are capped.
    async fn list(&self, limit: Option<usize>) -> DbResult<Vec<HistoryRecord>>;

    /// Fetch one record, or `NotFound`.
    async fn get(&self, id: i64) -> DbResult<HistoryRecord>;

    /// Remove one record, or `NotFound` if it does not exist.
    async fn delete(&self, id: i64) -> DbResult<()>;

    /// Remove every record. Returns how many were removed; an empty store
    /// is not an error.
    async fn delete_all(&self) -> DbResult<u64>;

    /// Release the underlying storage. Calls after this may fail.
    async fn close(&self) {}
}

/// Clamp a requested page length to `[1, page_size]`.
pub fn clamp_limit(limit: Option<usize>, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    limit.unwrap_or(page_size).clamp(1, page_size)
}

/// Open the store selected by configuration.
pub async fn open(backend: &HistoryBackend, page_size: usize) -> DbResult<Arc<dyn HistoryStore>> {
    match backend {
        HistoryBackend::Memory => Ok(Arc::new(MemoryHistoryStore::new(page_size))),
        HistoryBackend::Sqlite(url) => Ok(Arc::new(SqliteHistoryStore::open(url, page_size).await?)),
    }
}
