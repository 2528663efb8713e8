//! In-memory history store.
//!
//! Non-persistent; everything is lost when the process exits. This is the
//! default store and the one the tests use. Only the newest
//! [`RETAINED_PAGES`] pages of records are kept; older ones are dropped as
//! new records arrive.

use super::{HistoryStore, RESOURCE, clamp_limit};
use crate::error::{DbError, DbResult};
use crate::models::{HistoryRecord, NewHistoryRecord};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::{Mutex, RwLock};

/// Retention, in list pages.
pub const RETAINED_PAGES: usize = 10;

#[derive(Debug)]
pub struct MemoryHistoryStore {
    records: RwLock<BTreeMap<i64, HistoryRecord>>,
    next_id: Mutex<i64>,
    page_size: usize,
}

impl MemoryHistoryStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            next_id: Mutex::new(1),
            page_size,
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn create(&self, record: NewHistoryRecord) -> DbResult<HistoryRecord> {
        // Id assignment and insertion happen under one lock so ids and
        // creation times increase together.
        let mut next_id = self.next_id.lock().await;
        let id = *next_id;
        *next_id += 1;

        let record = HistoryRecord {
            id,
            query: record.query,
            backend: record.backend,
            status: record.status,
            kind: record.kind,
            message: record.message,
            user_id: record.user_id,
            created_at: Utc::now(),
        };
        let mut records = self.records.write().await;
        records.insert(id, record.clone());
        // Ids grow with creation time, so the first entries are the oldest
        let capacity = self.page_size.max(1) * RETAINED_PAGES;
        while records.len() > capacity {
            records.pop_first();
        }
        Ok(record)
    }

    async fn list(&self, limit: Option<usize>) -> DbResult<Vec<HistoryRecord>> {
        let limit = clamp_limit(limit, self.page_size);
        let records = self.records.read().await;
        let mut all: Vec<&HistoryRecord> = records.values().collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(all.into_iter().take(limit).cloned().collect())
    }

    async fn get(&self, id: i64) -> DbResult<HistoryRecord> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::not_found(RESOURCE, id))
    }

    async fn delete(&self, id: i64) -> DbResult<()> {
        match self.records.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(DbError::not_found(RESOURCE, id)),
        }
    }

    async fn delete_all(&self) -> DbResult<u64> {
        let mut records = self.records.write().await;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}
