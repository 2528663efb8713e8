//! Periodically refreshed table/column inventory of every backend.
//!
//! A refresh builds a complete new [`SchemaSnapshot`] and publishes it with a
//! single pointer swap, so readers see either the old or the new snapshot and
//! never a partial one. Requests never wait for a refresh in progress.

use crate::db::{AdapterRegistry, EngineAdapter};
use crate::error::{DbError, DbResult};
use crate::models::{Backend, ColumnInfo, DatabaseSummary};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// One backend's part of a snapshot. Tables keep the order the engine
/// listed them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSchema {
    pub backend: Backend,
    pub name: String,
    pub tables: Vec<TableSchema>,
}

impl BackendSchema {
    /// Exact match first, then ASCII case-insensitive.
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .or_else(|| self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name)))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }
}

/// Immutable inventory published by one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSnapshot {
    pub backends: BTreeMap<Backend, BackendSchema>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl SchemaSnapshot {
    pub fn backend(&self, backend: Backend) -> Option<&BackendSchema> {
        self.backends.get(&backend)
    }

    /// Backends visible under an optional filter, in stable order.
    pub fn scoped(&self, filter: Option<Backend>) -> impl Iterator<Item = &BackendSchema> {
        self.backends
            .values()
            .filter(move |b| filter.is_none_or(|f| b.backend == f))
    }

    /// Find a table by name. Across backends the first match wins.
    pub fn find_table(&self, filter: Option<Backend>, name: &str) -> Option<&TableSchema> {
        self.scoped(filter).find_map(|b| b.table(name))
    }

    /// Table names under the filter, deduplicated with the first backend winning.
    pub fn table_names(&self, filter: Option<Backend>) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.scoped(filter)
            .flat_map(|b| b.tables.iter().map(|t| t.name.as_str()))
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

pub struct SchemaCache {
    registry: Arc<AdapterRegistry>,
    current: RwLock<Arc<SchemaSnapshot>>,
    refresh_lock: Mutex<()>,
    generation: AtomicU64,
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("registry", &self.registry)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SchemaCache {
    /// Create a cache holding an empty snapshot. Call [`refresh`](Self::refresh)
    /// before serving requests.
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            current: RwLock::new(Arc::new(SchemaSnapshot::default())),
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// The most recently published snapshot.
    pub async fn snapshot(&self) -> Arc<SchemaSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// Number of snapshots published so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Run one refresh cycle and publish the result.
    ///
    /// If another refresh is already running, waits for it and returns what
    /// it published instead of starting a second cycle.
    pub async fn refresh(&self) -> Arc<SchemaSnapshot> {
        let seen = self.generation();
        let _guard = self.refresh_lock.lock().await;
        if self.generation() != seen {
            return self.snapshot().await;
        }

        let start = Instant::now();
        self.registry.health_check_all().await;

        let loads = self.registry.adapters().map(|adapter| load_backend(adapter.as_ref()));
        let backends: BTreeMap<Backend, BackendSchema> = join_all(loads)
            .await
            .into_iter()
            .map(|schema| (schema.backend, schema))
            .collect();

        let snapshot = Arc::new(SchemaSnapshot {
            backends,
            refreshed_at: Some(Utc::now()),
        });
        *self.current.write().await = Arc::clone(&snapshot);
        self.generation.fetch_add(1, Ordering::AcqRel);

        debug!(
            backends = snapshot.backends.len(),
            tables = snapshot.backends.values().map(|b| b.tables.len()).sum::<usize>(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Schema snapshot refreshed"
        );
        snapshot
    }

    /// Start the background refresh loop.
    ///
    /// The first tick is skipped; callers run the initial refresh themselves
    /// so startup can wait for it.
    pub fn start_refresh_task(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        info!(interval_secs = period.as_secs(), "Starting schema refresh task");
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                self.refresh().await;
            }
        })
    }

    /// Every configured backend with its cached table list.
    pub async fn list_databases(&self) -> Vec<DatabaseSummary> {
        let snapshot = self.snapshot().await;
        self.registry
            .adapters()
            .map(|adapter| DatabaseSummary {
                backend: adapter.backend(),
                name: adapter.name().to_string(),
                tables: snapshot
                    .backend(adapter.backend())
                    .map(BackendSchema::table_names)
                    .unwrap_or_default(),
                available: adapter.is_available(),
            })
            .collect()
    }

    /// Columns of one table.
    ///
    /// Served from the snapshot; a table the snapshot does not know yet is
    /// looked up live.
    pub async fn describe_columns(&self, backend: &str, table: &str) -> DbResult<Vec<ColumnInfo>> {
        let adapter = self.registry.resolve(backend)?;
        let snapshot = self.snapshot().await;
        if let Some(cached) = snapshot
            .backend(adapter.backend())
            .and_then(|b| b.table(table))
        {
            return Ok(cached.columns.clone());
        }

        if !adapter.is_available() {
            return Err(DbError::backend_unavailable(adapter.backend()));
        }
        adapter.describe_table(table).await
    }
}

/// Load one backend's tables and columns. Failures degrade to empty lists.
async fn load_backend(adapter: &dyn EngineAdapter) -> BackendSchema {
    let backend = adapter.backend();
    let mut schema = BackendSchema {
        backend,
        name: adapter.name().to_string(),
        tables: Vec::new(),
    };
    if !adapter.is_available() {
        debug!(backend = %backend, "Skipping unavailable backend");
        return schema;
    }

    let names = match adapter.list_tables().await {
        Ok(names) => names,
        Err(e) => {
            warn!(backend = %backend, error = %e, "Failed to list tables");
            return schema;
        }
    };

    let described = join_all(names.iter().map(|name| adapter.describe_table(name))).await;
    schema.tables = names
        .into_iter()
        .zip(described)
        .map(|(name, columns)| {
            let columns = columns.unwrap_or_else(|e| {
                warn!(backend = %backend, table = %name, error = %e, "Failed to describe table");
                Vec::new()
            });
            TableSchema { name, columns }
        })
        .collect();
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SchemaSnapshot {
        let mut backends = BTreeMap::new();
        backends.insert(
            Backend::Sqlite,
            BackendSchema {
                backend: Backend::Sqlite,
                name: "SQLite".into(),
                tables: vec![
                    TableSchema {
                        name: "users".into(),
                        columns: vec![ColumnInfo::new("id", "INTEGER")],
                    },
                    TableSchema {
                        name: "orders".into(),
                        columns: vec![],
                    },
                ],
            },
        );
        backends.insert(
            Backend::MySql,
            BackendSchema {
                backend: Backend::MySql,
                name: "MySQL".into(),
                tables: vec![TableSchema {
                    name: "Users".into(),
                    columns: vec![ColumnInfo::new("email", "varchar(255)")],
                }],
            },
        );
        SchemaSnapshot {
            backends,
            refreshed_at: None,
        }
    }

    #[test]
    fn test_find_table_case_insensitive() {
        let snap = snapshot();
        let table = snap.find_table(Some(Backend::Sqlite), "USERS").unwrap();
        assert_eq!(table.name, "users");
        let table = snap.find_table(Some(Backend::MySql), "users").unwrap();
        assert_eq!(table.name, "Users");
        assert!(snap.find_table(Some(Backend::Postgres), "users").is_none());
    }

    #[test]
    fn test_table_names_first_backend_wins() {
        let snap = snapshot();
        // BTreeMap order: Sqlite < Postgres < MySql
        assert_eq!(snap.table_names(None), vec!["users", "orders", "Users"]);
        assert_eq!(snap.table_names(Some(Backend::MySql)), vec!["Users"]);
    }

    #[tokio::test]
    async fn test_empty_registry_refresh() {
        let cache = SchemaCache::new(Arc::new(AdapterRegistry::default()));
        assert_eq!(cache.generation(), 0);
        let snap = cache.refresh().await;
        assert!(snap.backends.is_empty());
        assert!(snap.refreshed_at.is_some());
        assert_eq!(cache.generation(), 1);
        assert!(cache.list_databases().await.is_empty());
    }
}
