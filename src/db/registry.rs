//! Process-wide set of configured adapters, one per backend kind.
//!
//! The registry is built once at startup and is read-only afterwards, so it
//! is shared as a plain `Arc` with no lock.

use crate::config::DatabaseConfig;
use crate::db::adapter::EngineAdapter;
use crate::db::mysql::MySqlAdapter;
use crate::db::postgres::PostgresAdapter;
use crate::db::sqlite::SqliteAdapter;
use crate::error::{DbError, DbResult};
use crate::models::{Backend, BackendHealth, mask_connection_string};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<Backend, Arc<dyn EngineAdapter>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("backends", &self.backends())
            .finish()
    }
}

impl AdapterRegistry {
    /// Create an adapter for every configured backend and probe each once.
    ///
    /// A backend that cannot be reached is still registered; it stays
    /// unavailable until a later health check succeeds.
    pub async fn init(configs: &[DatabaseConfig]) -> DbResult<Self> {
        let mut adapters: Vec<Arc<dyn EngineAdapter>> = Vec::with_capacity(configs.len());
        for config in configs {
            info!(
                backend = %config.backend,
                name = %config.name,
                url = %mask_connection_string(&config.connection_string),
                "Registering backend"
            );
            let adapter: Arc<dyn EngineAdapter> = match config.backend {
                Backend::Sqlite => Arc::new(SqliteAdapter::connect_lazy(config)?),
                Backend::Postgres => Arc::new(PostgresAdapter::connect_lazy(config)?),
                Backend::MySql => Arc::new(MySqlAdapter::connect_lazy(config)?),
            };
            adapters.push(adapter);
        }

        let registry = Self::from_adapters(adapters)?;
        let health = registry.health_check_all().await;
        let available = health.iter().filter(|h| h.available).count();
        info!(
            configured = health.len(),
            available = available,
            "Backends initialized"
        );
        Ok(registry)
    }

    /// Build a registry from ready-made adapters.
    pub fn from_adapters(adapters: Vec<Arc<dyn EngineAdapter>>) -> DbResult<Self> {
        let mut map = BTreeMap::new();
        for adapter in adapters {
            let backend = adapter.backend();
            if map.insert(backend, adapter).is_some() {
                return Err(DbError::invalid_input(format!(
                    "{backend} is configured more than once"
                )));
            }
        }
        Ok(Self { adapters: map })
    }

    pub fn get(&self, backend: Backend) -> DbResult<Arc<dyn EngineAdapter>> {
        self.adapters
            .get(&backend)
            .cloned()
            .ok_or_else(|| DbError::unknown_backend(backend.as_str()))
    }

    /// Look up an adapter by the identifier a caller sent.
    pub fn resolve(&self, id: &str) -> DbResult<Arc<dyn EngineAdapter>> {
        let backend: Backend = id.parse()?;
        self.adapters
            .get(&backend)
            .cloned()
            .ok_or_else(|| DbError::unknown_backend(id))
    }

    /// Configured backends in stable order.
    pub fn backends(&self) -> Vec<Backend> {
        self.adapters.keys().copied().collect()
    }

    pub fn adapters(&self) -> impl Iterator<Item = &Arc<dyn EngineAdapter>> {
        self.adapters.values()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Current availability of every backend, without probing.
    pub fn health(&self) -> Vec<BackendHealth> {
        self.adapters
            .values()
            .map(|adapter| BackendHealth {
                backend: adapter.backend(),
                name: adapter.name().to_string(),
                available: adapter.is_available(),
            })
            .collect()
    }

    /// Probe every backend concurrently.
    pub async fn health_check_all(&self) -> Vec<BackendHealth> {
        let probes = self.adapters.values().map(|adapter| async move {
            let available = adapter.health_check().await;
            BackendHealth {
                backend: adapter.backend(),
                name: adapter.name().to_string(),
                available,
            }
        });
        join_all(probes).await
    }

    /// Close every pool.
    pub async fn shutdown(&self) {
        for (backend, adapter) in &self.adapters {
            info!(backend = %backend, "Closing connection");
            adapter.close().await;
        }
        info!("All connections closed");
    }
}
