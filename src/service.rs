//! The runner's external interfaces behind one cloneable handle.
//!
//! HTTP handlers only translate between JSON and these calls; everything
//! that touches an adapter, the schema cache or history goes through here.

use crate::auth::Identity;
use crate::completion::CompletionEngine;
use crate::db::AdapterRegistry;
use crate::dispatch::QueryDispatcher;
use crate::error::{DbError, DbResult};
use crate::history::HistoryStore;
use crate::models::{
    Backend, BackendHealth, ColumnInfo, CompletionCandidate, CompletionRequest,
    CreateHistoryRequest, DatabaseSummary, ExecuteRequest, ExecutionResult, HistoryRecord,
    HistoryStatus, NewHistoryRecord, StatementKind,
};
use crate::schema_cache::{SchemaCache, SchemaSnapshot};
use crate::sql::{classify, split_statements};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct RunnerService {
    registry: Arc<AdapterRegistry>,
    schema: Arc<SchemaCache>,
    dispatcher: Arc<QueryDispatcher>,
    history: Arc<dyn HistoryStore>,
    completion: Arc<CompletionEngine>,
}

impl std::fmt::Debug for RunnerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerService")
            .field("registry", &self.registry)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl RunnerService {
    /// Wire the service over an already-initialized registry and history
    /// store. The schema cache is shared with the background refresh task.
    pub fn new(
        schema: Arc<SchemaCache>,
        history: Arc<dyn HistoryStore>,
        default_backend: Option<Backend>,
    ) -> Self {
        let registry = Arc::clone(schema.registry());
        let dispatcher = QueryDispatcher::new(Arc::clone(&registry), Arc::clone(&history))
            .with_default_backend(default_backend);
        Self {
            registry,
            schema,
            dispatcher: Arc::new(dispatcher),
            history,
            completion: Arc::new(CompletionEngine::new()),
        }
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    pub fn health(&self) -> Vec<BackendHealth> {
        self.registry.health()
    }

    pub async fn list_databases(&self) -> Vec<DatabaseSummary> {
        self.schema.list_databases().await
    }

    pub async fn describe_columns(&self, backend: &str, table: &str) -> DbResult<Vec<ColumnInfo>> {
        self.schema.describe_columns(backend, table).await
    }

    pub async fn execute(
        &self,
        request: ExecuteRequest,
        identity: &Identity,
    ) -> DbResult<ExecutionResult> {
        self.dispatcher.execute(request, identity.user_id()).await
    }

    /// Completion candidates at the requested cursor. A missing offset means
    /// the end of the text.
    pub async fn complete(&self, request: CompletionRequest) -> DbResult<Vec<CompletionCandidate>> {
        let backend = match request.backend.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Some(self.registry.resolve(id)?.backend()),
            _ => None,
        };
        let cursor = request
            .cursor_offset
            .unwrap_or_else(|| request.text.chars().count());
        let snapshot = self.schema.snapshot().await;
        Ok(self
            .completion
            .complete(&snapshot, &request.text, cursor, backend))
    }

    pub async fn refresh_schema(&self) -> Arc<SchemaSnapshot> {
        let snapshot = self.schema.refresh().await;
        info!(generation = self.schema.generation(), "Schema refreshed on request");
        snapshot
    }

    pub async fn list_history(&self, limit: Option<usize>) -> DbResult<Vec<HistoryRecord>> {
        self.history.list(limit).await
    }

    pub async fn get_history(&self, id: i64) -> DbResult<HistoryRecord> {
        self.history.get(id).await
    }

    /// Store a record supplied by the caller rather than produced by an
    /// execution. Kind comes from the first statement of the query.
    pub async fn create_history(
        &self,
        request: CreateHistoryRequest,
        identity: &Identity,
    ) -> DbResult<HistoryRecord> {
        if request.query.trim().is_empty() {
            return Err(DbError::EmptyQuery);
        }
        let backend = self.registry.resolve(request.backend.trim())?.backend();
        let kind = split_statements(&request.query)
            .first()
            .map(|sql| classify(sql))
            .unwrap_or(StatementKind::Unknown);

        self.history
            .create(NewHistoryRecord {
                query: request.query,
                backend,
                status: request.status.unwrap_or(HistoryStatus::Success),
                kind,
                message: request.message.unwrap_or_default(),
                user_id: identity.user_id(),
            })
            .await
    }

    pub async fn delete_history(&self, id: i64) -> DbResult<()> {
        self.history.delete(id).await
    }

    pub async fn clear_history(&self) -> DbResult<u64> {
        self.history.delete_all().await
    }

    /// Close every backend pool and the history store.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
        self.history.close().await;
        info!("Backends and history store closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{MemoryHistoryStore, SqliteHistoryStore};

    fn service() -> RunnerService {
        let registry = Arc::new(AdapterRegistry::default());
        let schema = Arc::new(SchemaCache::new(registry));
        RunnerService::new(schema, Arc::new(MemoryHistoryStore::new(10)), None)
    }

    #[tokio::test]
    async fn test_create_history_requires_query() {
        let svc = service();
        let err = svc
            .create_history(
                CreateHistoryRequest {
                    query: "  ".into(),
                    backend: "sqlite".into(),
                    status: None,
                    message: None,
                },
                &Identity::Anonymous,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_create_history_unconfigured_backend() {
        let svc = service();
        let err = svc
            .create_history(
                CreateHistoryRequest {
                    query: "SELECT 1".into(),
                    backend: "sqlite".into(),
                    status: None,
                    message: None,
                },
                &Identity::Anonymous,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UnknownBackend { .. }));
    }

    #[tokio::test]
    async fn test_complete_unknown_backend_filter() {
        let svc = service();
        let err = svc
            .complete(CompletionRequest {
                text: "SELECT".into(),
                cursor_offset: None,
                backend: Some("oracle".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UnknownBackend { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_closes_history_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let url = format!("sqlite:{}", dir.path().join("history.db").display());
        let history = Arc::new(SqliteHistoryStore::open(&url, 10).await.unwrap());
        let registry = Arc::new(AdapterRegistry::default());
        let svc = RunnerService::new(Arc::new(SchemaCache::new(registry)), history, None);

        assert!(svc.list_history(None).await.unwrap().is_empty());
        svc.shutdown().await;
        assert!(svc.list_history(None).await.is_err());
    }

    #[tokio::test]
    async fn test_complete_defaults_cursor_to_end() {
        let svc = service();
        let candidates = svc
            .complete(CompletionRequest {
                text: "SELE".into(),
                cursor_offset: None,
                backend: None,
            })
            .await
            .unwrap();
        assert_eq!(candidates[0].label, "SELECT");
    }
}
