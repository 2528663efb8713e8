//! Query dispatch: validate, split, route to an adapter, record history.
//!
//! Statements of a batch run one after another on the chosen backend. The
//! first failure aborts the rest of the batch; statements that already ran
//! stay applied. Only the last statement's result is returned.

use crate::db::{AdapterRegistry, EngineAdapter};
use crate::error::{DbError, DbResult};
use crate::history::HistoryStore;
use crate::models::{
    Backend, ExecuteRequest, ExecutionResult, HistoryStatus, NewHistoryRecord, Statement,
    StatementKind,
};
use crate::sql::{prepare, split_statements};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

pub struct QueryDispatcher {
    registry: Arc<AdapterRegistry>,
    history: Arc<dyn HistoryStore>,
    default_backend: Option<Backend>,
}

impl std::fmt::Debug for QueryDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryDispatcher")
            .field("registry", &self.registry)
            .field("default_backend", &self.default_backend)
            .finish_non_exhaustive()
    }
}

impl QueryDispatcher {
    pub fn new(registry: Arc<AdapterRegistry>, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            registry,
            history,
            default_backend: None,
        }
    }

    /// Backend used when a request does not name one.
    pub fn with_default_backend(mut self, backend: Option<Backend>) -> Self {
        self.default_backend = backend;
        self
    }

    /// Execute a batch on one backend.
    ///
    /// Validation failures (`EmptyQuery`, `UnknownBackend`) are returned before
    /// any adapter is touched and leave no history. Every request that reaches
    /// an adapter leaves exactly one history record.
    pub async fn execute(
        &self,
        request: ExecuteRequest,
        user_id: Option<String>,
    ) -> DbResult<ExecutionResult> {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!(
            "execute",
            request_id = %request_id,
            backend = tracing::field::Empty
        );
        self.execute_inner(request, user_id)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &self,
        request: ExecuteRequest,
        user_id: Option<String>,
    ) -> DbResult<ExecutionResult> {
        let start = Instant::now();

        if request.query.trim().is_empty() {
            return Err(DbError::EmptyQuery);
        }
        let adapter = self.resolve(request.backend.as_deref())?;
        let backend = adapter.backend();
        tracing::Span::current().record("backend", backend.as_str());

        let statements: Vec<Statement> = split_statements(&request.query)
            .into_iter()
            .map(prepare)
            .collect();
        // Only terminators and whitespace
        if statements.is_empty() {
            return Err(DbError::EmptyQuery);
        }
        let kind = statements[0].kind;

        let outcome = if adapter.is_available() {
            run_batch(adapter.as_ref(), &statements).await
        } else {
            Err(DbError::backend_unavailable(backend))
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(result) => info!(
                statements = statements.len(),
                elapsed_ms = elapsed_ms,
                outcome = %result.summary(),
                "Query executed"
            ),
            Err(e) => info!(
                statements = statements.len(),
                elapsed_ms = elapsed_ms,
                error = %e,
                "Query failed"
            ),
        }

        self.record(&request.query, backend, kind, &outcome, user_id)
            .await;
        outcome
    }

    fn resolve(&self, requested: Option<&str>) -> DbResult<Arc<dyn EngineAdapter>> {
        match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => self.registry.resolve(id),
            None => match self.default_backend {
                Some(backend) => self.registry.get(backend),
                None => Err(DbError::unknown_backend("<unspecified>")),
            },
        }
    }

    /// Append the history record. Failures are logged, never returned.
    async fn record(
        &self,
        query: &str,
        backend: Backend,
        kind: StatementKind,
        outcome: &DbResult<ExecutionResult>,
        user_id: Option<String>,
    ) {
        let (status, message) = match outcome {
            Ok(result) => (HistoryStatus::Success, result.summary()),
            Err(e) => (HistoryStatus::Error, e.to_string()),
        };
        let record = NewHistoryRecord {
            query: query.to_string(),
            backend,
            status,
            kind,
            message,
            user_id,
        };
        if let Err(e) = self.history.create(record).await {
            let e = match e {
                e @ DbError::HistoryWriteFailed { .. } => e,
                other => DbError::history_write_failed(other.to_string()),
            };
            warn!(error = %e, "History write failed");
        }
    }
}

async fn run_batch(
    adapter: &dyn EngineAdapter,
    statements: &[Statement],
) -> DbResult<ExecutionResult> {
    let mut last = None;
    for (index, statement) in statements.iter().enumerate() {
        debug!(index = index, kind = %statement.kind, "Running statement");
        last = Some(adapter.execute(statement).await?);
    }
    last.ok_or(DbError::EmptyQuery)
}
