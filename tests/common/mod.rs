//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sql_runner::db::{AdapterRegistry, EngineAdapter};
use sql_runner::error::{DbError, DbResult};
use sql_runner::models::{
    Backend, ColumnInfo, ExecutionResult, MutationSummary, RowSet, Statement, StatementKind,
};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-process adapter that records every call it receives.
///
/// Read and unknown statements return one row `{"sql": <statement>}`; write
/// statements report one affected row. A statement containing `fail_on`
/// fails with an engine error.
pub struct FakeAdapter {
    backend: Backend,
    tables: Mutex<Vec<(String, Vec<ColumnInfo>)>>,
    available: AtomicBool,
    fail_list_tables: AtomicBool,
    fail_describe: Mutex<Option<String>>,
    fail_on: Mutex<Option<String>>,
    executed: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl FakeAdapter {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            tables: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            fail_list_tables: AtomicBool::new(false),
            fail_describe: Mutex::new(None),
            fail_on: Mutex::new(None),
            executed: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_table(self, name: &str, columns: &[(&str, &str)]) -> Self {
        self.add_table(name, columns);
        self
    }

    pub fn add_table(&self, name: &str, columns: &[(&str, &str)]) {
        let columns = columns
            .iter()
            .map(|(n, t)| ColumnInfo::new(*n, *t))
            .collect();
        self.tables.lock().unwrap().push((name.to_string(), columns));
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn fail_list_tables(&self, fail: bool) {
        self.fail_list_tables.store(fail, Ordering::SeqCst);
    }

    pub fn fail_describe(&self, table: &str) {
        *self.fail_describe.lock().unwrap() = Some(table.to_string());
    }

    pub fn fail_on(&self, fragment: &str) {
        *self.fail_on.lock().unwrap() = Some(fragment.to_string());
    }

    /// Statements passed to `execute`, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Total number of adapter calls of any kind except the flag getters.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineAdapter for FakeAdapter {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn name(&self) -> &str {
        self.backend.display_name()
    }

    async fn list_tables(&self) -> DbResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_tables.load(Ordering::SeqCst) {
            return Err(DbError::engine(self.backend, "catalog unavailable", None));
        }
        Ok(self
            .tables
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn describe_table(&self, table: &str) -> DbResult<Vec<ColumnInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_describe.lock().unwrap().as_deref() == Some(table) {
            return Err(DbError::engine(self.backend, "describe failed", None));
        }
        Ok(self
            .tables
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, columns)| columns.clone())
            .unwrap_or_default())
    }

    async fn execute(&self, statement: &Statement) -> DbResult<ExecutionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.executed.lock().unwrap().push(statement.sql.clone());

        let fail = self
            .fail_on
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|fragment| statement.sql.contains(fragment));
        if fail {
            return Err(DbError::engine(
                self.backend,
                format!("near \"{}\": syntax error", statement.keyword),
                None,
            ));
        }

        Ok(match statement.kind {
            StatementKind::Write => ExecutionResult::Mutation(MutationSummary::new(1, None)),
            StatementKind::Read | StatementKind::Unknown => {
                let mut row = serde_json::Map::new();
                row.insert("sql".into(), JsonValue::from(statement.sql.clone()));
                ExecutionResult::Rows(RowSet::new(vec!["sql".into()], vec![row]))
            }
        })
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn health_check(&self) -> bool {
        self.is_available()
    }

    async fn close(&self) {}
}

pub fn registry_of(adapters: Vec<std::sync::Arc<FakeAdapter>>) -> AdapterRegistry {
    AdapterRegistry::from_adapters(
        adapters
            .into_iter()
            .map(|a| a as std::sync::Arc<dyn EngineAdapter>)
            .collect(),
    )
    .unwrap()
}
