//! SQLite adapter.
//!
//! SQLite allows one writer at a time. Writes and statements of unknown kind
//! go through `write_lock` so concurrent requests queue here instead of
//! failing with `SQLITE_BUSY`.

use crate::config::DatabaseConfig;
use crate::db::adapter::{Availability, EngineAdapter};
use crate::db::types::rows_to_set;
use crate::error::{DbError, DbResult};
use crate::models::{
    Backend, ColumnInfo, ExecutionResult, MutationSummary, Statement, StatementKind,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteRow};
use sqlx::{Column, Executor, Row, Statement as _};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

mod queries {
    pub const LIST_TABLES: &str = "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

    pub const DESCRIBE_COLUMNS: &str = "SELECT name, type FROM pragma_table_info(?) ORDER BY cid";
}

pub struct SqliteAdapter {
    name: String,
    pool: SqlitePool,
    available: Availability,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for SqliteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAdapter")
            .field("name", &self.name)
            .field("available", &self.available.get())
            .finish_non_exhaustive()
    }
}

impl SqliteAdapter {
    /// Build the adapter without opening a connection. Call
    /// [`EngineAdapter::health_check`] to connect and mark it available.
    pub fn connect_lazy(config: &DatabaseConfig) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.connection_string)
            .map_err(|e| {
                DbError::connection(
                    format!("Invalid SQLite connection string: {}", e),
                    "Check the connection URL format: sqlite:path/to/db.sqlite",
                )
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = config
            .pool_options
            .builder(Backend::Sqlite)
            .connect_lazy_with(options);

        Ok(Self {
            name: config.name.clone(),
            pool,
            available: Availability::default(),
            write_lock: Mutex::new(()),
        })
    }

    async fn fetch(&self, statement: &Statement) -> Result<ExecutionResult, sqlx::Error> {
        let rows: Vec<SqliteRow> = self.pool.fetch_all(statement.sql.as_str()).await?;
        let columns = if rows.is_empty() && statement.kind == StatementKind::Read {
            self.describe_result_columns(&statement.sql).await
        } else {
            Vec::new()
        };
        Ok(ExecutionResult::Rows(rows_to_set(&rows, columns)))
    }

    async fn run(&self, statement: &Statement) -> Result<ExecutionResult, sqlx::Error> {
        let done = self.pool.execute(statement.sql.as_str()).await?;
        let inserted_id = Some(done.last_insert_rowid()).filter(|id| statement.is_insert() && *id > 0);
        Ok(ExecutionResult::Mutation(MutationSummary::new(
            done.rows_affected(),
            inserted_id,
        )))
    }

    async fn describe_result_columns(&self, sql: &str) -> Vec<String> {
        match self.pool.prepare(sql).await {
            Ok(prepared) => prepared
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl EngineAdapter for SqliteAdapter {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tables(&self) -> DbResult<Vec<String>> {
        let rows = sqlx::query(queries::LIST_TABLES)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.available.engine_error(Backend::Sqlite, e, self.pool.size()))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>("name").ok())
            .collect())
    }

    async fn describe_table(&self, table: &str) -> DbResult<Vec<ColumnInfo>> {
        let rows = sqlx::query(queries::DESCRIBE_COLUMNS)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.available.engine_error(Backend::Sqlite, e, self.pool.size()))?;
        Ok(rows
            .iter()
            .map(|row| {
                ColumnInfo::new(
                    row.try_get::<String, _>("name").unwrap_or_default(),
                    row.try_get::<String, _>("type").unwrap_or_default(),
                )
            })
            .collect())
    }

    async fn execute(&self, statement: &Statement) -> DbResult<ExecutionResult> {
        if !self.available.get() {
            return Err(DbError::backend_unavailable(Backend::Sqlite));
        }

        let _guard = match statement.kind {
            StatementKind::Read => None,
            StatementKind::Write | StatementKind::Unknown => Some(self.write_lock.lock().await),
        };

        debug!(kind = %statement.kind, sql = %statement.sql, "Executing statement");
        let result = if statement.kind.returns_rows() {
            self.fetch(statement).await
        } else {
            self.run(statement).await
        };
        result.map_err(|e| self.available.engine_error(Backend::Sqlite, e, self.pool.size()))
    }

    fn is_available(&self) -> bool {
        self.available.get()
    }

    async fn health_check(&self) -> bool {
        let probe = sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ());
        self.available.record_probe(Backend::Sqlite, &self.name, probe, self.pool.size())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::prepare;
    use tempfile::TempDir;

    async fn open_adapter(dir: &TempDir) -> SqliteAdapter {
        let path = dir.path().join("test.db");
        let config = DatabaseConfig::parse(&format!("sqlite:{}", path.display())).unwrap();
        let adapter = SqliteAdapter::connect_lazy(&config).unwrap();
        assert!(adapter.health_check().await);
        adapter
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let adapter = open_adapter(&dir).await;

        adapter
            .execute(&prepare("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)"))
            .await
            .unwrap();
        let result = adapter
            .execute(&prepare("INSERT INTO t (name) VALUES ('a')"))
            .await
            .unwrap();
        let mutation = result.as_mutation().unwrap();
        assert_eq!(mutation.affected, 1);
        assert_eq!(mutation.inserted_id, Some(1));

        let result = adapter
            .execute(&prepare("SELECT id, name FROM t"))
            .await
            .unwrap();
        let rows = result.as_rows().unwrap();
        assert_eq!(rows.columns, vec!["id", "name"]);
        assert_eq!(rows.row_count, 1);
        assert_eq!(rows.rows[0]["name"], "a");
    }

    #[tokio::test]
    async fn test_empty_select_keeps_columns() {
        let dir = TempDir::new().unwrap();
        let adapter = open_adapter(&dir).await;
        adapter
            .execute(&prepare("CREATE TABLE t (a INTEGER, b TEXT)"))
            .await
            .unwrap();

        let result = adapter.execute(&prepare("SELECT a, b FROM t")).await.unwrap();
        let rows = result.as_rows().unwrap();
        assert_eq!(rows.row_count, 0);
        assert_eq!(rows.columns, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_update_has_no_inserted_id() {
        let dir = TempDir::new().unwrap();
        let adapter = open_adapter(&dir).await;
        adapter
            .execute(&prepare("CREATE TABLE t (x INTEGER)"))
            .await
            .unwrap();
        adapter
            .execute(&prepare("INSERT INTO t VALUES (1)"))
            .await
            .unwrap();
        let result = adapter
            .execute(&prepare("UPDATE t SET x = 2"))
            .await
            .unwrap();
        assert_eq!(result.as_mutation().unwrap().inserted_id, None);
    }

    #[tokio::test]
    async fn test_introspection() {
        let dir = TempDir::new().unwrap();
        let adapter = open_adapter(&dir).await;
        adapter
            .execute(&prepare(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, email VARCHAR(255))",
            ))
            .await
            .unwrap();

        assert_eq!(adapter.list_tables().await.unwrap(), vec!["users"]);
        let columns = adapter.describe_table("users").await.unwrap();
        assert_eq!(
            columns,
            vec![
                ColumnInfo::new("id", "INTEGER"),
                ColumnInfo::new("email", "VARCHAR(255)")
            ]
        );
        assert!(adapter.describe_table("missing").await.unwrap().is_empty());
        // Names are bound, never spliced into the SQL
        assert!(
            adapter
                .describe_table("users'); DROP TABLE users; --")
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(adapter.list_tables().await.unwrap(), vec!["users"]);
    }

    #[tokio::test]
    async fn test_engine_error_message_verbatim() {
        let dir = TempDir::new().unwrap();
        let adapter = open_adapter(&dir).await;
        let err = adapter
            .execute(&prepare("SELECT * FROM missing"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such table: missing"));
        assert!(adapter.is_available());
    }

    #[tokio::test]
    async fn test_unavailable_before_health_check() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lazy.db");
        let config = DatabaseConfig::parse(&format!("sqlite:{}", path.display())).unwrap();
        let adapter = SqliteAdapter::connect_lazy(&config).unwrap();
        assert!(!adapter.is_available());
        let err = adapter.execute(&prepare("SELECT 1")).await.unwrap_err();
        assert!(matches!(err, DbError::BackendUnavailable { .. }));
    }
}
