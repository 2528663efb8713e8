//! History persisted to an SQLite file in the `query_history` table.

use super::{HistoryStore, RESOURCE, clamp_limit};
use crate::error::{DbError, DbResult};
use crate::models::{Backend, HistoryRecord, HistoryStatus, NewHistoryRecord, StatementKind};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::str::FromStr;
use tracing::info;

mod queries {
    pub const CREATE_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS query_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            backend TEXT NOT NULL,
            status TEXT NOT NULL,
            kind TEXT NOT NULL,
            message TEXT NOT NULL,
            user_id TEXT,
            created_at TEXT NOT NULL
        )
    "#;

    pub const INSERT: &str = r#"
        INSERT INTO query_history (query, backend, status, kind, message, user_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
    "#;

    pub const LIST: &str = r#"
        SELECT id, query, backend, status, kind, message, user_id, created_at
        FROM query_history
        ORDER BY created_at DESC, id DESC
        LIMIT ?
    "#;

    pub const GET: &str = r#"
        SELECT id, query, backend, status, kind, message, user_id, created_at
        FROM query_history
        WHERE id = ?
    "#;

    pub const DELETE: &str = "DELETE FROM query_history WHERE id = ?";

    pub const DELETE_ALL: &str = "DELETE FROM query_history";
}

/// Timestamps are stored as fixed-width RFC 3339 text so they sort lexically.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn record_from_row(row: &SqliteRow) -> DbResult<HistoryRecord> {
    let corrupt = |field: &str, detail: String| {
        DbError::internal(format!("Corrupt history row ({field}): {detail}"))
    };

    let backend: String = row.try_get("backend")?;
    let status: String = row.try_get("status")?;
    let kind: String = row.try_get("kind")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(HistoryRecord {
        id: row.try_get("id")?,
        query: row.try_get("query")?,
        backend: backend
            .parse::<Backend>()
            .map_err(|e| corrupt("backend", e.to_string()))?,
        status: status
            .parse::<HistoryStatus>()
            .map_err(|e| corrupt("status", e))?,
        kind: kind
            .parse::<StatementKind>()
            .map_err(|e| corrupt("kind", e))?,
        message: row.try_get("message")?,
        user_id: row.try_get("user_id")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| corrupt("created_at", e.to_string()))?
            .with_timezone(&Utc),
    })
}

#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
    page_size: usize,
}

impl SqliteHistoryStore {
    /// Open (creating if needed) the history file at `url` and ensure the
    /// table exists.
    pub async fn open(url: &str, page_size: usize) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| {
                DbError::connection(
                    format!("Invalid history store URL: {}", e),
                    "Use 'memory' or sqlite:path/to/history.db",
                )
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(queries::CREATE_TABLE).execute(&pool).await?;
        info!(url = %url, "History store opened");

        Ok(Self { pool, page_size })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn create(&self, record: NewHistoryRecord) -> DbResult<HistoryRecord> {
        // Stored at microsecond precision; the returned record must match a later get
        let created_at = Utc::now().trunc_subsecs(6);
        let done = sqlx::query(queries::INSERT)
            .bind(&record.query)
            .bind(record.backend.as_str())
            .bind(record.status.as_str())
            .bind(record.kind.as_str())
            .bind(&record.message)
            .bind(record.user_id.as_deref())
            .bind(format_timestamp(&created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::history_write_failed(e.to_string()))?;

        Ok(HistoryRecord {
            id: done.last_insert_rowid(),
            query: record.query,
            backend: record.backend,
            status: record.status,
            kind: record.kind,
            message: record.message,
            user_id: record.user_id,
            created_at,
        })
    }

    async fn list(&self, limit: Option<usize>) -> DbResult<Vec<HistoryRecord>> {
        let limit = clamp_limit(limit, self.page_size) as i64;
        let rows = sqlx::query(queries::LIST)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn get(&self, id: i64) -> DbResult<HistoryRecord> {
        let row = sqlx::query(queries::GET)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => record_from_row(&row),
            None => Err(DbError::not_found(RESOURCE, id)),
        }
    }

    async fn delete(&self, id: i64) -> DbResult<()> {
        let done = sqlx::query(queries::DELETE)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(DbError::not_found(RESOURCE, id));
        }
        Ok(())
    }

    async fn delete_all(&self) -> DbResult<u64> {
        let done = sqlx::query(queries::DELETE_ALL)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
