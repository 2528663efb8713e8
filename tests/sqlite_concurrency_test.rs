//! Concurrent requests against one SQLite file.

use sql_runner::config::DatabaseConfig;
use sql_runner::db::AdapterRegistry;
use sql_runner::dispatch::QueryDispatcher;
use sql_runner::error::DbError;
use sql_runner::history::{HistoryStore, MemoryHistoryStore};
use sql_runner::models::{Backend, ExecuteRequest, HistoryStatus};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

/// Counts to `n` in a recursive CTE; keeps the pool's connection busy for a while.
fn slow_count(n: u64) -> String {
    format!(
        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < {n}) \
         SELECT count(*) AS n FROM c"
    )
}

async fn setup(
    dir: &TempDir,
    pool_query: &str,
) -> (Arc<AdapterRegistry>, Arc<QueryDispatcher>, Arc<MemoryHistoryStore>) {
    let path = dir.path().join("concurrent.db");
    let config = DatabaseConfig::parse(&format!("sqlite:{}?{pool_query}", path.display())).unwrap();
    let registry = Arc::new(AdapterRegistry::init(&[config]).await.unwrap());
    let history = Arc::new(MemoryHistoryStore::new(100));
    let dispatcher = Arc::new(QueryDispatcher::new(Arc::clone(&registry), history.clone()));
    (registry, dispatcher, history)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_are_serialized() {
    let dir = TempDir::new().unwrap();
    let (_, dispatcher, history) = setup(&dir, "max_connections=4").await;
    assert_ok!(
        dispatcher
            .execute(
                ExecuteRequest::new("CREATE TABLE events(id INTEGER PRIMARY KEY, n INTEGER)", "sqlite"),
                None,
            )
            .await
    );

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                dispatcher
                    .execute(
                        ExecuteRequest::new(format!("INSERT INTO events(n) VALUES ({i})"), "sqlite"),
                        None,
                    )
                    .await
            })
        })
        .collect();
    for handle in handles {
        let result = assert_ok!(handle.await.unwrap());
        assert_eq!(result.as_mutation().unwrap().affected, 1);
    }

    let result = assert_ok!(
        dispatcher
            .execute(ExecuteRequest::new("SELECT count(*) AS n FROM events", "sqlite"), None)
            .await
    );
    assert_eq!(result.as_rows().unwrap().rows[0]["n"], 20);

    let records = history.list(None).await.unwrap();
    assert_eq!(records.len(), 22);
    assert!(records.iter().all(|r| r.status == HistoryStatus::Success));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_busy_pool_does_not_mark_backend_down() {
    let dir = TempDir::new().unwrap();
    let (registry, dispatcher, _) = setup(&dir, "acquire_timeout=1").await;
    let adapter = registry.get(Backend::Sqlite).unwrap();
    assert!(adapter.is_available());

    let long = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            dispatcher
                .execute(ExecuteRequest::new(slow_count(20_000_000), "sqlite"), None)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Either gets the connection once the long query ends or times out
    // waiting for it; neither means the backend is gone.
    let concurrent = dispatcher
        .execute(ExecuteRequest::new("SELECT 1", "sqlite"), None)
        .await;
    if let Err(err) = concurrent {
        assert!(matches!(err, DbError::Engine { .. }), "{err:?}");
    }
    assert!(adapter.health_check().await);

    assert_ok!(long.await.unwrap());
    assert!(adapter.is_available());
    assert_ok!(
        dispatcher
            .execute(ExecuteRequest::new("SELECT 1", "sqlite"), None)
            .await
    );
}

#[tokio::test]
async fn test_closed_pool_marks_backend_down() {
    let dir = TempDir::new().unwrap();
    let (registry, dispatcher, _) = setup(&dir, "max_connections=2").await;
    let adapter = registry.get(Backend::Sqlite).unwrap();

    adapter.close().await;
    let err = assert_err!(
        dispatcher
            .execute(ExecuteRequest::new("SELECT 1", "sqlite"), None)
            .await
    );
    assert!(matches!(err, DbError::Engine { .. }), "{err:?}");
    assert!(!adapter.is_available());

    let err = assert_err!(
        dispatcher
            .execute(ExecuteRequest::new("SELECT 1", "sqlite"), None)
            .await
    );
    assert!(matches!(err, DbError::BackendUnavailable { .. }));
}
