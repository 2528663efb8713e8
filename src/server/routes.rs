//! HTTP routes over [`RunnerService`].
//!
//! Successful calls answer with the bare payload, or `{success: true, ...}`
//! for the execute and history mutation calls. Failures go through
//! [`DbError`]'s response mapping.

use crate::auth::{AuthConfig, Identity, identify, require_user};
use crate::error::DbError;
use crate::models::{CompletionRequest, CreateHistoryRequest, ExecuteRequest};
use crate::service::RunnerService;
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

type ApiResult = Result<Json<JsonValue>, DbError>;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Build the `/api` router.
///
/// Every route resolves the caller's identity; execute and history routes
/// additionally reject anonymous callers when authentication is required.
pub fn router(service: RunnerService, auth: Arc<AuthConfig>) -> Router {
    let attributed = Router::new()
        .route("/api/query", post(execute))
        .route(
            "/api/history",
            get(list_history).post(create_history).delete(clear_history),
        )
        .route(
            "/api/history/{id}",
            get(get_history).delete(delete_history),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&auth),
            require_user,
        ));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/databases", get(list_databases))
        .route("/api/columns/{backend}/{table}", get(describe_columns))
        .route("/api/complete", post(complete))
        .route("/api/schema/refresh", post(refresh_schema))
        .merge(attributed)
        .layer(middleware::from_fn_with_state(auth, identify))
        .with_state(service)
}

async fn health(State(service): State<RunnerService>) -> Json<JsonValue> {
    let backends = service.health();
    let status = if backends.iter().all(|b| b.available) {
        "ok"
    } else {
        "degraded"
    };
    Json(json!({ "status": status, "backends": backends }))
}

async fn list_databases(State(service): State<RunnerService>) -> Json<JsonValue> {
    Json(json!(service.list_databases().await))
}

async fn describe_columns(
    State(service): State<RunnerService>,
    Path((backend, table)): Path<(String, String)>,
) -> ApiResult {
    let columns = service.describe_columns(&backend, &table).await?;
    Ok(Json(json!(columns)))
}

async fn execute(
    State(service): State<RunnerService>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<ExecuteRequest>,
) -> ApiResult {
    let result = service.execute(request, &identity).await?;
    Ok(Json(json!({ "success": true, "result": result })))
}

async fn complete(
    State(service): State<RunnerService>,
    Json(request): Json<CompletionRequest>,
) -> ApiResult {
    let candidates = service.complete(request).await?;
    Ok(Json(json!(candidates)))
}

async fn refresh_schema(State(service): State<RunnerService>) -> Json<JsonValue> {
    let snapshot = service.refresh_schema().await;
    Json(json!({
        "success": true,
        "refreshedAt": snapshot.refreshed_at,
        "databases": service.list_databases().await,
    }))
}

async fn list_history(
    State(service): State<RunnerService>,
    Query(params): Query<HistoryQuery>,
) -> ApiResult {
    let records = service.list_history(params.limit).await?;
    Ok(Json(json!(records)))
}

async fn get_history(State(service): State<RunnerService>, Path(id): Path<i64>) -> ApiResult {
    let record = service.get_history(id).await?;
    Ok(Json(json!(record)))
}

async fn create_history(
    State(service): State<RunnerService>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreateHistoryRequest>,
) -> ApiResult {
    let record = service.create_history(request, &identity).await?;
    Ok(Json(json!({ "success": true, "id": record.id, "record": record })))
}

async fn delete_history(State(service): State<RunnerService>, Path(id): Path<i64>) -> ApiResult {
    service.delete_history(id).await?;
    Ok(Json(json!({ "success": true, "message": "Query deleted" })))
}

async fn clear_history(State(service): State<RunnerService>) -> ApiResult {
    let deleted = service.clear_history().await?;
    Ok(Json(json!({
        "success": true,
        "message": "All history cleared",
        "deleted": deleted,
    })))
}
