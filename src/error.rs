//! Error types for the SQL runner.
//!
//! All fallible operations return [`DbResult`]. Engine failures carry the
//! backend they came from and the engine's own message text, which is
//! surfaced to callers unmodified.

use crate::models::Backend;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Query required")]
    EmptyQuery,

    #[error("Unknown backend: {backend}")]
    UnknownBackend { backend: String },

    #[error("{backend} is not connected")]
    BackendUnavailable { backend: Backend },

    #[error("{message}")]
    Engine {
        backend: Backend,
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Failed to save to history: {message}")]
    HistoryWriteFailed { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create an unknown backend error from the raw identifier the caller sent.
    pub fn unknown_backend(backend: impl Into<String>) -> Self {
        Self::UnknownBackend {
            backend: backend.into(),
        }
    }

    pub fn backend_unavailable(backend: Backend) -> Self {
        Self::BackendUnavailable { backend }
    }

    /// Create an engine error with optional SQL state.
    pub fn engine(backend: Backend, message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Engine {
            backend,
            message: message.into(),
            sql_state,
        }
    }

    /// Map a driver error raised while talking to `backend`.
    ///
    /// Database errors keep the server's message text; everything else uses
    /// the driver's display form.
    pub fn from_engine(backend: Backend, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                Self::engine(backend, db_err.message(), code)
            }
            other => Self::engine(backend, other.to_string(), None),
        }
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn history_write_failed(message: impl Into<String>) -> Self {
        Self::HistoryWriteFailed {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::BackendUnavailable { .. } => {
                Some("Check that the database server is running; availability is re-checked periodically")
            }
            Self::Unauthorized { .. } => {
                Some("Include a valid token: 'Authorization: Bearer <token>'")
            }
            _ => None,
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "EMPTY_QUERY",
            Self::UnknownBackend { .. } => "UNKNOWN_BACKEND",
            Self::BackendUnavailable { .. } => "BACKEND_UNAVAILABLE",
            Self::Engine { .. } => "ENGINE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::HistoryWriteFailed { .. } => "HISTORY_WRITE_FAILED",
            Self::Connection { .. } => "CONNECTION_FAILED",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyQuery | Self::UnknownBackend { .. } | Self::InvalidInput { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Engine { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BackendUnavailable { .. } | Self::Connection { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::HistoryWriteFailed { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Driver errors that mean the backend itself is unreachable, as opposed
    /// to a problem with the statement. `PoolTimedOut` is not one of them on
    /// its own: a saturated pool times out against a healthy server.
    pub fn is_connectivity(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Io(_) | sqlx::Error::PoolClosed)
    }
}

/// Convert sqlx errors that are not tied to a user-selected backend
/// (history store, startup).
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::RowNotFound => DbError::internal("No rows returned"),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Restart the server")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Database(db_err) => DbError::internal(db_err.message().to_string()),
            _ => DbError::internal(format!("Database error: {}", err)),
        }
    }
}

/// Result type alias for runner operations.
pub type DbResult<T> = Result<T, DbError>;

/// `{success: false, error, code}` with the variant's status.
impl IntoResponse for DbError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "code": self.code(),
        });
        if let Some(suggestion) = self.suggestion() {
            body["suggestion"] = serde_json::Value::String(suggestion.to_string());
        }
        if let Self::Engine {
            sql_state: Some(state),
            ..
        } = &self
        {
            body["sqlState"] = serde_json::Value::String(state.clone());
        }
        (self.status_code(), Json(body)).into_response()
    }
}
