//! Data models for the SQL runner.
//!
//! This module re-exports all model types used throughout the application.

pub mod backend;
pub mod completion;
pub mod history;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use backend::{Backend, mask_connection_string};
pub use completion::{CandidateCategory, CompletionCandidate, CompletionRequest};
pub use history::{CreateHistoryRequest, HistoryRecord, HistoryStatus, NewHistoryRecord};
pub use query::{
    ExecuteRequest, ExecutionResult, MutationSummary, RowSet, Statement, StatementKind,
};
pub use schema::{BackendHealth, ColumnInfo, DatabaseSummary};
