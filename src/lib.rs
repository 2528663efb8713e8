//! sql-runner library
//!
//! Runs ad-hoc SQL batches against SQLite, PostgreSQL and MySQL backends,
//! keeps a cached schema inventory for browsing and completion, and records
//! every execution in a query history.

pub mod auth;
pub mod completion;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod models;
pub mod schema_cache;
pub mod server;
pub mod service;
pub mod sql;

pub use config::Config;
pub use error::{DbError, DbResult};
pub use service::RunnerService;
