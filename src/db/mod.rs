//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The `EngineAdapter` contract and one adapter per backend kind
//! - The adapter registry
//! - Type mappings

pub mod adapter;
pub mod mysql;
pub mod postgres;
pub mod registry;
pub mod sqlite;
pub mod types;

pub use adapter::{Availability, EngineAdapter};
pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use registry::AdapterRegistry;
pub use sqlite::SqliteAdapter;
pub use types::RowToJson;
