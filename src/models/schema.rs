//! Schema-related data models.

use crate::models::Backend;
use serde::{Deserialize, Serialize};

/// One column as reported by an engine's catalog, normalized to `{name, type}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Entry of the ListDatabases response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSummary {
    #[serde(rename = "type")]
    pub backend: Backend,
    pub name: String,
    pub tables: Vec<String>,
    pub available: bool,
}

/// Availability of one configured backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendHealth {
    #[serde(rename = "type")]
    pub backend: Backend,
    pub name: String,
    pub available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_info_uses_type_key() {
        let col = ColumnInfo::new("id", "INTEGER");
        let json = serde_json::to_value(&col).unwrap();
        assert_eq!(json["name"], "id");
        assert_eq!(json["type"], "INTEGER");
    }

    #[test]
    fn test_database_summary_serialization() {
        let summary = DatabaseSummary {
            backend: Backend::Sqlite,
            name: "SQLite".into(),
            tables: vec!["users".into()],
            available: true,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["type"], "sqlite");
        assert_eq!(json["tables"][0], "users");
    }
}
