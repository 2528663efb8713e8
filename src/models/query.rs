//! Query-related data models.
//!
//! This module defines the execution request and the two result shapes a
//! statement can produce.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Lexical intent of a statement, derived from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Read,
    Write,
    Unknown,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the adapter should fetch a row-set for this kind.
    pub fn returns_rows(&self) -> bool {
        !matches!(self, Self::Write)
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StatementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("invalid statement kind: {other}")),
        }
    }
}

/// One trimmed, non-empty statement ready for an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub kind: StatementKind,
    /// Uppercased leading token, e.g. "INSERT".
    pub keyword: String,
}

impl Statement {
    /// True for statements that can produce an auto-generated row id.
    pub fn is_insert(&self) -> bool {
        matches!(self.keyword.as_str(), "INSERT" | "REPLACE")
    }
}

/// Request body for the Execute interface.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub query: String,
    /// Backend identifier. `db` is accepted for older clients.
    #[serde(default, alias = "db")]
    pub backend: Option<String>,
}

impl ExecuteRequest {
    pub fn new(query: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            backend: Some(backend.into()),
        }
    }
}

/// Result of a row-producing statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub row_count: usize,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<serde_json::Map<String, JsonValue>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
        }
    }
}

/// Result of a mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationSummary {
    pub affected: u64,
    pub inserted_id: Option<i64>,
    pub message: String,
}

impl MutationSummary {
    pub fn new(affected: u64, inserted_id: Option<i64>) -> Self {
        let noun = if affected == 1 { "row" } else { "rows" };
        Self {
            affected,
            inserted_id,
            message: format!("{affected} {noun} affected"),
        }
    }
}

/// What one statement produced. Only the last statement's result of a batch
/// is returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutionResult {
    Rows(RowSet),
    Mutation(MutationSummary),
}

impl ExecutionResult {
    /// Short human-readable outcome, used as the history message.
    pub fn summary(&self) -> String {
        match self {
            Self::Rows(set) => {
                let noun = if set.row_count == 1 { "row" } else { "rows" };
                format!("{} {noun} returned", set.row_count)
            }
            Self::Mutation(m) => m.message.clone(),
        }
    }

    pub fn as_rows(&self) -> Option<&RowSet> {
        match self {
            Self::Rows(set) => Some(set),
            Self::Mutation(_) => None,
        }
    }

    pub fn as_mutation(&self) -> Option<&MutationSummary> {
        match self {
            Self::Mutation(m) => Some(m),
            Self::Rows(_) => None,
        }
    }
}
