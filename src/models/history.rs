//! Query history records.

use crate::models::{Backend, StatementKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Success,
    Error,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for HistoryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => Err(format!("invalid history status: {other}")),
        }
    }
}

/// One top-level execution request, as stored. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: i64,
    pub query: String,
    pub backend: Backend,
    pub status: HistoryStatus,
    pub kind: StatementKind,
    pub message: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the writer; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryRecord {
    pub query: String,
    pub backend: Backend,
    pub status: HistoryStatus,
    pub kind: StatementKind,
    pub message: String,
    pub user_id: Option<String>,
}

/// Body of an explicit history create.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateHistoryRequest {
    pub query: String,
    #[serde(alias = "db")]
    pub backend: String,
    #[serde(default)]
    pub status: Option<HistoryStatus>,
    #[serde(default)]
    pub message: Option<String>,
}
