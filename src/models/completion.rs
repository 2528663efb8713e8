//! Completion request and candidate types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateCategory {
    Keyword,
    Table,
    Column,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCandidate {
    pub label: String,
    pub category: CandidateCategory,
}

impl CompletionCandidate {
    pub fn keyword(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            category: CandidateCategory::Keyword,
        }
    }

    pub fn table(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            category: CandidateCategory::Table,
        }
    }

    pub fn column(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            category: CandidateCategory::Column,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub text: String,
    /// Character offset of the cursor. Defaults to the end of `text`.
    #[serde(default)]
    pub cursor_offset: Option<usize>,
    /// Restrict table and column candidates to one backend.
    #[serde(default, alias = "db")]
    pub backend: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_serialization() {
        let c = CompletionCandidate::table("users");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["label"], "users");
        assert_eq!(json["category"], "table");
    }

    #[test]
    fn test_request_camel_case() {
        let req: CompletionRequest =
            serde_json::from_str(r#"{"text": "SELECT", "cursorOffset": 3}"#).unwrap();
        assert_eq!(req.cursor_offset, Some(3));
        assert!(req.backend.is_none());
    }
}
