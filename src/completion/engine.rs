//! Candidate generation at an editing cursor.

use super::keywords::{TABLE_PHRASES, all_keywords};
use crate::models::{Backend, CompletionCandidate};
use crate::schema_cache::SchemaSnapshot;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// `FROM <table>` or `UPDATE <table>`; the last match before the cursor wins.
static TABLE_REFERENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:FROM|UPDATE)\s+([A-Za-z0-9_]+)").unwrap());

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn starts_with_ignore_case(candidate: &str, prefix_lower: &str) -> bool {
    candidate.to_lowercase().starts_with(prefix_lower)
}

/// The text before the cursor split into what precedes the partial token and
/// the partial token itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorContext<'a> {
    pub before: &'a str,
    pub partial: &'a str,
}

impl<'a> CursorContext<'a> {
    /// `cursor_offset` counts characters and is clamped to the text length.
    pub fn new(text: &'a str, cursor_offset: usize) -> Self {
        let cursor = text
            .char_indices()
            .nth(cursor_offset)
            .map_or(text.len(), |(idx, _)| idx);
        let head = &text[..cursor];
        let start = head
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_identifier_char(*c))
            .last()
            .map_or(cursor, |(idx, _)| idx);
        Self {
            before: &head[..start],
            partial: &head[start..],
        }
    }

    /// Uppercased whitespace-delimited tokens before the partial token.
    pub fn preceding_tokens(&self) -> Vec<String> {
        self.before
            .to_uppercase()
            .split_whitespace()
            .map(String::from)
            .collect()
    }

    pub fn in_table_position(&self) -> bool {
        let tokens = self.preceding_tokens();
        let last = tokens.last().map(String::as_str).unwrap_or("");
        let last_two = match tokens.as_slice() {
            [.., a, b] => format!("{a} {b}"),
            _ => String::new(),
        };
        TABLE_PHRASES
            .iter()
            .any(|phrase| *phrase == last || *phrase == last_two)
    }

    /// Target of the nearest preceding `FROM`/`UPDATE`.
    pub fn referenced_table(&self) -> Option<&'a str> {
        TABLE_REFERENCE_RE
            .captures_iter(self.before)
            .last()
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Produces completion candidates from a schema snapshot.
#[derive(Debug, Clone)]
pub struct CompletionEngine {
    keywords: Vec<&'static str>,
}

impl Default for CompletionEngine {
    fn default() -> Self {
        Self {
            keywords: all_keywords().collect(),
        }
    }
}

impl CompletionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidates for the cursor at `cursor_offset` in `text`.
    ///
    /// With `backend`, only that backend's tables are considered.
    pub fn complete(
        &self,
        snapshot: &SchemaSnapshot,
        text: &str,
        cursor_offset: usize,
        backend: Option<Backend>,
    ) -> Vec<CompletionCandidate> {
        let ctx = CursorContext::new(text, cursor_offset);

        if ctx.in_table_position() {
            return Self::table_candidates(snapshot, &ctx, backend);
        }

        if let Some(candidates) = Self::qualified_column_candidates(snapshot, &ctx, backend) {
            return candidates;
        }

        if ctx.partial.is_empty() {
            return Vec::new();
        }

        self.fallback_candidates(snapshot, &ctx, backend)
    }

    /// Tables only, matched on the partial token with dots removed. An empty
    /// prefix lists every table.
    fn table_candidates(
        snapshot: &SchemaSnapshot,
        ctx: &CursorContext<'_>,
        backend: Option<Backend>,
    ) -> Vec<CompletionCandidate> {
        let prefix = ctx.partial.replace('.', "").to_lowercase();
        snapshot
            .table_names(backend)
            .into_iter()
            .filter(|name| starts_with_ignore_case(name, &prefix))
            .map(CompletionCandidate::table)
            .collect()
    }

    /// `table.col` where `table` is known: that table's columns, labelled
    /// with the table part as typed. `None` when the rule does not apply.
    fn qualified_column_candidates(
        snapshot: &SchemaSnapshot,
        ctx: &CursorContext<'_>,
        backend: Option<Backend>,
    ) -> Option<Vec<CompletionCandidate>> {
        let mut parts = ctx.partial.split('.');
        let table_part = parts.next()?;
        let column_part = parts.next()?;
        let table = snapshot.find_table(backend, table_part)?;

        let prefix = column_part.to_lowercase();
        Some(
            table
                .column_names()
                .filter(|col| starts_with_ignore_case(col, &prefix))
                .map(|col| CompletionCandidate::column(format!("{table_part}.{col}")))
                .collect(),
        )
    }

    /// Keywords, then tables, then columns of the referenced table,
    /// deduplicated by label with the first occurrence kept.
    fn fallback_candidates(
        &self,
        snapshot: &SchemaSnapshot,
        ctx: &CursorContext<'_>,
        backend: Option<Backend>,
    ) -> Vec<CompletionCandidate> {
        let prefix = ctx.partial.to_lowercase();

        let keywords = self
            .keywords
            .iter()
            .filter(|kw| starts_with_ignore_case(kw, &prefix))
            .map(|kw| CompletionCandidate::keyword(*kw));

        let tables = snapshot
            .table_names(backend)
            .into_iter()
            .filter(|name| starts_with_ignore_case(name, &prefix))
            .map(CompletionCandidate::table);

        let columns: Vec<CompletionCandidate> = ctx
            .referenced_table()
            .and_then(|name| snapshot.find_table(backend, name))
            .map(|table| {
                table
                    .column_names()
                    .filter(|col| starts_with_ignore_case(col, &prefix))
                    .map(CompletionCandidate::column)
                    .collect()
            })
            .unwrap_or_default();

        let mut seen = HashSet::new();
        keywords
            .chain(tables)
            .chain(columns)
            .filter(|c| seen.insert(c.label.clone()))
            .collect()
    }
}
