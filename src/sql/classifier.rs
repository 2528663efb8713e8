//! Statement classification by leading keyword.
//!
//! The kind only selects how an adapter shapes the result (rows vs affected
//! count). It is not validation: `SELECT` with side effects still runs as a
//! read, and anything unrecognized is `Unknown`.

use crate::models::{Statement, StatementKind};

/// Leading keywords that produce a row-set.
pub const READ_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "PRAGMA", "VALUES", "TABLE",
];

/// Leading keywords that mutate data or schema.
pub const WRITE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER", "REPLACE", "TRUNCATE", "RENAME",
    "UPSERT", "MERGE",
];

/// Uppercased first whitespace-delimited token, with a trailing `(` run
/// removed so `SELECT(1)` still reads as `SELECT`.
pub fn leading_keyword(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .map(|token| {
            token
                .split('(')
                .next()
                .unwrap_or(token)
                .to_ascii_uppercase()
        })
        .unwrap_or_default()
}

/// Classify a statement by its leading keyword.
pub fn classify(sql: &str) -> StatementKind {
    kind_of_keyword(&leading_keyword(sql))
}

fn kind_of_keyword(keyword: &str) -> StatementKind {
    if READ_KEYWORDS.contains(&keyword) {
        StatementKind::Read
    } else if WRITE_KEYWORDS.contains(&keyword) {
        StatementKind::Write
    } else {
        StatementKind::Unknown
    }
}

/// Build a classified [`Statement`] from an already trimmed piece.
pub fn prepare(sql: &str) -> Statement {
    let keyword = leading_keyword(sql);
    Statement {
        sql: sql.to_string(),
        kind: kind_of_keyword(&keyword),
        keyword,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_statements() {
        assert_eq!(classify("SELECT * FROM users"), StatementKind::Read);
        assert_eq!(classify("select 1"), StatementKind::Read);
        assert_eq!(classify("  Show tables"), StatementKind::Read);
        assert_eq!(classify("DESCRIBE users"), StatementKind::Read);
        assert_eq!(classify("desc users"), StatementKind::Read);
        assert_eq!(classify("EXPLAIN SELECT 1"), StatementKind::Read);
        assert_eq!(
            classify("WITH t AS (SELECT 1) SELECT * FROM t"),
            StatementKind::Read
        );
        assert_eq!(classify("PRAGMA table_info(users)"), StatementKind::Read);
        assert_eq!(classify("SELECT(1)"), StatementKind::Read);
    }

    #[test]
    fn test_write_statements() {
        assert_eq!(classify("INSERT INTO t VALUES (1)"), StatementKind::Write);
        assert_eq!(classify("update t set x = 1"), StatementKind::Write);
        assert_eq!(classify("DELETE FROM t"), StatementKind::Write);
        assert_eq!(classify("CREATE TABLE t(x int)"), StatementKind::Write);
        assert_eq!(classify("drop table t"), StatementKind::Write);
        assert_eq!(classify("ALTER TABLE t ADD y int"), StatementKind::Write);
        assert_eq!(classify("REPLACE INTO t VALUES (1)"), StatementKind::Write);
        assert_eq!(classify("TRUNCATE t"), StatementKind::Write);
        assert_eq!(classify("RENAME TABLE a TO b"), StatementKind::Write);
    }

    #[test]
    fn test_unknown_statements() {
        assert_eq!(classify(""), StatementKind::Unknown);
        assert_eq!(classify("BEGIN"), StatementKind::Unknown);
        assert_eq!(classify("VACUUM"), StatementKind::Unknown);
        assert_eq!(classify("GRANT ALL ON t TO bob"), StatementKind::Unknown);
        assert_eq!(classify("-- comment\nSELECT 1"), StatementKind::Unknown);
    }

    #[test]
    fn test_prepare_keeps_keyword() {
        let stmt = prepare("insert into t values (1)");
        assert_eq!(stmt.keyword, "INSERT");
        assert_eq!(stmt.kind, StatementKind::Write);
        assert!(stmt.is_insert());

        let stmt = prepare("UPDATE t SET x = 2");
        assert!(!stmt.is_insert());
    }
}
