//! Keyword candidates offered by the completion engine.

pub const UNIVERSAL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP", "TRUNCATE", "RENAME",
    "TABLE", "VIEW", "INDEX", "FROM", "WHERE", "ORDER BY", "GROUP BY", "HAVING", "LIMIT",
    "OFFSET", "JOIN", "LEFT JOIN", "RIGHT JOIN", "FULL JOIN", "ON", "VALUES", "INTO", "SET",
    "AND", "OR", "NOT", "IN", "IS NULL", "IS NOT NULL",
];

pub const POSTGRES_COMMANDS: &[&str] = &[
    "SERIAL",
    "BIGSERIAL",
    "RETURNING",
    "CREATE EXTENSION",
    "UPSERT",
    "ON CONFLICT",
    "JSON",
    "JSONB",
    "ARRAY",
    "UNNEST",
    "ILIKE",
    "CREATE SCHEMA",
    "DROP SCHEMA",
    "GRANT",
    "REVOKE",
];

pub const MYSQL_COMMANDS: &[&str] = &[
    "AUTO_INCREMENT",
    "DESCRIBE",
    "SHOW TABLES",
    "SHOW COLUMNS",
    "ENGINE",
    "CHARSET",
    "ALTER TABLE MODIFY",
    "REPLACE INTO",
    "REGEXP",
    "CREATE DATABASE",
    "DROP DATABASE",
];

pub const SQLITE_COMMANDS: &[&str] = &[
    "PRAGMA",
    "WITHOUT ROWID",
    "AUTOINCREMENT",
    "EXPLAIN QUERY PLAN",
    "VACUUM",
    "ANALYZE",
];

/// Phrases after which only a table name makes sense. Matched against the
/// last one or two uppercased tokens before the cursor.
pub const TABLE_PHRASES: &[&str] = &[
    "FROM",
    "JOIN",
    "LEFT JOIN",
    "RIGHT JOIN",
    "FULL JOIN",
    "INNER JOIN",
    "OUTER JOIN",
    "INSERT INTO",
    "UPDATE",
    "DELETE FROM",
];

/// Every keyword in offering order: universal first, then engine-specific.
pub fn all_keywords() -> impl Iterator<Item = &'static str> {
    UNIVERSAL_KEYWORDS
        .iter()
        .chain(POSTGRES_COMMANDS)
        .chain(MYSQL_COMMANDS)
        .chain(SQLITE_COMMANDS)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_are_uppercase() {
        for kw in all_keywords() {
            assert_eq!(kw, kw.to_uppercase(), "{kw}");
        }
    }

    #[test]
    fn test_universal_first() {
        assert_eq!(all_keywords().next(), Some("SELECT"));
        assert_eq!(all_keywords().last(), Some("ANALYZE"));
    }
}
