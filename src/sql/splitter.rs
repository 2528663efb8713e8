//! Statement splitting.
//!
//! Splitting is purely lexical: every `;` ends a statement, including one
//! inside a string literal or comment. Clients that need a literal semicolon
//! must send that statement on its own.

/// Statement terminator.
pub const TERMINATOR: char = ';';

/// Split a batch into trimmed, non-empty statements, in input order.
pub fn split_statements(input: &str) -> Vec<&str> {
    input
        .split(TERMINATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
