//! SQL completion: keywords, table names and column names at the cursor.

pub mod engine;
pub mod keywords;

pub use engine::{CompletionEngine, CursorContext};
