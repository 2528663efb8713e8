//! Lexical SQL helpers: batch splitting and statement classification.

pub mod classifier;
pub mod splitter;

pub use classifier::{classify, leading_keyword, prepare};
pub use splitter::split_statements;
