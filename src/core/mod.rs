//! Recipe engine: loading, parsing, variable resolution and execution.

pub mod error;
pub mod executor;
pub mod exports;
pub mod loader;
pub mod multiline;
pub mod parser;
pub mod recipe;
pub mod resolver;
pub mod tokenizer;
pub mod types;
