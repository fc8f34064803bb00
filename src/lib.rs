//! cb: a small recipe language for operational tasks.
//!
//! A recipe file declares a description, variables and an ordered list of
//! steps. Loading expands `include` lines and `"""` blocks, parsing checks
//! the section grammar and directives, resolution applies `--name value`
//! overrides, and the executor runs the steps as a fail-fast pipeline.

pub mod cli;
pub mod context;
pub mod core;
pub mod transport;
