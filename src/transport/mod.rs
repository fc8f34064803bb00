//! Child process execution for step directives and `cb exec`.
//!
//! Commands are spawned directly from an argv list, never through a shell.
//! The working directory and environment overlay come from the caller, so
//! nothing here touches the process-wide cwd or environment.

pub mod local;

use indexmap::IndexMap;
use std::path::Path;

/// Output from running a command to completion.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    /// Bytes the child wrote to stdout and stderr
    pub bytes: usize,
    /// Combined stdout and stderr, in arrival order. Empty unless captured.
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// What to run and where.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec<'a> {
    pub argv: &'a [String],
    pub cwd: &'a Path,
    /// Added on top of the inherited environment
    pub env: &'a IndexMap<String, String>,
}

impl CommandSpec<'_> {
    /// The command line as it would be typed, for messages.
    pub fn display(&self) -> String {
        crate::core::tokenizer::build_command(self.argv)
    }
}
