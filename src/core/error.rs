//! Error kinds for loading, resolving and running recipes.
//!
//! Parse-time variants carry the file and line they came from so the message
//! printed by the binary points at the offending declaration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("recipe file does not exist: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("recipe '{reference}' not found (looked for {})", path.display())]
    RecipeNotFound { reference: String, path: PathBuf },

    #[error("recipe directory does not exist: {}", path.display())]
    RecipeDirNotFound { path: PathBuf },

    #[error("cyclic include of {} (open files: {})", path.display(), format_chain(chain))]
    CyclicInclude { path: PathBuf, chain: Vec<PathBuf> },

    #[error("{}:{lineno}: end of multi-line string not found", path.display())]
    UnterminatedString { path: PathBuf, lineno: usize },

    #[error("{}:{lineno}: syntax error: {message}", path.display())]
    Syntax {
        path: PathBuf,
        lineno: usize,
        message: String,
    },

    #[error("{}:{lineno}: unknown step directive '{directive}'", path.display())]
    UnknownDirective {
        path: PathBuf,
        lineno: usize,
        directive: String,
    },

    #[error("{}:{lineno}: export is of the form VAR=VAL, could not find '=' in '{data}'", path.display())]
    MalformedExport {
        path: PathBuf,
        lineno: usize,
        data: String,
    },

    #[error("{}:{lineno}: invalid variable name '{name}'", path.display())]
    InvalidVariableName {
        path: PathBuf,
        lineno: usize,
        name: String,
    },

    #[error("recipe '{name}' is incomplete: {missing}")]
    IncompleteRecipe { name: String, missing: String },

    #[error("invalid option specified '{flag}', {}", describe_valid(valid))]
    UnknownVariableFlag { flag: String, valid: Vec<String> },

    #[error("missing argument for '{flag}'")]
    MissingFlagValue { flag: String },

    #[error("unset variables found, cannot continue: {}", format_flags(names))]
    MissingRequiredVariables { names: Vec<String> },

    #[error("unterminated {quote} quote in '{text}'")]
    UnterminatedQuote { quote: char, text: String },

    #[error("cannot run '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("command failed with exit code {code}: {command}")]
    ChildProcessFailure { command: String, code: i32 },

    #[error("{message}: {}", path.display())]
    FilesystemPredicateFailure { path: PathBuf, message: String },

    #[error("failed to change directory to {}: {reason}", path.display())]
    ChangeDirectory { path: PathBuf, reason: String },

    #[error("failed to set the environment variable from '{data}'")]
    InvalidExport { data: String },

    #[error("cannot render recipe: {0}")]
    Render(String),

    #[error("cannot write output: {0}")]
    Output(#[source] std::io::Error),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, RecipeError>;

impl RecipeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn format_flags(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("--{}", n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_valid(valid: &[String]) -> String {
    if valid.is_empty() {
        "there are no valid options".to_string()
    } else {
        format!("valid options are [{}]", valid.join(", "))
    }
}
