//! Recipe, step, directive and line types shared by the loader, parser and
//! executor.
//!
//! All recipe types derive Serialize so `cb show` can dump a parsed recipe.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Recipe
// ============================================================================

/// A parsed recipe: description, declared variables and the ordered steps.
#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    /// Recipe name (file stem)
    pub name: String,

    /// Absolute path of the top-level recipe file
    pub file: PathBuf,

    /// One-line description shown by `cb list`
    pub brief: String,

    /// Full description shown by `cb describe`
    pub full: String,

    /// Variable name to default value; an empty value means required
    pub variables: IndexMap<String, String>,

    /// Steps in declaration order
    pub steps: Vec<Step>,
}

// ============================================================================
// Steps
// ============================================================================

/// One directive invocation. Immutable once parsed: variable substitution
/// produces a new string per run and never writes back here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub directive: Directive,

    /// Raw payload, possibly spanning several lines
    pub data: String,

    /// Line the step was declared on
    #[serde(skip)]
    pub lineno: usize,
}

impl Step {
    /// Short form for log lines; multi-line payloads are not echoed.
    pub fn summary(&self) -> String {
        if self.data.contains('\n') {
            format!("{} multi-line", self.directive)
        } else {
            format!("{} {}", self.directive, self.data)
        }
    }
}

/// The closed set of step directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Directive {
    Cd,
    Export,
    Exec,
    ExecNoExit,
    Info,
    MustExistDir,
    MustExistFile,
    MustNotExistDir,
    MustNotExistFile,
    Script,
}

impl Directive {
    pub const ALL: [Directive; 10] = [
        Self::Cd,
        Self::Export,
        Self::Exec,
        Self::ExecNoExit,
        Self::Info,
        Self::MustExistDir,
        Self::MustExistFile,
        Self::MustNotExistDir,
        Self::MustNotExistFile,
        Self::Script,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cd => "cd",
            Self::Export => "export",
            Self::Exec => "exec",
            Self::ExecNoExit => "exec-no-exit",
            Self::Info => "info",
            Self::MustExistDir => "must-exist-dir",
            Self::MustExistFile => "must-exist-file",
            Self::MustNotExistDir => "must-not-exist-dir",
            Self::MustNotExistFile => "must-not-exist-file",
            Self::Script => "script",
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Directive {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or(())
    }
}

// ============================================================================
// Loader output
// ============================================================================

/// A file taking part in a load, shared by all of its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path as written (argument or include reference)
    pub name: PathBuf,

    /// Absolute path
    pub path: PathBuf,
}

/// One logical line after include expansion and `"""` block assembly.
/// Carried through parsing only for error messages.
#[derive(Debug, Clone)]
pub struct LineRecord {
    pub source: Rc<SourceFile>,

    /// Line number of the first raw line
    pub lineno: usize,

    /// Logical text; a block's body is appended to its head
    pub text: String,

    /// True when the value came from a `"""` block and must not be unquoted
    pub block: bool,
}

impl LineRecord {
    pub fn path(&self) -> PathBuf {
        self.source.path.clone()
    }
}

// ============================================================================
// Run results
// ============================================================================

/// How a single step finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Passed,
    /// `exec-no-exit` command failed; the run continued
    Warned,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Warned => write!(f, "warned"),
        }
    }
}

/// Timing record for one executed step.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// 1-based step number
    pub index: usize,
    pub directive: Directive,
    pub status: StepStatus,
    pub elapsed: Duration,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub recipe: String,
    pub steps: Vec<StepReport>,
    pub total_duration: Duration,
}

impl RunReport {
    pub fn warnings(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Warned)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types_directive_roundtrip_names() {
        for d in Directive::ALL {
            assert_eq!(d.as_str().parse::<Directive>(), Ok(d));
        }
    }

    #[test]
    fn test_types_directive_unknown() {
        assert!("run".parse::<Directive>().is_err());
        assert!("EXEC".parse::<Directive>().is_err());
    }

    #[test]
    fn test_types_directive_serializes_kebab() {
        let json = serde_json::to_string(&Directive::MustNotExistFile).unwrap();
        assert_eq!(json, "\"must-not-exist-file\"");
    }

    #[test]
    fn test_types_step_summary() {
        let one = Step {
            directive: Directive::Exec,
            data: "make all".to_string(),
            lineno: 3,
        };
        assert_eq!(one.summary(), "exec make all");
        let multi = Step {
            directive: Directive::Script,
            data: "#!/bin/sh\necho hi".to_string(),
            lineno: 4,
        };
        assert_eq!(multi.summary(), "script multi-line");
    }

    #[test]
    fn test_types_report_counts_warnings() {
        let step = |status| StepReport {
            index: 1,
            directive: Directive::ExecNoExit,
            status,
            elapsed: Duration::ZERO,
        };
        let report = RunReport {
            recipe: "r".to_string(),
            steps: vec![step(StepStatus::Passed), step(StepStatus::Warned)],
            total_duration: Duration::ZERO,
        };
        assert_eq!(report.warnings(), 1);
    }
}
