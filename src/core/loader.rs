//! Recipe file loading with `include` expansion.
//!
//! Produces a flat list of logical lines. `include <path>` is replaced in
//! place by the expanded contents of that file; relative paths resolve
//! against the including file's directory. Blank lines and `#` comments are
//! dropped outside `"""` blocks.
//!
//! Cycle detection tracks the files currently being expanded, not every
//! file seen, so a fragment may be included twice as long as it never
//! includes itself.

use super::error::{RecipeError, Result};
use super::multiline::BlockAssembler;
use super::tokenizer;
use super::types::{LineRecord, SourceFile};
use indexmap::IndexSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// Load a recipe file and every file it includes.
pub fn load_lines(path: &Path) -> Result<Vec<LineRecord>> {
    let mut open = IndexSet::new();
    let mut lines = Vec::new();
    expand_file(path, &mut open, &mut lines)?;
    Ok(lines)
}

fn expand_file(
    name: &Path,
    open: &mut IndexSet<PathBuf>,
    out: &mut Vec<LineRecord>,
) -> Result<()> {
    if !name.is_file() {
        return Err(RecipeError::FileNotFound {
            path: name.to_path_buf(),
        });
    }
    let abspath = std::fs::canonicalize(name).map_err(|e| RecipeError::io(name, e))?;

    if open.contains(&abspath) {
        let mut chain: Vec<PathBuf> = open.iter().cloned().collect();
        chain.push(abspath.clone());
        return Err(RecipeError::CyclicInclude {
            path: abspath,
            chain,
        });
    }
    open.insert(abspath.clone());
    debug!(file = %abspath.display(), depth = open.len(), "reading recipe file");

    let content =
        std::fs::read_to_string(&abspath).map_err(|e| RecipeError::io(&abspath, e))?;
    let source = Rc::new(SourceFile {
        name: name.to_path_buf(),
        path: abspath.clone(),
    });
    let dir = abspath.parent().unwrap_or(Path::new("/")).to_path_buf();

    let mut assembler = BlockAssembler::default();
    for (idx, raw) in content.lines().enumerate() {
        let lineno = idx + 1;

        if !assembler.in_block() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some(target) = include_target(trimmed, &abspath, lineno)? {
                let resolved = if target.is_absolute() {
                    target
                } else {
                    dir.join(target)
                };
                expand_file(&resolved, open, out)?;
                continue;
            }
        }

        if let Some(line) = assembler.feed(lineno, raw) {
            out.push(LineRecord {
                source: Rc::clone(&source),
                lineno: line.lineno,
                text: line.text,
                block: line.block,
            });
        }
    }
    assembler
        .finish()
        .map_err(|lineno| RecipeError::UnterminatedString {
            path: abspath.clone(),
            lineno,
        })?;

    open.shift_remove(&abspath);
    Ok(())
}

/// Recognize `include <path>`; the path may be quoted.
fn include_target(line: &str, file: &Path, lineno: usize) -> Result<Option<PathBuf>> {
    let Some(rest) = line.strip_prefix("include") else {
        return Ok(None);
    };
    if !rest.starts_with(char::is_whitespace) {
        return Ok(None);
    }

    let syntax = |message: String| RecipeError::Syntax {
        path: file.to_path_buf(),
        lineno,
        message,
    };
    let words = tokenizer::tokenize(rest).map_err(|e| syntax(e.to_string()))?;
    match words.as_slice() {
        [path] if !path.is_empty() => Ok(Some(PathBuf::from(path))),
        _ => Err(syntax(format!(
            "include statement takes exactly one file name: '{}'",
            line
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn texts(lines: &[LineRecord]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_loader_drops_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ini");
        fs::write(&path, "# header\n\n[step]\n   # indented comment\nstep = exec true\n").unwrap();

        let lines = load_lines(&path).unwrap();
        assert_eq!(texts(&lines), vec!["[step]", "step = exec true"]);
        assert_eq!(lines[1].lineno, 5);
    }

    #[test]
    fn test_loader_keeps_comments_inside_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ini");
        fs::write(&path, "step = script \"\"\"\n#!/bin/sh\n\n# keep\n\"\"\"\n").unwrap();

        let lines = load_lines(&path).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "step = script #!/bin/sh\n\n# keep");
        assert!(lines[0].block);
    }

    #[test]
    fn test_loader_include_chain_in_place() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ini"), "a1 = 1\ninclude b.inc\na2 = 2\n").unwrap();
        fs::write(dir.path().join("b.inc"), "include \"c.inc\"\nb1 = 1\n").unwrap();
        fs::write(dir.path().join("c.inc"), "c1 = 1\n").unwrap();

        let lines = load_lines(&dir.path().join("a.ini")).unwrap();
        assert_eq!(texts(&lines), vec!["a1 = 1", "c1 = 1", "b1 = 1", "a2 = 2"]);
        assert!(lines[1].source.path.ends_with("c.inc"));
        assert_eq!(lines[2].lineno, 2);
    }

    #[test]
    fn test_loader_include_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let frag = dir.path().join("frag.inc");
        fs::write(&frag, "x = 1\n").unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("a.ini"), format!("include {}\n", frag.display())).unwrap();

        let lines = load_lines(&sub.join("a.ini")).unwrap();
        assert_eq!(texts(&lines), vec!["x = 1"]);
    }

    #[test]
    fn test_loader_same_fragment_twice_is_not_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ini"), "include f.inc\ninclude f.inc\n").unwrap();
        fs::write(dir.path().join("f.inc"), "x = 1\n").unwrap();

        let lines = load_lines(&dir.path().join("a.ini")).unwrap();
        assert_eq!(texts(&lines), vec!["x = 1", "x = 1"]);
    }

    #[test]
    fn test_loader_cycle_detected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ini"), "include b.inc\n").unwrap();
        fs::write(dir.path().join("b.inc"), "include a.ini\n").unwrap();

        let err = load_lines(&dir.path().join("a.ini")).unwrap_err();
        match err {
            RecipeError::CyclicInclude { path, chain } => {
                assert!(path.ends_with("a.ini"));
                assert_eq!(chain.len(), 3);
                assert!(chain[1].ends_with("b.inc"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_loader_missing_include() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ini"), "include nope.inc\n").unwrap();

        let err = load_lines(&dir.path().join("a.ini")).unwrap_err();
        match err {
            RecipeError::FileNotFound { path } => assert!(path.ends_with("nope.inc")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_loader_missing_root() {
        let err = load_lines(Path::new("/definitely/not/here.ini")).unwrap_err();
        assert!(matches!(err, RecipeError::FileNotFound { .. }));
    }

    #[test]
    fn test_loader_unterminated_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ini");
        fs::write(&path, "[description]\nfull = \"\"\"\nnever closed\n").unwrap();

        let err = load_lines(&path).unwrap_err();
        assert!(matches!(err, RecipeError::UnterminatedString { lineno: 2, .. }));
    }

    #[test]
    fn test_loader_include_word_prefix_is_plain_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ini");
        fs::write(&path, "include_dir = /usr/include\n").unwrap();

        let lines = load_lines(&path).unwrap();
        assert_eq!(texts(&lines), vec!["include_dir = /usr/include"]);
    }

    #[test]
    fn test_loader_include_needs_one_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ini");
        fs::write(&path, "include a.inc b.inc\n").unwrap();

        let err = load_lines(&path).unwrap_err();
        assert!(matches!(err, RecipeError::Syntax { lineno: 1, .. }));
    }
}
