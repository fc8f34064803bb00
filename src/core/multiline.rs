//! `"""` block assembly.
//!
//! A two-state machine fed one raw line at a time. In the normal state a
//! line of the form `key = """...` (optionally `key = <word> """...`) either
//! closes on the same line or opens a block. Inside a block every raw line is
//! kept verbatim, comments and blank lines included, until a line whose
//! trimmed text ends with `"""`.

const FENCE: &str = "\"\"\"";

/// A finished logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    /// Line the logical line started on
    pub lineno: usize,
    pub text: String,
    /// Value came from a `"""` block
    pub block: bool,
}

#[derive(Debug)]
struct OpenBlock {
    lineno: usize,
    head: String,
    lines: Vec<String>,
}

/// Block assembler state for one file.
#[derive(Debug, Default)]
pub struct BlockAssembler {
    open: Option<OpenBlock>,
}

impl BlockAssembler {
    pub fn in_block(&self) -> bool {
        self.open.is_some()
    }

    /// Feed one raw line. Returns the completed logical line, or `None`
    /// while a block is still open.
    pub fn feed(&mut self, lineno: usize, raw: &str) -> Option<Assembled> {
        match self.open.take() {
            Some(block) => self.continue_block(block, raw),
            None => self.start_line(lineno, raw),
        }
    }

    /// End of input. `Err` carries the line the unterminated block started on.
    pub fn finish(self) -> Result<(), usize> {
        match self.open {
            Some(block) => Err(block.lineno),
            None => Ok(()),
        }
    }

    fn start_line(&mut self, lineno: usize, raw: &str) -> Option<Assembled> {
        let line = raw.trim();
        let Some((head, after)) = split_opening(line) else {
            return Some(Assembled {
                lineno,
                text: line.to_string(),
                block: false,
            });
        };

        if let Some(inner) = after.trim_end().strip_suffix(FENCE) {
            return Some(Assembled {
                lineno,
                text: join(&head, inner.trim()),
                block: true,
            });
        }

        let mut lines = Vec::new();
        if !after.trim().is_empty() {
            lines.push(after.to_string());
        }
        self.open = Some(OpenBlock {
            lineno,
            head,
            lines,
        });
        None
    }

    fn continue_block(&mut self, mut block: OpenBlock, raw: &str) -> Option<Assembled> {
        let trimmed_end = raw.trim_end();
        match trimmed_end.strip_suffix(FENCE) {
            Some(before) => {
                if !before.trim().is_empty() {
                    block.lines.push(before.to_string());
                }
                let body = block.lines.join("\n");
                Some(Assembled {
                    lineno: block.lineno,
                    text: join(&block.head, body.trim()),
                    block: true,
                })
            }
            None => {
                block.lines.push(raw.to_string());
                self.open = Some(block);
                None
            }
        }
    }
}

/// Split `key = """rest` or `key = word """rest` into (`key = [word]`, `rest`).
fn split_opening(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    let value = value.trim_start();
    if let Some(after) = value.strip_prefix(FENCE) {
        return Some((format!("{} =", key), after));
    }
    let (word, rest) = value.split_once(char::is_whitespace)?;
    let after = rest.trim_start().strip_prefix(FENCE)?;
    Some((format!("{} = {}", key, word), after))
}

fn join(head: &str, body: &str) -> String {
    if body.is_empty() {
        head.to_string()
    } else {
        format!("{} {}", head, body)
    }
}
