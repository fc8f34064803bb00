//! Shell-like word splitting and its inverse.
//!
//! Rules:
//! - unquoted whitespace separates words
//! - `'...'` and `"..."` group text, whitespace included; the quotes are
//!   dropped and a quoted segment joins whatever text touches it
//! - `\` takes the next character literally, inside quotes too
//! - an unterminated quote is an error; a trailing lone `\` is kept

use super::error::{RecipeError, Result};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Unquoted,
    Quoted(char),
}

/// Split a command string into an argument vector.
pub fn tokenize(text: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut token = String::new();
    // Separate from `token.is_empty()` so that `""` yields an empty argument.
    let mut in_token = false;
    let mut mode = Mode::Unquoted;
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        match (mode, ch) {
            (_, '\\') => {
                in_token = true;
                match chars.next() {
                    Some(next) => token.push(next),
                    None => token.push('\\'),
                }
            }
            (Mode::Unquoted, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut token));
                    in_token = false;
                }
            }
            (Mode::Unquoted, c @ ('"' | '\'')) => {
                in_token = true;
                mode = Mode::Quoted(c);
            }
            (Mode::Quoted(q), c) if c == q => mode = Mode::Unquoted,
            (_, c) => {
                in_token = true;
                token.push(c);
            }
        }
    }

    if let Mode::Quoted(quote) = mode {
        return Err(RecipeError::UnterminatedQuote {
            quote,
            text: text.to_string(),
        });
    }
    if in_token {
        tokens.push(token);
    }
    Ok(tokens)
}

/// Quote a single argument so `tokenize` reads it back unchanged.
pub fn quote_arg(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    let mut needs_quotes = arg.is_empty();
    for ch in arg.chars() {
        match ch {
            c if c.is_whitespace() => needs_quotes = true,
            '"' | '\'' | '\\' => quoted.push('\\'),
            _ => {}
        }
        quoted.push(ch);
    }
    if needs_quotes {
        format!("\"{}\"", quoted)
    } else {
        quoted
    }
}

/// Render an argument vector as one re-parseable display string.
pub fn build_command(args: &[String]) -> String {
    args.iter()
        .map(|a| quote_arg(a))
        .collect::<Vec<_>>()
        .join(" ")
}
