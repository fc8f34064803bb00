//! Section grammar and recipe construction.
//!
//! A recipe has three sections:
//! - `[description]` with `brief` and `full`
//! - `[variable]` with any identifier, value optional (empty = required)
//! - `[step]` with repeated `step = <directive> <data>`
//!
//! Directives are checked here, so an unknown directive never reaches the
//! executor.

use super::error::{RecipeError, Result};
use super::types::{Directive, LineRecord, Recipe, Step};
use indexmap::IndexMap;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static VARIABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z_\-0-9]*$").expect("valid regex"));

static STEP_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(\S+)\s+(\S.*)$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Description,
    Variable,
    Step,
}

impl Section {
    fn parse(header: &str) -> Option<Self> {
        match header {
            "[description]" => Some(Self::Description),
            "[variable]" => Some(Self::Variable),
            "[step]" => Some(Self::Step),
            _ => None,
        }
    }

    fn header(&self) -> &'static str {
        match self {
            Self::Description => "[description]",
            Self::Variable => "[variable]",
            Self::Step => "[step]",
        }
    }
}

/// Check whether a string is a valid variable name.
pub fn is_variable_name(name: &str) -> bool {
    VARIABLE_NAME.is_match(name)
}

/// Build a recipe from loaded lines.
pub fn parse_recipe(name: &str, file: &Path, lines: &[LineRecord]) -> Result<Recipe> {
    let mut recipe = Recipe {
        name: name.to_string(),
        file: file.to_path_buf(),
        brief: String::new(),
        full: String::new(),
        variables: IndexMap::new(),
        steps: Vec::new(),
    };

    let mut section: Option<Section> = None;
    for line in lines {
        if line.text.starts_with('[') {
            let header = line.text.trim();
            section = Some(
                Section::parse(header)
                    .ok_or_else(|| syntax(line, format!("invalid section found: {}", header)))?,
            );
            continue;
        }

        let Some(current) = section else {
            return Err(syntax(
                line,
                format!("orphan declaration outside of a section: {}", line.text),
            ));
        };
        let Some((key, value)) = line.text.split_once('=') else {
            return Err(syntax(line, format!("missing '=': {}", line.text)));
        };
        let key = key.trim();
        let value = value.trim();

        match current {
            Section::Description => match key {
                "brief" => recipe.brief = unquote(value, line.block),
                "full" => recipe.full = unquote(value, line.block),
                _ => return Err(invalid_key(line, key, current)),
            },
            Section::Variable => {
                if !is_variable_name(key) {
                    return Err(RecipeError::InvalidVariableName {
                        path: line.path(),
                        lineno: line.lineno,
                        name: key.to_string(),
                    });
                }
                recipe
                    .variables
                    .insert(key.to_string(), unquote(value, line.block));
            }
            Section::Step => {
                if key != "step" {
                    return Err(invalid_key(line, key, current));
                }
                recipe.steps.push(parse_step(value, line)?);
            }
        }
    }

    check_complete(&recipe)?;
    Ok(recipe)
}

/// Split a step value into its directive and payload.
fn parse_step(value: &str, line: &LineRecord) -> Result<Step> {
    let caps = STEP_VALUE.captures(value).ok_or_else(|| {
        syntax(
            line,
            format!("step must be '<directive> <data>', got '{}'", value),
        )
    })?;
    let word = &caps[1];
    let data = caps[2].trim();

    let directive: Directive = word.parse().map_err(|_| RecipeError::UnknownDirective {
        path: line.path(),
        lineno: line.lineno,
        directive: word.to_string(),
    })?;

    let data = match directive {
        Directive::Export if !data.contains('=') => {
            return Err(RecipeError::MalformedExport {
                path: line.path(),
                lineno: line.lineno,
                data: data.to_string(),
            });
        }
        Directive::Info => unquote(data, line.block),
        _ => data.to_string(),
    };

    Ok(Step {
        directive,
        data,
        lineno: line.lineno,
    })
}

fn check_complete(recipe: &Recipe) -> Result<()> {
    let missing = if recipe.brief.is_empty() {
        "[description] brief not set"
    } else if recipe.full.is_empty() {
        "[description] full not set"
    } else if recipe.steps.is_empty() {
        "no steps defined in the [step] section"
    } else {
        return Ok(());
    };
    Err(RecipeError::IncompleteRecipe {
        name: recipe.name.clone(),
        missing: missing.to_string(),
    })
}

/// Strip one level of surrounding double quotes from a one-line value.
fn unquote(value: &str, block: bool) -> String {
    if !block && value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

fn syntax(line: &LineRecord, message: String) -> RecipeError {
    RecipeError::Syntax {
        path: line.path(),
        lineno: line.lineno,
        message,
    }
}

fn invalid_key(line: &LineRecord, key: &str, section: Section) -> RecipeError {
    syntax(
        line,
        format!(
            "invalid declaration '{}' in section '{}'",
            key,
            section.header()
        ),
    )
}
