//! Variable resolution: defaults, `--name value` overrides, required-value
//! checks and `${name}` substitution.
//!
//! Substitution between variables is a single pass in declaration order:
//! each variable is visited once and its value at that moment is replaced
//! into every other variable. There is no second pass, so references that
//! form a cycle keep a literal `${...}`. Unknown references are left
//! untouched so shell `${HOME}` style expansions survive into scripts.

use super::error::{RecipeError, Result};
use indexmap::IndexMap;
use tracing::{debug, error};

/// Apply overrides to the declared variables, enforce required values and
/// run one substitution pass.
pub fn resolve_variables(
    declared: &IndexMap<String, String>,
    overrides: &[String],
) -> Result<IndexMap<String, String>> {
    let mut variables = declared.clone();
    apply_overrides(&mut variables, overrides)?;
    check_required(&variables)?;
    substitute_between(&mut variables);
    Ok(variables)
}

/// Consume `--name value` pairs. Every name must be declared.
fn apply_overrides(variables: &mut IndexMap<String, String>, overrides: &[String]) -> Result<()> {
    let mut args = overrides.iter();
    while let Some(flag) = args.next() {
        let name = flag
            .strip_prefix("--")
            .filter(|n| variables.contains_key(*n))
            .ok_or_else(|| RecipeError::UnknownVariableFlag {
                flag: flag.clone(),
                valid: valid_flags(variables),
            })?;
        let value = args.next().ok_or_else(|| RecipeError::MissingFlagValue {
            flag: flag.clone(),
        })?;
        debug!(variable = name, value = %value, "override");
        variables.insert(name.to_string(), value.clone());
    }
    Ok(())
}

/// The accepted flags, sorted.
pub fn valid_flags(variables: &IndexMap<String, String>) -> Vec<String> {
    let mut flags: Vec<String> = variables.keys().map(|k| format!("--{}", k)).collect();
    flags.sort();
    flags
}

/// Collect every variable still empty and report them together.
fn check_required(variables: &IndexMap<String, String>) -> Result<()> {
    let missing: Vec<String> = variables
        .iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(k, _)| k.clone())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    for name in &missing {
        error!("option '--{}' has no value", name);
    }
    Err(RecipeError::MissingRequiredVariables { names: missing })
}

/// One pass of `${name}` replacement between variables.
fn substitute_between(variables: &mut IndexMap<String, String>) {
    for idx in 0..variables.len() {
        let Some((name, value)) = variables.get_index(idx) else {
            continue;
        };
        let token = reference(name);
        let value = value.clone();
        for (other_idx, (_, other)) in variables.iter_mut().enumerate() {
            if other_idx != idx && other.contains(&token) {
                *other = other.replace(&token, &value);
            }
        }
    }
}

/// Replace `${name}` for every known variable in `text`.
pub fn substitute(text: &str, variables: &IndexMap<String, String>) -> String {
    if !text.contains("${") {
        return text.to_string();
    }
    let mut result = text.to_string();
    for (name, value) in variables {
        let token = reference(name);
        if result.contains(&token) {
            result = result.replace(&token, value);
        }
    }
    result
}

fn reference(name: &str) -> String {
    format!("${{{}}}", name)
}
