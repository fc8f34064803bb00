//! Variable export channel from scripts back into the run.
//!
//! A script step publishes a value by printing `###export name=value` on its
//! own line. The line still reaches the terminal; after the script exits the
//! captured output is scanned and each pair overwrites the variable of that
//! name for the remaining steps.

use super::parser::is_variable_name;
use tracing::warn;

const MARKER: &str = "###export";

/// Extracts exported variables from a finished script's output.
pub trait ExportChannel {
    fn collect(&self, output: &str) -> Vec<(String, String)>;
}

/// The `###export name=value` line protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerExports;

impl ExportChannel for MarkerExports {
    fn collect(&self, output: &str) -> Vec<(String, String)> {
        output.lines().filter_map(parse_marker).collect()
    }
}

fn parse_marker(line: &str) -> Option<(String, String)> {
    let rest = line.trim_end().strip_prefix(MARKER)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let Some((name, value)) = rest.trim_start().split_once('=') else {
        warn!("ignoring export without '=': {}", line.trim_end());
        return None;
    };
    let name = name.trim();
    if !is_variable_name(name) {
        warn!("ignoring export of invalid variable name '{}'", name);
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}
