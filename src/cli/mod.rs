//! CLI subcommands: run, list, describe, flatten, show, exec.
//!
//! Every command writes its user-facing output to the writer it is given
//! (stdout from `main`); diagnostics go through `tracing`.

use crate::context::HostContext;
use crate::core::error::{RecipeError, Result};
use crate::core::exports::MarkerExports;
use crate::core::executor::{self, ExecContext, RunConfig};
use crate::core::types::{LineRecord, Recipe, RunReport};
use crate::core::{loader, recipe, resolver, tokenizer};
use crate::transport::{local, CommandSpec};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Top-level options. They are accepted only before the subcommand, so
/// every word after `run <recipe>` belongs to the recipe, whatever its name.
#[derive(Parser, Debug)]
#[command(
    name = "cb",
    version,
    about = "Run declared multi-step recipes as fail-fast pipelines"
)]
pub struct Cli {
    /// Recipe directory [default: <exe-dir>/../etc/<exe-name>/recipes]
    #[arg(short, long, env = "CB_RECIPES")]
    pub recipes: Option<PathBuf>,

    /// Scratch directory for anonymous scripts [default: $HOME/.<exe-name>]
    #[arg(long, env = "CB_SCRIPTS")]
    pub scripts: Option<PathBuf>,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Increase log detail (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a recipe, overriding variables with --name value pairs
    #[command(disable_help_flag = true)]
    Run {
        /// Recipe name or path
        recipe: String,

        /// Variable overrides: --name value ...
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        vars: Vec<String>,
    },

    /// List the recipes in the recipe directory
    List,

    /// Show the full description and variables of a recipe
    Describe {
        /// Recipe name or path
        recipe: String,
    },

    /// Print the logical lines of a recipe after includes and blocks
    Flatten {
        /// Recipe name or path
        recipe: String,
    },

    /// Dump a parsed recipe as YAML
    Show {
        /// Recipe name or path
        recipe: String,

        /// Emit JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Run a single command with live output
    Exec {
        /// Capture output and only report size, time and status
        #[arg(long)]
        silent: bool,

        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands, host: &HostContext, out: &mut dyn Write) -> Result<()> {
    match cmd {
        Commands::Run { recipe, vars } => cmd_run(host, &recipe, &vars, out),
        Commands::List => cmd_list(host, out),
        Commands::Describe { recipe } => cmd_describe(host, &recipe, out),
        Commands::Flatten { recipe } => cmd_flatten(host, &recipe, out),
        Commands::Show { recipe, json } => cmd_show(host, &recipe, json, out),
        Commands::Exec { silent, argv } => cmd_exec(host, &argv, silent, out),
    }
}

fn cmd_run(
    host: &HostContext,
    reference: &str,
    overrides: &[String],
    out: &mut dyn Write,
) -> Result<()> {
    let recipe = recipe::load_recipe(reference, &host.recipe_dir)?;
    let variables = resolver::resolve_variables(&recipe.variables, overrides)?;
    for (name, value) in &variables {
        info!("variable {} = {}", name, value);
    }

    let mut ctx = ExecContext::new(&host.pwd, variables);
    ctx.env = host.builtin_env();
    let cfg = RunConfig {
        recipe: &recipe,
        script_dir: &host.script_dir,
        exports: &MarkerExports,
    };
    let report = executor::run(&cfg, &mut ctx, out)?;
    log_report(&recipe, &report);
    Ok(())
}

fn log_report(recipe: &Recipe, report: &RunReport) {
    for (step, timing) in recipe.steps.iter().zip(&report.steps) {
        let mut summary = step.summary();
        if summary.len() > 60 {
            let cut = (0..=57).rev().find(|i| summary.is_char_boundary(*i)).unwrap_or(0);
            summary.truncate(cut);
            summary.push_str("...");
        }
        info!(
            "{:>3} {:<7} {:>8.3}s  {}",
            timing.index,
            timing.status.to_string(),
            timing.elapsed.as_secs_f64(),
            summary
        );
    }
    info!(
        "recipe '{}' complete: {} steps, {} warnings ({:.3}s)",
        report.recipe,
        report.steps.len(),
        report.warnings(),
        report.total_duration.as_secs_f64()
    );
}

fn cmd_list(host: &HostContext, out: &mut dyn Write) -> Result<()> {
    let recipes = recipe::load_all_recipes(&host.recipe_dir)?;
    for line in recipe::format_listing(&recipes) {
        writeln!(out, "{}", line).map_err(RecipeError::Output)?;
    }
    Ok(())
}

fn cmd_describe(host: &HostContext, reference: &str, out: &mut dyn Write) -> Result<()> {
    let recipe = recipe::load_recipe(reference, &host.recipe_dir)?;
    out.write_all(render_description(&recipe).as_bytes())
        .map_err(RecipeError::Output)
}

fn render_description(recipe: &Recipe) -> String {
    let mut text = format!("Help for {} - {}\n", recipe.name, recipe.file.display());
    text.push_str(&recipe.full);
    text.push('\n');
    if !recipe.variables.is_empty() {
        text.push_str("\nVariables:\n");
        let width = recipe.variables.keys().map(|k| k.len() + 2).max().unwrap_or(0);
        for (name, value) in &recipe.variables {
            let flag = format!("--{}", name);
            let default = if value.is_empty() {
                "(required)".to_string()
            } else {
                format!("default: {}", value)
            };
            text.push_str(&format!("    {:<width$}  {}\n", flag, default, width = width));
        }
    }
    text
}

fn cmd_flatten(host: &HostContext, reference: &str, out: &mut dyn Write) -> Result<()> {
    let file = recipe::locate(reference, &host.recipe_dir)?;
    let lines = loader::load_lines(&file)?;
    for line in render_flattened(&lines) {
        writeln!(out, "{}", line).map_err(RecipeError::Output)?;
    }
    Ok(())
}

fn render_flattened(lines: &[LineRecord]) -> Vec<String> {
    lines
        .iter()
        .map(|l| format!("{}:{}: {}", l.source.name.display(), l.lineno, l.text))
        .collect()
}

fn cmd_show(
    host: &HostContext,
    reference: &str,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let recipe = recipe::load_recipe(reference, &host.recipe_dir)?;
    let rendered = if json {
        let json =
            serde_json::to_string_pretty(&recipe).map_err(|e| RecipeError::Render(e.to_string()))?;
        json + "\n"
    } else {
        serde_yaml_ng::to_string(&recipe).map_err(|e| RecipeError::Render(e.to_string()))?
    };
    out.write_all(rendered.as_bytes()).map_err(RecipeError::Output)
}

fn cmd_exec(
    host: &HostContext,
    argv: &[String],
    silent: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let env = host.builtin_env();
    let spec = CommandSpec {
        argv,
        cwd: &host.pwd,
        env: &env,
    };
    let command = tokenizer::build_command(argv);
    info!("cmd    = {}", command);

    let start = Instant::now();
    let output = if silent {
        local::exec_captured(&spec)?
    } else {
        local::exec_streaming(&spec, out, false)?
    };
    let elapsed = start.elapsed().as_secs_f64();
    let status = if output.success() {
        "passed".to_string()
    } else {
        format!("failed ({})", output.exit_code)
    };

    if silent {
        writeln!(out, "time   = {:.3}", elapsed)
            .and_then(|_| writeln!(out, "size   = {}", output.bytes))
            .and_then(|_| writeln!(out, "status = {}", status))
            .map_err(RecipeError::Output)?;
    } else {
        info!("time   = {:.3}", elapsed);
        info!("size   = {}", output.bytes);
        info!("status = {}", status);
    }

    if output.success() {
        Ok(())
    } else {
        Err(RecipeError::ChildProcessFailure {
            command,
            code: output.exit_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn host(dir: &Path) -> HostContext {
        HostContext {
            base: "cb".to_string(),
            exe: PathBuf::from("/opt/cb/bin/cb"),
            pid: 1,
            pwd: fs::canonicalize(dir).unwrap(),
            recipe_dir: dir.join("recipes"),
            script_dir: dir.join("scripts"),
            timestamp: "20240101-000000".to_string(),
            username: "tester".to_string(),
            version: "0.0.0",
        }
    }

    fn setup() -> (tempfile::TempDir, HostContext) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("recipes")).unwrap();
        let host = host(dir.path());
        (dir, host)
    }

    fn add_recipe(host: &HostContext, name: &str, body: &str) {
        fs::write(host.recipe_dir.join(format!("{}.ini", name)), body).unwrap();
    }

    fn capture(cmd: Commands, host: &HostContext) -> (Result<()>, String) {
        let mut out = Vec::new();
        let result = dispatch(cmd, host, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    const GREET: &str = r#"
[description]
brief = Say hello
full = """
Prints a greeting.
Use --who to pick the target.
"""
[variable]
who =
greeting = hello
[step]
step = info ${greeting} ${who}
step = exec /bin/sh -c "echo $CB_USERNAME"
"#;

    #[test]
    fn test_cli_run_with_override() {
        let (_dir, host) = setup();
        add_recipe(&host, "greet", GREET);
        let (result, out) = capture(
            Commands::Run {
                recipe: "greet".to_string(),
                vars: vec!["--who".to_string(), "world".to_string()],
            },
            &host,
        );
        result.unwrap();
        assert_eq!(out, "hello world\ntester\n");
    }

    #[test]
    fn test_cli_run_missing_required() {
        let (_dir, host) = setup();
        add_recipe(&host, "greet", GREET);
        let (result, out) = capture(
            Commands::Run {
                recipe: "greet".to_string(),
                vars: vec![],
            },
            &host,
        );
        match result.unwrap_err() {
            RecipeError::MissingRequiredVariables { names } => assert_eq!(names, vec!["who"]),
            other => panic!("unexpected error: {}", other),
        }
        assert!(out.is_empty());
    }

    #[test]
    fn test_cli_run_unknown_recipe() {
        let (_dir, host) = setup();
        let (result, _) = capture(
            Commands::Run {
                recipe: "nope".to_string(),
                vars: vec![],
            },
            &host,
        );
        assert!(matches!(result.unwrap_err(), RecipeError::RecipeNotFound { .. }));
    }

    #[test]
    fn test_cli_list() {
        let (_dir, host) = setup();
        add_recipe(&host, "greet", GREET);
        add_recipe(
            &host,
            "b",
            "[description]\nbrief = bee\nfull = f\n[step]\nstep = info x\n",
        );
        let (result, out) = capture(Commands::List, &host);
        result.unwrap();
        assert_eq!(out, "b     - bee\ngreet - Say hello\n");
    }

    #[test]
    fn test_cli_describe() {
        let (_dir, host) = setup();
        add_recipe(&host, "greet", GREET);
        let (result, out) = capture(
            Commands::Describe {
                recipe: "greet".to_string(),
            },
            &host,
        );
        result.unwrap();
        assert!(out.starts_with("Help for greet - "));
        assert!(out.contains("Prints a greeting.\nUse --who to pick the target.\n"));
        assert!(out.contains("--who       (required)"));
        assert!(out.contains("--greeting  default: hello"));
    }

    #[test]
    fn test_cli_flatten_shows_origin() {
        let (_dir, host) = setup();
        fs::write(host.recipe_dir.join("common.inc"), "[description]\nbrief = b\n").unwrap();
        add_recipe(&host, "inc", "include common.inc\nfull = f\n[step]\nstep = info i\n");
        let (result, out) = capture(
            Commands::Flatten {
                recipe: "inc".to_string(),
            },
            &host,
        );
        result.unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].ends_with("common.inc:1: [description]"), "{}", lines[0]);
        assert!(lines[2].ends_with("inc.ini:2: full = f"), "{}", lines[2]);
    }

    #[test]
    fn test_cli_show_yaml_and_json() {
        let (_dir, host) = setup();
        add_recipe(&host, "greet", GREET);
        let (result, yaml) = capture(
            Commands::Show {
                recipe: "greet".to_string(),
                json: false,
            },
            &host,
        );
        result.unwrap();
        assert!(yaml.contains("name: greet"));
        assert!(yaml.contains("directive: info"));

        let (result, json) = capture(
            Commands::Show {
                recipe: "greet".to_string(),
                json: true,
            },
            &host,
        );
        result.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["brief"], "Say hello");
        assert_eq!(value["steps"][1]["directive"], "exec");
        assert_eq!(value["variables"]["greeting"], "hello");
    }

    #[test]
    fn test_cli_exec_streams() {
        let (_dir, host) = setup();
        let (result, out) = capture(
            Commands::Exec {
                silent: false,
                argv: vec!["/bin/echo".to_string(), "hi there".to_string()],
            },
            &host,
        );
        result.unwrap();
        assert_eq!(out, "hi there\n");
    }

    #[test]
    fn test_cli_exec_silent_reports() {
        let (_dir, host) = setup();
        let (result, out) = capture(
            Commands::Exec {
                silent: true,
                argv: vec!["/bin/echo".to_string(), "abc".to_string()],
            },
            &host,
        );
        result.unwrap();
        assert!(!out.contains("abc"));
        assert!(out.contains("size   = 4\n"));
        assert!(out.contains("status = passed\n"));
    }

    #[test]
    fn test_cli_exec_failure_is_error() {
        let (_dir, host) = setup();
        let (result, _) = capture(
            Commands::Exec {
                silent: true,
                argv: vec!["/bin/sh".to_string(), "-c".to_string(), "exit 2".to_string()],
            },
            &host,
        );
        assert!(matches!(
            result.unwrap_err(),
            RecipeError::ChildProcessFailure { code: 2, .. }
        ));
    }

    fn parse_run(args: &[&str]) -> (Cli, String, Vec<String>) {
        let cli = Cli::try_parse_from(args).unwrap();
        let (recipe, vars) = match &cli.command {
            Commands::Run { recipe, vars } => (recipe.clone(), vars.clone()),
            other => panic!("expected run, got {:?}", other),
        };
        (cli, recipe, vars)
    }

    #[test]
    fn test_cli_parse_run_overrides() {
        let (_, recipe, vars) = parse_run(&["cb", "run", "greet", "--who", "world"]);
        assert_eq!(recipe, "greet");
        assert_eq!(vars, vec!["--who", "world"]);
    }

    #[test]
    fn test_cli_parse_run_vars_named_like_options() {
        let (cli, _, vars) = parse_run(&["cb", "run", "greet", "--verbose", "yes"]);
        assert_eq!(cli.verbose, 0);
        assert_eq!(vars, vec!["--verbose", "yes"]);

        let (cli, _, vars) = parse_run(&["cb", "run", "greet", "--recipes", "x", "-q", "1"]);
        assert!(!cli.quiet);
        assert_eq!(vars, vec!["--recipes", "x", "-q", "1"]);

        let (_, _, vars) = parse_run(&["cb", "run", "greet", "--help", "me", "--scripts", "s"]);
        assert_eq!(vars, vec!["--help", "me", "--scripts", "s"]);
    }

    #[test]
    fn test_cli_parse_options_before_subcommand() {
        let (cli, recipe, vars) = parse_run(&["cb", "-v", "-r", "/srv/recipes", "run", "greet"]);
        assert_eq!(cli.verbose, 1);
        assert_eq!(cli.recipes, Some(PathBuf::from("/srv/recipes")));
        assert_eq!(recipe, "greet");
        assert!(vars.is_empty());
        assert!(Cli::try_parse_from(["cb", "-q", "-v", "list"]).is_err());
    }

    #[test]
    fn test_cli_parse_exec_keeps_flags_for_child() {
        let cli = Cli::try_parse_from(["cb", "exec", "--silent", "ls", "-l", "--verbose"]).unwrap();
        match cli.command {
            Commands::Exec { silent, argv } => {
                assert!(silent);
                assert_eq!(argv, vec!["ls", "-l", "--verbose"]);
            }
            other => panic!("expected exec, got {:?}", other),
        }
        assert_eq!(cli.verbose, 0);
    }
}
