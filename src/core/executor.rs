//! Step executor: runs a resolved recipe one step at a time.
//!
//! The working directory, environment overlay and variable map live in an
//! explicit [`ExecContext`] that every directive reads and mutates. Child
//! processes get the context's cwd and env; the engine itself never calls
//! `chdir` or `setenv`, so a run can be driven from tests in isolation.
//!
//! Failure policy: `exec-no-exit` turns a failed child into a warning and
//! the run continues. Every other failure stops the run at that step.

use super::error::{RecipeError, Result};
use super::exports::ExportChannel;
use super::resolver;
use super::tokenizer;
use super::types::{Directive, Recipe, RunReport, StepReport, StepStatus};
use crate::transport::{local, CommandSpec, ExecOutput};
use indexmap::IndexMap;
use std::fs;
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info, warn};

/// Mutable state shared by the steps of one run.
#[derive(Debug, Clone)]
pub struct ExecContext {
    /// Absolute working directory for children and relative paths
    pub cwd: PathBuf,

    /// Variables added on top of the inherited environment
    pub env: IndexMap<String, String>,

    /// Resolved recipe variables; `###export` may overwrite entries
    pub variables: IndexMap<String, String>,
}

impl ExecContext {
    pub fn new(cwd: impl Into<PathBuf>, variables: IndexMap<String, String>) -> Self {
        Self {
            cwd: cwd.into(),
            env: IndexMap::new(),
            variables,
        }
    }

    /// Resolve a step path against the current working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.cwd.join(p)
        }
    }
}

/// Configuration for a run.
pub struct RunConfig<'a> {
    pub recipe: &'a Recipe,
    /// Where anonymous scripts are written
    pub script_dir: &'a Path,
    pub exports: &'a dyn ExportChannel,
}

/// Execute every step in order. Output of children and `info` goes to `out`.
pub fn run(cfg: &RunConfig, ctx: &mut ExecContext, out: &mut dyn Write) -> Result<RunReport> {
    let start = Instant::now();
    let mut steps = Vec::with_capacity(cfg.recipe.steps.len());

    for (idx, step) in cfg.recipe.steps.iter().enumerate() {
        let index = idx + 1;
        let data = resolver::substitute(&step.data, &ctx.variables);
        if data.contains('\n') {
            info!(step = index, "step.start = {} multi-line", step.directive);
        } else {
            info!(step = index, "step.start = {} {}", step.directive, data);
        }
        info!(step = index, "step.pwd = {}", ctx.cwd.display());

        let step_start = Instant::now();
        let status = run_step(cfg, ctx, step.directive, &data, out)?;
        let elapsed = step_start.elapsed();
        info!(
            step = index,
            status = %status,
            "step.end = {:.3}",
            elapsed.as_secs_f64()
        );

        steps.push(StepReport {
            index,
            directive: step.directive,
            status,
            elapsed,
        });
    }

    Ok(RunReport {
        recipe: cfg.recipe.name.clone(),
        steps,
        total_duration: start.elapsed(),
    })
}

fn run_step(
    cfg: &RunConfig,
    ctx: &mut ExecContext,
    directive: Directive,
    data: &str,
    out: &mut dyn Write,
) -> Result<StepStatus> {
    match directive {
        Directive::Cd => change_dir(ctx, data)?,
        Directive::Export => set_env(ctx, data)?,
        Directive::Exec => {
            let output = run_command(ctx, data, out)?;
            check_exit(data, &output)?;
        }
        Directive::ExecNoExit => {
            let failure = match run_command(ctx, data, out) {
                Ok(output) => check_exit(data, &output).err(),
                Err(e) => Some(e),
            };
            if let Some(e) = failure {
                warn!("{}", e);
                return Ok(StepStatus::Warned);
            }
        }
        Directive::Info => writeln!(out, "{}", data).map_err(RecipeError::Output)?,
        Directive::MustExistDir => {
            require(ctx, data, true, is_dir, "directory does not exist")?;
        }
        Directive::MustExistFile => {
            require(ctx, data, true, is_file, "file does not exist")?;
        }
        Directive::MustNotExistDir => {
            require(ctx, data, false, is_dir, "directory exists")?;
        }
        Directive::MustNotExistFile => {
            require(ctx, data, false, is_file, "file exists")?;
        }
        Directive::Script => run_script(cfg, ctx, data, out)?,
    }
    Ok(StepStatus::Passed)
}

fn change_dir(ctx: &mut ExecContext, data: &str) -> Result<()> {
    let target = ctx.resolve_path(data);
    let canonical = fs::canonicalize(&target).map_err(|e| RecipeError::ChangeDirectory {
        path: target.clone(),
        reason: e.to_string(),
    })?;
    if !canonical.is_dir() {
        return Err(RecipeError::ChangeDirectory {
            path: target,
            reason: "not a directory".to_string(),
        });
    }
    debug!(from = %ctx.cwd.display(), to = %canonical.display(), "cd");
    ctx.cwd = canonical;
    Ok(())
}

fn set_env(ctx: &mut ExecContext, data: &str) -> Result<()> {
    let (name, value) = data
        .split_once('=')
        .map(|(n, v)| (n.trim(), v))
        .filter(|(n, _)| !n.is_empty() && !n.contains(char::is_whitespace))
        .ok_or_else(|| RecipeError::InvalidExport {
            data: data.to_string(),
        })?;
    debug!(name, value, "export");
    ctx.env.insert(name.to_string(), value.to_string());
    Ok(())
}

fn run_command(ctx: &ExecContext, command: &str, out: &mut dyn Write) -> Result<ExecOutput> {
    let argv = tokenizer::tokenize(command)?;
    let spec = CommandSpec {
        argv: &argv,
        cwd: &ctx.cwd,
        env: &ctx.env,
    };
    info!("cmd.cmd = {}", spec.display());
    let start = Instant::now();
    let output = local::exec_streaming(&spec, out, false)?;
    info!("cmd.elapsed = {:.3}", start.elapsed().as_secs_f64());
    Ok(output)
}

fn check_exit(command: &str, output: &ExecOutput) -> Result<()> {
    if output.success() {
        Ok(())
    } else {
        Err(RecipeError::ChildProcessFailure {
            command: command.to_string(),
            code: output.exit_code,
        })
    }
}

fn is_dir(path: &Path) -> bool {
    path.is_dir()
}

/// A file is anything that exists and is not a directory.
fn is_file(path: &Path) -> bool {
    path.exists() && !path.is_dir()
}

fn require(
    ctx: &ExecContext,
    data: &str,
    expected: bool,
    predicate: fn(&Path) -> bool,
    message: &str,
) -> Result<()> {
    let path = ctx.resolve_path(data);
    if predicate(&path) == expected {
        Ok(())
    } else {
        Err(RecipeError::FilesystemPredicateFailure {
            path,
            message: message.to_string(),
        })
    }
}

fn run_script(
    cfg: &RunConfig,
    ctx: &mut ExecContext,
    body: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let script = ScratchScript::create(cfg.script_dir, body)?;
    let argv = vec![script.path().to_string_lossy().into_owned()];
    let spec = CommandSpec {
        argv: &argv,
        cwd: &ctx.cwd,
        env: &ctx.env,
    };
    let output = local::exec_streaming(&spec, out, true)?;
    drop(script);

    check_exit("script", &output)?;
    for (name, value) in cfg.exports.collect(&output.output) {
        info!(variable = %name, value = %value, "script export");
        ctx.variables.insert(name, value);
    }
    Ok(())
}

/// An executable temporary file holding a script body. Removed on drop,
/// whichever way the step ends.
struct ScratchScript {
    path: TempPath,
}

impl ScratchScript {
    fn create(dir: &Path, body: &str) -> Result<Self> {
        ensure_private_dir(dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("script-")
            .suffix(".sh")
            .tempfile_in(dir)
            .map_err(|e| RecipeError::io(dir, e))?;
        let write = |file: &mut NamedTempFile| -> std::io::Result<()> {
            file.write_all(body.as_bytes())?;
            if !body.ends_with('\n') {
                file.write_all(b"\n")?;
            }
            file.as_file()
                .set_permissions(fs::Permissions::from_mode(0o700))
        };
        write(&mut file).map_err(|e| RecipeError::io(file.path(), e))?;

        // Close the write handle before exec, or the kernel reports ETXTBSY.
        let path = file.into_temp_path();
        info!("creating anonymous script file: {}", path.display());
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchScript {
    fn drop(&mut self) {
        info!("deleting anonymous script file: {}", self.path.display());
    }
}

fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(|e| RecipeError::io(dir, e))
}
