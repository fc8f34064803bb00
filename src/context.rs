//! Host context: who is running, from where, and where recipes and scratch
//! scripts live. Also the source of the built-in `<BASE>_*` environment
//! variables handed to every child process.

use crate::core::error::{RecipeError, Result};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Facts about the current invocation.
#[derive(Debug, Clone)]
pub struct HostContext {
    /// Program name as invoked (file name of argv[0])
    pub base: String,
    pub exe: PathBuf,
    pub pid: u32,
    pub pwd: PathBuf,
    pub recipe_dir: PathBuf,
    pub script_dir: PathBuf,
    /// `YYYYMMDD-HHMMSS`, UTC
    pub timestamp: String,
    pub username: String,
    pub version: &'static str,
}

impl HostContext {
    /// Gather the context. `None` directories fall back to the defaults
    /// derived from the executable location and `$HOME`. An explicit recipe
    /// directory must exist.
    pub fn detect(recipe_dir: Option<PathBuf>, script_dir: Option<PathBuf>) -> Result<Self> {
        let exe = std::env::current_exe().map_err(|e| RecipeError::io("argv[0]", e))?;
        let base = std::env::args_os()
            .next()
            .as_deref()
            .map(Path::new)
            .and_then(Path::file_name)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        let pwd = std::env::current_dir().map_err(|e| RecipeError::io(".", e))?;
        let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();

        let recipe_dir = match recipe_dir {
            Some(dir) if !dir.is_dir() => {
                return Err(RecipeError::RecipeDirNotFound { path: dir });
            }
            Some(dir) => dir,
            None => default_recipe_dir(&exe),
        };
        let script_dir = script_dir.unwrap_or_else(|| home.join(format!(".{}", base)));

        Ok(Self {
            base,
            exe,
            pid: std::process::id(),
            pwd,
            recipe_dir,
            script_dir,
            timestamp: timestamp_now(),
            username: current_username(),
            version: env!("CARGO_PKG_VERSION"),
        })
    }

    /// Built-in variables, e.g. `CB_PWD` when invoked as `cb`.
    pub fn builtin_env(&self) -> IndexMap<String, String> {
        let prefix = self.base.to_uppercase().replace(['-', '.'], "_");
        [
            ("BASE", self.base.clone()),
            ("EXE", self.exe.display().to_string()),
            ("PID", self.pid.to_string()),
            ("PWD", self.pwd.display().to_string()),
            ("RECIPES", self.recipe_dir.display().to_string()),
            ("SCRIPTS", self.script_dir.display().to_string()),
            ("TIMESTAMP", self.timestamp.clone()),
            ("USERNAME", self.username.clone()),
            ("VERSION", self.version.to_string()),
        ]
        .into_iter()
        .map(|(name, value)| (format!("{}_{}", prefix, name), value))
        .collect()
    }

    pub fn log(&self) {
        info!("context");
        info!("   base     : {}", self.base);
        info!("   directory: {}", self.pwd.display());
        info!("   exe      : {}", self.exe.display());
        info!("   pid      : {}", self.pid);
        info!("   recipes  : {}", self.recipe_dir.display());
        info!("   scripts  : {}", self.script_dir.display());
        info!("   timestamp: {}", self.timestamp);
        info!("   user     : {}", self.username);
        info!("   version  : {}", self.version);
    }
}

/// `<exe-dir>/../etc/<exe-name>/recipes`
pub fn default_recipe_dir(exe: &Path) -> PathBuf {
    let dir = exe.parent().unwrap_or(Path::new("/"));
    let name = exe
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join("..").join("etc").join(name).join("recipes")
}

fn current_username() -> String {
    ["USER", "LOGNAME"]
        .iter()
        .find_map(|v| std::env::var(v).ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn timestamp_now() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_timestamp(secs)
}

/// Format seconds since the epoch as `YYYYMMDD-HHMMSS` (UTC).
pub fn format_timestamp(secs: u64) -> String {
    let days = secs / 86400;
    let time_secs = secs % 86400;
    let hours = time_secs / 3600;
    let minutes = (time_secs % 3600) / 60;
    let seconds = time_secs % 60;

    let mut year = 1970u64;
    let mut remaining = days;
    loop {
        let year_days = if is_leap(year) { 366 } else { 365 };
        if remaining < year_days {
            break;
        }
        remaining -= year_days;
        year += 1;
    }
    let month_days = [
        31,
        if is_leap(year) { 29 } else { 28 },
        31,
        30,
        31,
        30,
        31,
        31,
        30,
        31,
        30,
        31,
    ];
    let mut month = 12;
    for (i, &md) in month_days.iter().enumerate() {
        if remaining < md {
            month = i + 1;
            break;
        }
        remaining -= md;
    }
    let day = remaining + 1;

    format!(
        "{:04}{:02}{:02}-{:02}{:02}{:02}",
        year, month, day, hours, minutes, seconds
    )
}

fn is_leap(y: u64) -> bool {
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}
