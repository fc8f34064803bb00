//! Recipe lookup and the recipe catalog.
//!
//! A recipe reference is either a path to an existing file or a logical
//! name. Names get `.ini` appended and, unless absolute, are looked up in
//! the recipe directory.

use super::error::{RecipeError, Result};
use super::loader;
use super::parser;
use super::types::Recipe;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Map a reference to the recipe file it names.
pub fn locate(reference: &str, recipe_dir: &Path) -> Result<PathBuf> {
    if reference.is_empty() {
        return Err(RecipeError::RecipeNotFound {
            reference: String::new(),
            path: recipe_dir.to_path_buf(),
        });
    }
    let direct = Path::new(reference);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }

    let mut file = reference.to_string();
    if !file.ends_with(".ini") {
        debug!("appending extension: '.ini'");
        file.push_str(".ini");
    }
    let file = PathBuf::from(file);
    let file = if file.is_absolute() {
        file
    } else {
        debug!("prepending directory path: '{}'", recipe_dir.display());
        recipe_dir.join(file)
    };
    if !file.is_file() {
        return Err(RecipeError::RecipeNotFound {
            reference: reference.to_string(),
            path: file,
        });
    }
    Ok(file)
}

/// Load and parse one recipe.
pub fn load_recipe(reference: &str, recipe_dir: &Path) -> Result<Recipe> {
    info!("loading recipe '{}'", reference);
    let file = locate(reference, recipe_dir)?;
    load_file(&file)
}

/// Load and parse a recipe file. The recipe is named after the file stem.
pub fn load_file(file: &Path) -> Result<Recipe> {
    let abspath = std::fs::canonicalize(file).map_err(|e| RecipeError::io(file, e))?;
    info!("recipe file '{}'", abspath.display());
    let lines = loader::load_lines(&abspath)?;
    let name = abspath
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    parser::parse_recipe(&name, &abspath, &lines)
}

/// Load every `*.ini` recipe directly inside `recipe_dir`, sorted by name.
/// Any broken recipe fails the whole listing.
pub fn load_all_recipes(recipe_dir: &Path) -> Result<Vec<Recipe>> {
    if !recipe_dir.is_dir() {
        return Err(RecipeError::io(
            recipe_dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }
    let escaped = glob::Pattern::escape(&recipe_dir.to_string_lossy());
    let pattern = format!("{}/*.ini", escaped);
    let entries = glob::glob(&pattern).map_err(|e| {
        RecipeError::io(
            recipe_dir,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
        )
    })?;

    let mut recipes = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            RecipeError::io(path, std::io::Error::from(e))
        })?;
        if path.is_file() {
            recipes.push(load_file(&path)?);
        }
    }
    recipes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(recipes)
}

/// `name - brief` lines, names padded to the widest.
pub fn format_listing(recipes: &[Recipe]) -> Vec<String> {
    let width = recipes.iter().map(|r| r.name.len()).max().unwrap_or(0);
    recipes
        .iter()
        .map(|r| format!("{:<width$} - {}", r.name, r.brief, width = width))
        .collect()
}
