// src/manifest.rs

//! Recipe file manifests
//!
//! A recipe is an external build unit whose installed files are grouped in
//! named categories (`libs`, `bins`, `devel`, `python`, ...). Packages refer
//! to them with `"recipe:category"` strings; this module answers the question
//! "which relative paths under the prefix does that reference cover".

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Category holding development-only files (headers, pkg-config, import libs)
pub const DEVEL_CATEGORY: &str = "devel";

/// Category holding debug symbols
pub const DEBUG_CATEGORY: &str = "debug";

/// Category holding shared libraries
pub const LIBS_CATEGORY: &str = "libs";

/// Categories embedded by apps on top of their dependencies' files
pub const APP_EXTRA_CATEGORIES: [&str; 2] = ["python", "typelibs"];

/// Lookup of recipe files by category
///
/// Every list returned is sorted and deduplicated. Unknown categories yield
/// an empty list; unknown recipes are an error.
pub trait FileManifest: Send + Sync {
    /// Whether the manifest knows this recipe
    fn has_recipe(&self, recipe: &str) -> bool;

    /// Files of the given categories; an empty slice means every category
    /// except the devel and debug ones
    fn files(&self, recipe: &str, categories: &[String]) -> Result<Vec<String>>;

    /// Development files of the recipe
    fn devel_files(&self, recipe: &str) -> Result<Vec<String>>;

    /// Debug symbol files of the recipe
    fn debug_files(&self, recipe: &str) -> Result<Vec<String>>;

    /// Licenses covering the given categories (empty slice means all)
    fn licenses(&self, recipe: &str, categories: &[String]) -> Result<Vec<String>>;
}

/// Files and licensing of a single recipe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeFiles {
    /// Licenses applying to every category
    #[serde(default)]
    pub licenses: Vec<String>,

    /// Category name -> relative paths under the prefix
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,

    /// Per-category license overrides
    #[serde(default)]
    pub category_licenses: BTreeMap<String, Vec<String>>,
}

impl RecipeFiles {
    fn category(&self, name: &str) -> impl Iterator<Item = &String> {
        self.categories.get(name).into_iter().flatten()
    }

    fn runtime_categories(&self) -> impl Iterator<Item = &String> {
        self.categories
            .keys()
            .filter(|c| c.as_str() != DEVEL_CATEGORY && c.as_str() != DEBUG_CATEGORY)
    }
}

/// TOML-backed manifest, one `[recipes.<name>]` table per recipe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeManifest {
    #[serde(default)]
    pub recipes: BTreeMap<String, RecipeFiles>,
}

impl RecipeManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a manifest from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a manifest from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Register (or replace) a recipe
    pub fn insert(&mut self, name: impl Into<String>, files: RecipeFiles) {
        self.recipes.insert(name.into(), files);
    }

    /// Add files to a recipe category, creating both as needed
    pub fn add_files<I, S>(&mut self, recipe: &str, category: &str, files: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipes
            .entry(recipe.to_string())
            .or_default()
            .categories
            .entry(category.to_string())
            .or_default()
            .extend(files.into_iter().map(Into::into));
    }

    fn recipe(&self, name: &str) -> Result<&RecipeFiles> {
        self.recipes
            .get(name)
            .ok_or_else(|| Error::RecipeNotFound(name.to_string()))
    }
}

fn sorted<'a>(files: impl Iterator<Item = &'a String>) -> Vec<String> {
    files
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl FileManifest for RecipeManifest {
    fn has_recipe(&self, recipe: &str) -> bool {
        self.recipes.contains_key(recipe)
    }

    fn files(&self, recipe: &str, categories: &[String]) -> Result<Vec<String>> {
        let r = self.recipe(recipe)?;
        if categories.is_empty() {
            return Ok(sorted(r.runtime_categories().flat_map(|c| r.category(c))));
        }
        Ok(sorted(categories.iter().flat_map(|c| r.category(c))))
    }

    fn devel_files(&self, recipe: &str) -> Result<Vec<String>> {
        let r = self.recipe(recipe)?;
        Ok(sorted(r.category(DEVEL_CATEGORY)))
    }

    fn debug_files(&self, recipe: &str) -> Result<Vec<String>> {
        let r = self.recipe(recipe)?;
        Ok(sorted(r.category(DEBUG_CATEGORY)))
    }

    fn licenses(&self, recipe: &str, categories: &[String]) -> Result<Vec<String>> {
        let r = self.recipe(recipe)?;
        let selected: Vec<&String> = if categories.is_empty() {
            r.runtime_categories().collect()
        } else {
            categories.iter().collect()
        };

        let mut licenses: BTreeSet<String> = BTreeSet::new();
        let mut uses_default = selected.is_empty();
        for category in selected {
            match r.category_licenses.get(category.as_str()) {
                Some(l) => licenses.extend(l.iter().cloned()),
                None => uses_default = true,
            }
        }
        if uses_default {
            licenses.extend(r.licenses.iter().cloned());
        }
        Ok(licenses.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> RecipeManifest {
        RecipeManifest::parse(
            r#"
            [recipes.zlib]
            licenses = ["BSD-like"]

            [recipes.zlib.categories]
            libs = ["lib/libz.so.1", "lib/libz.so.1.2.13"]
            devel = ["include/zlib.h", "lib/libz.so", "lib/pkgconfig/zlib.pc"]
            debug = ["lib/debug/libz.so.1.debug"]
            bins = ["bin/minigzip"]

            [recipes.zlib.category_licenses]
            bins = ["GPL"]
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_all_runtime_categories() {
        let files = manifest().files("zlib", &[]).unwrap();
        assert_eq!(
            files,
            vec!["bin/minigzip", "lib/libz.so.1", "lib/libz.so.1.2.13"]
        );
    }

    #[test]
    fn test_selected_categories() {
        let files = manifest().files("zlib", &["libs".to_string()]).unwrap();
        assert_eq!(files, vec!["lib/libz.so.1", "lib/libz.so.1.2.13"]);
        let none = manifest().files("zlib", &["python".to_string()]).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_devel_and_debug() {
        let m = manifest();
        assert_eq!(m.devel_files("zlib").unwrap().len(), 3);
        assert_eq!(m.debug_files("zlib").unwrap(), vec!["lib/debug/libz.so.1.debug"]);
    }

    #[test]
    fn test_unknown_recipe() {
        let result = manifest().files("openssl", &[]);
        assert!(matches!(result, Err(Error::RecipeNotFound(name)) if name == "openssl"));
    }

    #[test]
    fn test_licenses() {
        let m = manifest();
        assert_eq!(m.licenses("zlib", &["libs".to_string()]).unwrap(), vec!["BSD-like"]);
        assert_eq!(m.licenses("zlib", &["bins".to_string()]).unwrap(), vec!["GPL"]);
        assert_eq!(m.licenses("zlib", &[]).unwrap(), vec!["BSD-like", "GPL"]);
    }

    #[test]
    fn test_add_files_deduplicates_on_read() {
        let mut m = RecipeManifest::new();
        m.add_files("glib", "libs", ["lib/libglib.so.0", "lib/libglib.so.0"]);
        assert_eq!(m.files("glib", &[]).unwrap(), vec!["lib/libglib.so.0"]);
        assert!(m.has_recipe("glib"));
    }
}
