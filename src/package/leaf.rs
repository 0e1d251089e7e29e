// src/package/leaf.rs

//! Leaf packages with a concrete file manifest

use crate::error::Result;
use crate::manifest::{FileManifest, LIBS_CATEGORY};
use crate::package::{PackageBase, PackageType};
use std::collections::BTreeSet;

/// A `"recipe[:category...]"` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeRef {
    pub recipe: String,
    /// Requested categories; empty means every category
    pub categories: Vec<String>,
}

impl RecipeRef {
    pub fn parse(reference: &str) -> Self {
        let mut parts = reference.split(':').map(str::trim);
        let recipe = parts.next().unwrap_or_default().to_string();
        let categories = parts.filter(|c| !c.is_empty()).map(String::from).collect();
        Self { recipe, categories }
    }

    fn pulls_devel_files(&self) -> bool {
        self.categories.is_empty()
            || self
                .categories
                .iter()
                .any(|c| c == LIBS_CATEGORY || c.starts_with("libs_"))
    }
}

/// Parse references, merging repeated recipes
///
/// A recipe referenced once without categories keeps "all categories" even if
/// another reference narrows it.
fn parse_refs<'a>(references: impl IntoIterator<Item = &'a String>) -> Vec<RecipeRef> {
    let mut parsed: Vec<RecipeRef> = Vec::new();
    for reference in references {
        let r = RecipeRef::parse(reference);
        if r.recipe.is_empty() {
            continue;
        }
        match parsed.iter_mut().find(|p| p.recipe == r.recipe) {
            Some(existing) => {
                if existing.categories.is_empty() || r.categories.is_empty() {
                    existing.categories.clear();
                } else {
                    for c in r.categories {
                        if !existing.categories.contains(&c) {
                            existing.categories.push(c);
                        }
                    }
                }
            }
            None => parsed.push(r),
        }
    }
    parsed
}

#[derive(Debug, Clone)]
pub struct Package {
    pub base: PackageBase,
    /// Names of packages this one depends on
    pub deps: Vec<String>,
    recipes_files: Vec<RecipeRef>,
    devel_recipes_files: Vec<RecipeRef>,
}

impl Package {
    /// Create a package from already platform-merged file references
    pub fn new(base: PackageBase, deps: Vec<String>, files: &[String], files_devel: &[String]) -> Self {
        Self {
            base,
            deps,
            recipes_files: parse_refs(files),
            devel_recipes_files: parse_refs(files_devel),
        }
    }

    /// Runtime recipe references in declaration order
    pub fn recipes_files(&self) -> &[RecipeRef] {
        &self.recipes_files
    }

    pub fn devel_recipes_files(&self) -> &[RecipeRef] {
        &self.devel_recipes_files
    }

    /// Recipes this package pulls files from, in declaration order
    pub fn recipes_dependencies(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.recipes_files
            .iter()
            .chain(&self.devel_recipes_files)
            .filter(|r| seen.insert(r.recipe.clone()))
            .map(|r| r.recipe.clone())
            .collect()
    }

    pub fn files_list(&self, manifest: &dyn FileManifest) -> Result<Vec<String>> {
        let mut files = BTreeSet::new();
        for r in &self.recipes_files {
            files.extend(manifest.files(&r.recipe, &r.categories)?);
        }
        Ok(files.into_iter().collect())
    }

    /// Development files
    ///
    /// Recipes shipping libraries in the runtime list contribute their devel
    /// files; explicit devel references contribute the categories they name,
    /// or the recipe's devel files when they name none.
    pub fn devel_files_list(&self, manifest: &dyn FileManifest) -> Result<Vec<String>> {
        let mut files = BTreeSet::new();
        for r in self.recipes_files.iter().filter(|r| r.pulls_devel_files()) {
            files.extend(manifest.devel_files(&r.recipe)?);
        }
        for r in &self.devel_recipes_files {
            if r.categories.is_empty() {
                files.extend(manifest.devel_files(&r.recipe)?);
            } else {
                files.extend(manifest.files(&r.recipe, &r.categories)?);
            }
        }
        Ok(files.into_iter().collect())
    }

    pub fn debug_files_list(&self, manifest: &dyn FileManifest) -> Result<Vec<String>> {
        let mut files = BTreeSet::new();
        for r in &self.recipes_files {
            files.extend(manifest.debug_files(&r.recipe)?);
        }
        Ok(files.into_iter().collect())
    }

    pub fn all_files_list(&self, manifest: &dyn FileManifest) -> Result<Vec<String>> {
        let mut files: BTreeSet<String> = self.files_list(manifest)?.into_iter().collect();
        files.extend(self.devel_files_list(manifest)?);
        Ok(files.into_iter().collect())
    }

    pub fn files_for(&self, mode: PackageType, manifest: &dyn FileManifest) -> Result<Vec<String>> {
        match mode {
            PackageType::Runtime => self.files_list(manifest),
            PackageType::Devel => self.devel_files_list(manifest),
            PackageType::Debug => self.debug_files_list(manifest),
        }
    }

    /// Licenses of the recipes' runtime files
    pub fn recipes_licenses(&self, manifest: &dyn FileManifest) -> Result<Vec<String>> {
        let mut licenses = BTreeSet::new();
        for r in &self.recipes_files {
            licenses.extend(manifest.licenses(&r.recipe, &r.categories)?);
        }
        Ok(licenses.into_iter().collect())
    }

    /// Licenses of the recipes' development files
    pub fn devel_recipes_licenses(&self, manifest: &dyn FileManifest) -> Result<Vec<String>> {
        let devel = vec![crate::manifest::DEVEL_CATEGORY.to_string()];
        let mut licenses = BTreeSet::new();
        for r in &self.devel_recipes_files {
            let categories = if r.categories.is_empty() { &devel } else { &r.categories };
            licenses.extend(manifest.licenses(&r.recipe, categories)?);
        }
        Ok(licenses.into_iter().collect())
    }
}
