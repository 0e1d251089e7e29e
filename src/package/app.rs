// src/package/app.rs

//! Application packages
//!
//! An app wraps one designated recipe. With `embed_deps` the packaged files
//! also include its dependencies' files; without it the native package
//! manager is expected to provide them. File views that need the store are
//! computed by [`crate::store::PackagesStore`].

use crate::package::PackageBase;

#[derive(Debug, Clone)]
pub struct App {
    pub base: PackageBase,
    /// Recipe providing the application itself
    pub app_recipe: String,
    pub deps: Vec<String>,
    pub embed_deps: bool,
    /// Bundle name, defaults to the package name
    pub app_name: Option<String>,
    pub osx_create_pkg: bool,
    pub osx_create_dmg: bool,
}

impl App {
    pub fn new(base: PackageBase, app_recipe: &str, deps: Vec<String>) -> Self {
        Self {
            base,
            app_recipe: app_recipe.to_string(),
            deps,
            embed_deps: true,
            app_name: None,
            osx_create_pkg: true,
            osx_create_dmg: true,
        }
    }

    pub fn app_name(&self) -> &str {
        self.app_name.as_deref().unwrap_or(&self.base.name)
    }
}
