// src/package/descriptor.rs

//! Typed package descriptors
//!
//! Each package is described by one TOML file. The `kind` key selects the
//! entity type, the remaining keys fill [`PackageBase`] and the
//! kind-specific fields:
//!
//! ```toml
//! kind = "package"
//! name = "gstreamer-core"
//! shortdesc = "GStreamer core"
//! version = "1.24.0"
//! deps = ["glib"]
//! files = ["gstreamer-1.0:libs:bins"]
//! files_devel = ["gstreamer-1.0:devel"]
//!
//! [platform_files]
//! windows = ["gstreamer-1.0:libs_win"]
//! ```

use crate::config::Platform;
use crate::error::{Error, Result};
use crate::package::{App, MetaPackage, Package, PackageBase, PackageEntity, PackageRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSpec {
    #[serde(flatten)]
    pub base: PackageBase,

    #[serde(default)]
    pub deps: Vec<String>,

    /// Runtime `"recipe[:category...]"` references
    #[serde(default)]
    pub files: Vec<String>,

    /// Development-only references
    #[serde(default)]
    pub files_devel: Vec<String>,

    #[serde(default)]
    pub platform_files: BTreeMap<Platform, Vec<String>>,

    #[serde(default)]
    pub platform_files_devel: BTreeMap<Platform, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaSpec {
    #[serde(flatten)]
    pub base: PackageBase,

    #[serde(default)]
    pub packages: Vec<PackageRef>,

    #[serde(default)]
    pub platform_packages: BTreeMap<Platform, Vec<PackageRef>>,

    #[serde(default)]
    pub root_env_var: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSpec {
    #[serde(flatten)]
    pub base: PackageBase,

    pub app_recipe: String,

    #[serde(default)]
    pub deps: Vec<String>,

    #[serde(default = "default_true")]
    pub embed_deps: bool,

    #[serde(default)]
    pub app_name: Option<String>,

    #[serde(default = "default_true")]
    pub osx_create_pkg: bool,

    #[serde(default = "default_true")]
    pub osx_create_dmg: bool,
}

/// A parsed package descriptor, before platform resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PackageDescriptor {
    Package(PackageSpec),
    Meta(MetaSpec),
    App(AppSpec),
}

fn merged(base: &[String], platform: Platform, extra: &BTreeMap<Platform, Vec<String>>) -> Vec<String> {
    base.iter()
        .chain(extra.get(&platform).into_iter().flatten())
        .cloned()
        .collect()
}

impl PackageDescriptor {
    /// Load a descriptor file
    ///
    /// Resource paths in the descriptor are resolved relative to the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut descriptor = Self::parse_named(&content, &path.display().to_string())?;
        if let Some(dir) = path.parent() {
            descriptor.base_mut().set_resources_dir(dir);
        }
        Ok(descriptor)
    }

    /// Parse a descriptor from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        Self::parse_named(content, "<inline>")
    }

    fn parse_named(content: &str, origin: &str) -> Result<Self> {
        let descriptor: PackageDescriptor =
            toml::from_str(content).map_err(|e| Error::Descriptor {
                path: origin.to_string(),
                message: e.message().to_string(),
            })?;
        descriptor.validate().map_err(|message| Error::Descriptor {
            path: origin.to_string(),
            message,
        })?;
        Ok(descriptor)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let base = self.base();
        if base.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if base.name.contains(char::is_whitespace) {
            return Err(format!("name '{}' must not contain whitespace", base.name));
        }
        if base.version.trim().is_empty() {
            return Err(format!("package '{}' has no version", base.name));
        }
        match self {
            PackageDescriptor::Meta(meta) => {
                let refs = meta.packages.iter().chain(meta.platform_packages.values().flatten());
                for r in refs {
                    if r.name.trim().is_empty() {
                        return Err(format!("meta package '{}' lists an unnamed member", base.name));
                    }
                    if r.name == base.name {
                        return Err(format!("meta package '{}' lists itself", base.name));
                    }
                }
            }
            PackageDescriptor::App(app) if app.app_recipe.trim().is_empty() => {
                return Err(format!("app '{}' has no app_recipe", base.name));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn base(&self) -> &PackageBase {
        match self {
            PackageDescriptor::Package(p) => &p.base,
            PackageDescriptor::Meta(m) => &m.base,
            PackageDescriptor::App(a) => &a.base,
        }
    }

    fn base_mut(&mut self) -> &mut PackageBase {
        match self {
            PackageDescriptor::Package(p) => &mut p.base,
            PackageDescriptor::Meta(m) => &mut m.base,
            PackageDescriptor::App(a) => &mut a.base,
        }
    }

    /// Build the entity for a target platform
    ///
    /// Leaf file references get the platform's additions appended; meta
    /// packages keep their platform table and merge it when queried.
    pub fn into_entity(self, platform: Platform) -> PackageEntity {
        match self {
            PackageDescriptor::Package(spec) => {
                let files = merged(&spec.files, platform, &spec.platform_files);
                let files_devel = merged(&spec.files_devel, platform, &spec.platform_files_devel);
                Package::new(spec.base, spec.deps, &files, &files_devel).into()
            }
            PackageDescriptor::Meta(spec) => {
                let mut meta = MetaPackage::new(spec.base, spec.packages, spec.platform_packages);
                meta.root_env_var = spec.root_env_var;
                meta.into()
            }
            PackageDescriptor::App(spec) => {
                let mut app = App::new(spec.base, &spec.app_recipe, spec.deps);
                app.embed_deps = spec.embed_deps;
                app.app_name = spec.app_name;
                app.osx_create_pkg = spec.osx_create_pkg;
                app.osx_create_dmg = spec.osx_create_dmg;
                app.into()
            }
        }
    }
}
