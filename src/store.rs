// src/store.rs

//! Package store
//!
//! Holds every package entity of a run, keyed by name, and answers the
//! graph questions the packagers ask: lookups, dependency closures and the
//! file lists of composite packages (meta packages and apps).

use crate::config::Platform;
use crate::error::{Error, Result};
use crate::manifest::{APP_EXTRA_CATEGORIES, FileManifest};
use crate::package::{PackageDescriptor, PackageEntity, PackageType};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub struct PackagesStore {
    platform: Platform,
    manifest: Arc<dyn FileManifest>,
    packages: BTreeMap<String, PackageEntity>,
}

impl std::fmt::Debug for PackagesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackagesStore")
            .field("platform", &self.platform)
            .field("packages", &self.packages.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PackagesStore {
    pub fn new(platform: Platform, manifest: Arc<dyn FileManifest>) -> Self {
        Self {
            platform,
            manifest,
            packages: BTreeMap::new(),
        }
    }

    /// Load every `*.toml` descriptor found in `dir`, in file name order
    pub fn load_dir(dir: &Path, platform: Platform, manifest: Arc<dyn FileManifest>) -> Result<Self> {
        let mut store = Self::new(platform, manifest);
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        for path in paths {
            debug!("Loading package descriptor {}", path.display());
            let descriptor = PackageDescriptor::from_file(&path)?;
            store.add_package(descriptor.into_entity(platform))?;
        }
        info!("Loaded {} packages from {}", store.packages.len(), dir.display());
        Ok(store)
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn manifest(&self) -> &dyn FileManifest {
        self.manifest.as_ref()
    }

    /// Register a package; names must be unique
    pub fn add_package(&mut self, package: impl Into<PackageEntity>) -> Result<()> {
        let package = package.into();
        let name = package.name().to_string();
        if self.packages.contains_key(&name) {
            return Err(Error::DuplicatePackage(name));
        }
        self.packages.insert(name, package);
        Ok(())
    }

    pub fn get_package(&self, name: &str) -> Result<&PackageEntity> {
        self.packages
            .get(name)
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Every package, sorted by name
    pub fn packages_list(&self) -> Vec<&PackageEntity> {
        self.packages.values().collect()
    }

    /// Direct dependency names in declaration order
    ///
    /// Meta packages depend on their members for the store's platform.
    pub fn direct_deps(&self, package: &PackageEntity) -> Vec<String> {
        match package {
            PackageEntity::Package(p) => p.deps.clone(),
            PackageEntity::Meta(m) => m.list_packages(self.platform),
            PackageEntity::App(a) => a.deps.clone(),
        }
    }

    /// Dependencies of a package
    ///
    /// Non-recursive returns the direct list. Recursive returns the full
    /// closure in depth-first preorder, each package once; a cycle is an
    /// error naming the path that closes it.
    pub fn get_package_deps(&self, name: &str, recursive: bool) -> Result<Vec<&PackageEntity>> {
        self.deps_names(name, recursive)?
            .iter()
            .map(|n| self.get_package(n))
            .collect()
    }

    /// Same as [`get_package_deps`](Self::get_package_deps), returning names
    pub fn deps_names(&self, name: &str, recursive: bool) -> Result<Vec<String>> {
        let root = self.get_package(name)?;
        if !recursive {
            let deps = self.direct_deps(root);
            for dep in &deps {
                self.get_package(dep)?;
            }
            return Ok(deps);
        }

        let mut closure = Vec::new();
        let mut visited = HashSet::new();
        let mut path = vec![name.to_string()];
        visited.insert(name.to_string());
        self.collect_deps(root, &mut visited, &mut path, &mut closure)?;
        Ok(closure)
    }

    fn collect_deps(
        &self,
        package: &PackageEntity,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
        closure: &mut Vec<String>,
    ) -> Result<()> {
        for dep in self.direct_deps(package) {
            if path.contains(&dep) {
                let start = path.iter().position(|p| *p == dep).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(dep);
                return Err(Error::DependencyCycle(cycle));
            }
            if !visited.insert(dep.clone()) {
                continue;
            }
            let entity = self.get_package(&dep)?;
            closure.push(dep.clone());
            path.push(dep);
            self.collect_deps(entity, visited, path, closure)?;
            path.pop();
        }
        Ok(())
    }

    /// Check that every reference resolves and no dependency cycle exists
    pub fn validate(&self) -> Result<()> {
        for package in self.packages.values() {
            self.deps_names(package.name(), true)?;
            let recipes: Vec<String> = match package {
                PackageEntity::Package(p) => p.recipes_dependencies(),
                PackageEntity::App(a) => vec![a.app_recipe.clone()],
                PackageEntity::Meta(_) => Vec::new(),
            };
            for recipe in recipes {
                if !self.manifest.has_recipe(&recipe) {
                    return Err(Error::RecipeNotFound(recipe));
                }
            }
        }
        Ok(())
    }

    /// Files a package covers for the given mode, sorted and deduplicated
    ///
    /// Meta packages cover their members and the members' dependencies.
    /// Apps cover their recipe and, when embedding dependencies, the
    /// closure of their dependencies plus those recipes' python and
    /// typelib files. Apps never have development files.
    pub fn files(&self, name: &str, mode: PackageType) -> Result<Vec<String>> {
        let manifest = self.manifest();
        match self.get_package(name)? {
            PackageEntity::Package(p) => p.files_for(mode, manifest),
            PackageEntity::Meta(_) => {
                let mut files = BTreeSet::new();
                for dep in self.deps_names(name, true)? {
                    if let PackageEntity::Package(p) = self.get_package(&dep)? {
                        files.extend(p.files_for(mode, manifest)?);
                    }
                }
                Ok(files.into_iter().collect())
            }
            PackageEntity::App(app) => {
                let mut files = BTreeSet::new();
                match mode {
                    PackageType::Devel => return Ok(Vec::new()),
                    PackageType::Debug => {
                        files.extend(manifest.debug_files(&app.app_recipe)?);
                    }
                    PackageType::Runtime => {
                        files.extend(manifest.files(&app.app_recipe, &[])?);
                        if app.embed_deps {
                            let extra: Vec<String> =
                                APP_EXTRA_CATEGORIES.iter().map(|c| c.to_string()).collect();
                            for dep in self.deps_names(name, true)? {
                                if let PackageEntity::Package(p) = self.get_package(&dep)? {
                                    files.extend(p.files_list(manifest)?);
                                    for recipe in p.recipes_dependencies() {
                                        files.extend(manifest.files(&recipe, &extra)?);
                                    }
                                }
                            }
                        }
                    }
                }
                Ok(files.into_iter().collect())
            }
        }
    }

    /// Licenses covering a package's files for the given mode
    pub fn licenses(&self, name: &str, mode: PackageType) -> Result<Vec<String>> {
        let manifest = self.manifest();
        let mut licenses = BTreeSet::new();
        let leaves: Vec<String> = match self.get_package(name)? {
            PackageEntity::Package(_) => vec![name.to_string()],
            PackageEntity::Meta(_) => self.deps_names(name, true)?,
            PackageEntity::App(app) => {
                licenses.extend(manifest.licenses(&app.app_recipe, &[])?);
                if app.embed_deps { self.deps_names(name, true)? } else { Vec::new() }
            }
        };
        for leaf in leaves {
            if let PackageEntity::Package(p) = self.get_package(&leaf)? {
                match mode {
                    PackageType::Devel => licenses.extend(p.devel_recipes_licenses(manifest)?),
                    _ => licenses.extend(p.recipes_licenses(manifest)?),
                }
            }
        }
        Ok(licenses.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::RecipeManifest;
    use crate::package::{App, MetaPackage, Package, PackageBase, PackageRef};

    fn package(name: &str, deps: &[&str], files: &[&str]) -> Package {
        Package::new(
            PackageBase::new(name, "1.0", name),
            deps.iter().map(|d| d.to_string()).collect(),
            &files.iter().map(|f| f.to_string()).collect::<Vec<_>>(),
            &[],
        )
    }

    fn manifest() -> Arc<RecipeManifest> {
        let mut m = RecipeManifest::new();
        m.add_files("ra", "libs", ["lib/liba.so.1"]);
        m.add_files("ra", "devel", ["include/a.h"]);
        m.add_files("ra", "python", ["lib/python3/a.py"]);
        m.add_files("rb", "libs", ["lib/libb.so.1"]);
        m.add_files("rc", "bins", ["bin/c"]);
        m.add_files("app", "bins", ["bin/app"]);
        Arc::new(m)
    }

    fn store() -> PackagesStore {
        let mut store = PackagesStore::new(Platform::Linux, manifest());
        // diamond: d -> (b, c), b -> a, c -> a
        store.add_package(package("a", &[], &["ra:libs"])).unwrap();
        store.add_package(package("b", &["a"], &["rb"])).unwrap();
        store.add_package(package("c", &["a"], &["rc"])).unwrap();
        store.add_package(package("d", &["b", "c"], &[])).unwrap();
        store
    }

    fn names(entities: Vec<&PackageEntity>) -> Vec<&str> {
        entities.into_iter().map(|e| e.name()).collect()
    }

    #[test]
    fn test_duplicate_package() {
        let mut store = store();
        let result = store.add_package(package("a", &[], &[]));
        assert!(matches!(result, Err(Error::DuplicatePackage(name)) if name == "a"));
    }

    #[test]
    fn test_get_package_not_found() {
        let store = store();
        assert!(matches!(store.get_package("zz"), Err(Error::PackageNotFound(_))));
    }

    #[test]
    fn test_direct_deps() {
        let store = store();
        assert_eq!(names(store.get_package_deps("d", false).unwrap()), vec!["b", "c"]);
    }

    #[test]
    fn test_diamond_closure_visits_once() {
        let store = store();
        assert_eq!(names(store.get_package_deps("d", true).unwrap()), vec!["b", "a", "c"]);
        assert!(store.get_package_deps("a", true).unwrap().is_empty());
    }

    #[test]
    fn test_dangling_dependency() {
        let mut store = store();
        store.add_package(package("e", &["missing"], &[])).unwrap();
        assert!(matches!(
            store.get_package_deps("e", true),
            Err(Error::PackageNotFound(name)) if name == "missing"
        ));
        assert!(store.validate().is_err());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut store = PackagesStore::new(Platform::Linux, manifest());
        store.add_package(package("x", &["y"], &[])).unwrap();
        store.add_package(package("y", &["z"], &[])).unwrap();
        store.add_package(package("z", &["y"], &[])).unwrap();
        match store.deps_names("x", true) {
            Err(Error::DependencyCycle(path)) => assert_eq!(path, vec!["y", "z", "y"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_self_cycle_through_root() {
        let mut store = PackagesStore::new(Platform::Linux, manifest());
        store.add_package(package("x", &["y"], &[])).unwrap();
        store.add_package(package("y", &["x"], &[])).unwrap();
        assert!(matches!(store.deps_names("x", true), Err(Error::DependencyCycle(_))));
    }

    #[test]
    fn test_meta_files_cover_member_closure() {
        let mut store = store();
        store
            .add_package(MetaPackage::new(
                PackageBase::new("sdk", "1.0", "SDK"),
                vec![PackageRef::new("b", true, true)],
                BTreeMap::new(),
            ))
            .unwrap();
        assert_eq!(
            store.files("sdk", PackageType::Runtime).unwrap(),
            vec!["lib/liba.so.1", "lib/libb.so.1"]
        );
        assert_eq!(store.files("sdk", PackageType::Devel).unwrap(), vec!["include/a.h"]);
    }

    #[test]
    fn test_app_files() {
        let mut store = store();
        let mut app = App::new(PackageBase::new("myapp", "1.0", "App"), "app", vec!["b".to_string()]);
        store.add_package(app.clone()).unwrap();
        assert_eq!(
            store.files("myapp", PackageType::Runtime).unwrap(),
            vec!["bin/app", "lib/liba.so.1", "lib/libb.so.1", "lib/python3/a.py"]
        );
        assert!(store.files("myapp", PackageType::Devel).unwrap().is_empty());

        let mut thin = PackagesStore::new(Platform::Linux, manifest());
        app.embed_deps = false;
        thin.add_package(app).unwrap();
        assert_eq!(thin.files("myapp", PackageType::Runtime).unwrap(), vec!["bin/app"]);
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("a.toml"),
            "kind = \"package\"\nname = \"a\"\nshortdesc = \"A\"\nversion = \"1.0\"\nfiles = [\"ra:libs\"]\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let store = PackagesStore::load_dir(dir.path(), Platform::Linux, manifest()).unwrap();
        assert_eq!(names(store.packages_list()), vec!["a"]);
        store.validate().unwrap();
    }
}
