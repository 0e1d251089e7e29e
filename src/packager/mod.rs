// src/packager/mod.rs

//! Packager contract and shared packing logic
//!
//! A [`Packager`] turns one store entry into native artifacts. Every backend
//! follows the same life cycle:
//!
//! 1. pack the dependencies first (depth-first, each once per run)
//! 2. resolve the runtime and devel file lists against the install prefix
//! 3. stage the files in a private temporary tree
//! 4. render the format metadata and invoke the native tool
//! 5. move the artifacts to the output directory
//!
//! The temporary tree is a [`StagingDir`] owned by the packing call, so it is
//! removed on success and on error unless `keep_temp` is set.
//!
//! Dependencies that turn out to be empty are recorded in the
//! [`PackSession`] and left out of the dependent's generated requirements.

pub mod android;
pub mod debian;
pub mod disttarball;
pub mod inno;
mod linux;
pub mod osx;
pub mod registry;
pub mod rpm;
pub mod staging;
pub mod tool;
pub mod wix;
mod xml;

pub use registry::{ArtifactType, PackagerFactory, PackagerRegistry};
pub use staging::StagingDir;
pub use tool::{SystemRunner, ToolCommand, ToolRunner};

use crate::config::PackagingConfig;
use crate::error::{Error, Result};
use crate::package::{PackageBase, PackageEntity, PackageType};
use crate::store::PackagesStore;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Options of a single `pack` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackOptions {
    /// Also produce development packages
    pub devel: bool,
    /// Tolerate missing files and overwrite existing artifacts
    pub force: bool,
    /// Leave temporary trees on disk
    pub keep_temp: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            devel: true,
            force: false,
            keep_temp: false,
        }
    }
}

/// Everything a packager needs, shared by every packager of a run
#[derive(Clone)]
pub struct PackContext {
    pub config: Arc<PackagingConfig>,
    pub store: Arc<PackagesStore>,
    pub runner: Arc<dyn ToolRunner>,
}

impl std::fmt::Debug for PackContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackContext")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish()
    }
}

impl PackContext {
    pub fn new(
        config: Arc<PackagingConfig>,
        store: Arc<PackagesStore>,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        Self {
            config,
            store,
            runner,
        }
    }

    pub fn package(&self, name: &str) -> Result<&PackageEntity> {
        self.store.get_package(name)
    }
}

/// Outcome of packing one package, consulted by its dependents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackedInfo {
    pub has_runtime: bool,
    pub has_devel: bool,
}

/// State of one top-level `pack` invocation
///
/// Records which packages were already packed (so a dependency reached
/// through two paths is packed once), which were empty, and holds the
/// staging tree shared between packagers of the run.
#[derive(Debug, Default)]
pub struct PackSession {
    visited: BTreeSet<String>,
    empty: BTreeSet<String>,
    packed: BTreeMap<String, PackedInfo>,
    shared: Option<StagingDir>,
}

impl PackSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a package as handled; false if it already was
    pub fn mark_visited(&mut self, name: &str) -> bool {
        self.visited.insert(name.to_string())
    }

    pub fn mark_empty(&mut self, name: &str) {
        self.empty.insert(name.to_string());
    }

    pub fn is_empty(&self, name: &str) -> bool {
        self.empty.contains(name)
    }

    pub fn record(&mut self, name: &str, info: PackedInfo) {
        self.packed.insert(name.to_string(), info);
    }

    pub fn info(&self, name: &str) -> Option<PackedInfo> {
        self.packed.get(name).copied()
    }

    /// Staging tree shared by every packager of this run, created on first use
    pub fn shared_dir(&mut self, keep: bool) -> Result<&Path> {
        if self.shared.is_none() {
            self.shared = Some(StagingDir::new("distpack-shared-", keep)?);
        }
        match &self.shared {
            Some(dir) => Ok(dir.path()),
            None => Err(Error::Usage("shared staging directory unavailable".to_string())),
        }
    }
}

/// A backend producing native artifacts for one package
pub trait Packager {
    /// Name of the package this packager produces
    fn package_name(&self) -> &str;

    /// Pack the package and its dependencies into `output_dir`
    fn pack(&self, output_dir: &Path, opts: &PackOptions) -> Result<Vec<PathBuf>> {
        let mut session = PackSession::new();
        session.mark_visited(self.package_name());
        self.pack_with(output_dir, opts, &mut session)
    }

    /// Pack within an existing session
    fn pack_with(
        &self,
        output_dir: &Path,
        opts: &PackOptions,
        session: &mut PackSession,
    ) -> Result<Vec<PathBuf>>;
}

/// Pack the direct dependencies of `name` not yet handled in this session
///
/// Each dependency's packager packs its own dependencies in turn, so the
/// whole closure is produced depth-first. Empty dependencies are recorded
/// in the session instead of failing the run.
pub fn pack_deps<F>(
    ctx: &PackContext,
    name: &str,
    output_dir: &Path,
    opts: &PackOptions,
    session: &mut PackSession,
    make: F,
) -> Result<Vec<PathBuf>>
where
    F: Fn(&PackContext, &str) -> Result<Box<dyn Packager>>,
{
    let mut paths = Vec::new();
    for dep in ctx.store.deps_names(name, false)? {
        if !session.mark_visited(&dep) {
            debug!("Dependency {} already packed, skipping", dep);
            continue;
        }
        info!("Packing dependency {} for package {}", dep, name);
        let packager = make(ctx, &dep)?;
        match packager.pack_with(output_dir, opts, session) {
            Ok(artifacts) => paths.extend(artifacts),
            Err(e) if e.is_empty_package() => {
                warn!("Package {} is empty", dep);
                session.mark_empty(&dep);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(paths)
}

/// Files of a package that actually exist under the install prefix
///
/// Fails with [`Error::EmptyPackage`] when nothing remains, and with
/// [`Error::MissingPackageFiles`] when some declared files are absent and
/// `force` is not set. With `force` the missing files are logged and skipped.
pub fn files_list(
    ctx: &PackContext,
    name: &str,
    mode: PackageType,
    force: bool,
) -> Result<Vec<String>> {
    let declared = ctx.store.files(name, mode)?;
    let prefix = &ctx.config.prefix;

    let (existing, missing): (Vec<String>, Vec<String>) = declared
        .into_iter()
        .partition(|f| std::fs::symlink_metadata(prefix.join(f)).is_ok());

    if existing.is_empty() {
        return Err(Error::EmptyPackage(name.to_string()));
    }
    if !missing.is_empty() {
        if !force {
            return Err(Error::MissingPackageFiles {
                package: name.to_string(),
                files: missing,
            });
        }
        warn!(
            "The following files required by package {} are missing:\n {}",
            name,
            missing.join("\n ")
        );
    }
    Ok(existing)
}

/// Like [`files_list`], mapping an empty package to an empty list
pub fn files_or_empty(
    ctx: &PackContext,
    name: &str,
    mode: PackageType,
    force: bool,
) -> Result<Vec<String>> {
    match files_list(ctx, name, mode, force) {
        Err(e) if e.is_empty_package() => Ok(Vec::new()),
        other => other,
    }
}

/// Refuse to overwrite an artifact unless forced
pub fn check_output(path: &Path, force: bool) -> Result<()> {
    if path.exists() || path.is_symlink() {
        if !force {
            return Err(Error::Usage(format!("File {} already exists", path.display())));
        }
        debug!("Removing existing artifact {}", path.display());
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Move a built artifact into the output directory
pub fn place_artifact(src: &Path, output_dir: &Path, force: bool) -> Result<PathBuf> {
    let file_name = src
        .file_name()
        .ok_or_else(|| Error::Usage(format!("{} is not a file", src.display())))?;
    let dest = output_dir.join(file_name);
    check_output(&dest, force)?;
    std::fs::create_dir_all(output_dir)?;
    info!("Moving {} to {}", src.display(), dest.display());
    if std::fs::rename(src, &dest).is_err() {
        std::fs::copy(src, &dest)?;
        std::fs::remove_file(src)?;
    }
    Ok(dest)
}

/// Regular files below `dir` (at most `max_depth` levels) whose names match `pattern`
pub fn collect_artifacts(dir: &Path, pattern: &str, max_depth: usize) -> Result<Vec<PathBuf>> {
    let pattern = glob::Pattern::new(pattern)
        .map_err(|e| Error::Usage(format!("invalid artifact pattern '{}': {}", pattern, e)))?;
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| pattern.matches(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .collect();
    found.sort();
    Ok(found)
}

/// `<packages_prefix>-` for packages that accept the configured prefix
pub fn name_prefix(config: &PackagingConfig, base: &PackageBase) -> String {
    match config.packages_prefix.as_deref() {
        Some(prefix) if !prefix.is_empty() && !base.ignore_package_prefix => {
            format!("{}-", prefix)
        }
        _ => String::new(),
    }
}

/// Copy files from the prefix into `dest`, keeping relative paths and symlinks
pub fn copy_files(prefix: &Path, files: &[String], dest: &Path) -> Result<()> {
    for f in files {
        let src = prefix.join(f);
        let target = dest.join(f);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        copy_entry(&src, &target)?;
    }
    Ok(())
}

fn copy_entry(src: &Path, dest: &Path) -> Result<()> {
    let meta = std::fs::symlink_metadata(src)?;
    if meta.file_type().is_symlink() {
        #[cfg(unix)]
        {
            let link = std::fs::read_link(src)?;
            if dest.is_symlink() || dest.exists() {
                std::fs::remove_file(dest)?;
            }
            std::os::unix::fs::symlink(link, dest)?;
            return Ok(());
        }
    }
    if meta.is_dir() {
        std::fs::create_dir_all(dest)?;
    } else {
        std::fs::copy(src, dest)?;
    }
    Ok(())
}


/// Create a symbolic link at `link` pointing to `target`
#[cfg(unix)]
pub(crate) fn symlink(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn symlink(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
    Err(Error::Usage(format!(
        "cannot link {} to {}: symbolic links need a unix host",
        link.as_ref().display(),
        target.as_ref().display()
    )))
}

/// Mark a copied script executable
#[cfg(unix)]
pub(crate) fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
