// src/packager/osx/framework.rs

//! Framework bundles and their `Headers` tree
//!
//! Headers live under versioned directories (`include/gstreamer-1.0/gst`)
//! so pkg-config keeps working, but a framework exposes them without the
//! version component (`Headers/gst`). The flattened copy is built next to
//! the original tree, which is left in place.

use super::plist::{BundleType, InfoPlist};
use crate::error::Result;
use crate::packager::symlink;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;
use walkdir::WalkDir;

/// `include/<name>-<version>`, e.g. `include/gstreamer-1.0`
static VERSIONED_INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^include/[^/]+-[0-9][0-9.]*$").unwrap());

/// Versioned include directories present in `root`, relative to it
///
/// `configured` entries may be absolute paths under `prefix` or relative
/// ones; any `include/<name>-<version>` directory found in the tree is
/// added to them. `include` itself is never versioned.
pub fn versioned_include_dirs(root: &Path, prefix: &Path, configured: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs: BTreeSet<PathBuf> = configured
        .iter()
        .map(|d| d.strip_prefix(prefix).map(Path::to_path_buf).unwrap_or_else(|_| d.clone()))
        .filter(|d| d.is_relative() && d.components().count() > 1)
        .collect();
    if let Ok(entries) = std::fs::read_dir(root.join("include")) {
        for entry in entries.flatten() {
            let rel = Path::new("include").join(entry.file_name());
            if VERSIONED_INCLUDE.is_match(&rel.to_string_lossy()) {
                dirs.insert(rel);
            }
        }
    }
    dirs.into_iter().filter(|d| root.join(d).is_dir()).collect()
}

fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let meta = std::fs::symlink_metadata(src)?;
    if meta.file_type().is_symlink() {
        if dest.is_symlink() || dest.exists() {
            std::fs::remove_file(dest)?;
        }
        symlink(std::fs::read_link(src)?, dest)?;
    } else {
        std::fs::copy(src, dest)?;
    }
    Ok(())
}

/// Build `<root>/Headers` from `<root>/include`
///
/// Files outside the versioned directories keep their path relative to
/// `include`; the contents of each versioned directory are placed directly
/// under `Headers`. Returns the number of headers copied.
pub fn create_framework_headers(root: &Path, include_dirs: &[PathBuf]) -> Result<usize> {
    let include = root.join("include");
    let headers = root.join("Headers");
    if !include.is_dir() {
        return Ok(0);
    }
    let versioned: Vec<PathBuf> = include_dirs.iter().map(|d| root.join(d)).collect();

    let mut copied = 0;
    let mut walker = WalkDir::new(&include).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        if entry.file_type().is_dir() {
            if versioned.iter().any(|v| v == entry.path()) {
                walker.skip_current_dir();
            }
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(&include) {
            copy_file(entry.path(), &headers.join(rel))?;
            copied += 1;
        }
    }

    for dir in &versioned {
        for entry in WalkDir::new(dir).min_depth(1) {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            if entry.file_type().is_dir() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(dir) {
                copy_file(entry.path(), &headers.join(rel))?;
                copied += 1;
            }
        }
    }
    debug!("Copied {} headers into {}", copied, headers.display());
    Ok(copied)
}

/// Identity of a framework bundle
#[derive(Debug, Clone)]
pub struct FrameworkBundle {
    pub name: String,
    pub identifier: String,
    pub version: String,
    pub description: String,
    /// Name of the framework library linked at the bundle's top level
    pub library: Option<String>,
}

impl FrameworkBundle {
    pub fn version_dir(&self) -> PathBuf {
        Path::new("Versions").join(&self.version)
    }

    /// Create the bundle skeleton in `dir`
    ///
    /// ```text
    /// Versions/Current -> <version>
    /// Resources, Headers, Commands, Libraries -> Versions/Current/...
    /// Versions/<version>/Commands -> bin
    /// Versions/<version>/Libraries -> lib
    /// ```
    pub fn create_layout(&self, dir: &Path) -> Result<()> {
        let vdir = dir.join(self.version_dir());
        let resources = vdir.join("Resources");
        std::fs::create_dir_all(&resources)?;

        InfoPlist::new(&self.name, &self.identifier, &self.version, &self.description, BundleType::Framework)
            .save(&resources.join("Info.plist"))?;

        symlink(&self.version, dir.join("Versions").join("Current"))?;
        let mut links = vec!["Resources", "Commands", "Headers", "Libraries"];
        if let Some(library) = &self.library {
            links.push(library.as_str());
        }
        for link in links {
            symlink(Path::new("Versions/Current").join(link), dir.join(link))?;
        }
        symlink("bin", vdir.join("Commands"))?;
        symlink("lib", vdir.join("Libraries"))?;
        Ok(())
    }
}
