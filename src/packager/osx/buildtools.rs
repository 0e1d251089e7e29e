// src/packager/osx/buildtools.rs

//! Command lines of the macOS packaging tools

use crate::packager::ToolCommand;
use std::path::{Path, PathBuf};

/// A flat component package built by `pkgbuild`
#[derive(Debug, Clone)]
pub struct PackageBuild {
    pub root: PathBuf,
    pub identifier: String,
    pub version: String,
    pub install_location: PathBuf,
    pub min_os_version: String,
    pub scripts: Option<PathBuf>,
}

impl PackageBuild {
    pub fn command(&self, output: &Path) -> ToolCommand {
        let mut cmd = ToolCommand::new("pkgbuild")
            .arg("--root")
            .arg_path(&self.root)
            .arg("--identifier")
            .arg(self.identifier.as_str())
            .arg("--version")
            .arg(self.version.as_str())
            .arg("--install-location")
            .arg_path(&self.install_location)
            .arg("--compression")
            .arg("latest")
            .arg("--min-os-version")
            .arg(self.min_os_version.as_str());
        if let Some(scripts) = &self.scripts {
            cmd = cmd.arg("--scripts").arg_path(scripts);
        }
        cmd.arg_path(output)
    }
}

/// `productbuild` assembling component packages through a distribution file
pub fn product_build(distribution: &Path, output: &Path, package_paths: &[PathBuf]) -> ToolCommand {
    let mut cmd = ToolCommand::new("productbuild")
        .arg("--distribution")
        .arg_path(distribution)
        .arg_path(output);
    for p in package_paths {
        cmd = cmd.arg("--package-path").arg_path(p);
    }
    cmd
}

/// `hdiutil create`, overwriting an existing image
pub fn hdiutil_create(dmg: &Path, src_folder: &Path, volume_name: Option<&str>) -> ToolCommand {
    let mut cmd = ToolCommand::new("hdiutil").arg("create").arg_path(dmg);
    if let Some(name) = volume_name {
        cmd = cmd.arg("-volname").arg(name);
    }
    cmd.arg("-ov").arg("-srcfolder").arg_path(src_folder)
}

/// Expand a flat package to read its bill of materials
pub fn pkgutil_expand(package: &Path, dest: &Path) -> ToolCommand {
    ToolCommand::new("pkgutil").arg("--expand").arg_path(package).arg_path(dest)
}

/// Directories recorded in a bill of materials, one per line
pub fn lsbom_dirs(bom: &Path) -> ToolCommand {
    ToolCommand::new("lsbom").arg_path(bom).arg("-s").arg("-d")
}

/// Paths and octal modes recorded in a bill of materials, tab separated
pub fn lsbom_files(bom: &Path) -> ToolCommand {
    ToolCommand::new("lsbom").arg_path(bom).arg("-p").arg("fm")
}

/// Merge static libraries into one archive
pub fn libtool_static(output: &Path, libraries: &[PathBuf]) -> ToolCommand {
    let mut cmd = ToolCommand::new("libtool").arg("-static").arg("-o").arg_path(output);
    for lib in libraries {
        cmd = cmd.arg_path(lib);
    }
    cmd
}
