// src/packager/osx/mod.rs

//! macOS and iOS installers
//!
//! Leaf packages become flat component packages built with `pkgbuild`,
//! installed under `<install dir>/Versions/<version>`. Meta packages become
//! a product archive: every package of the closure is built as a component,
//! then `productbuild` assembles them through a `Distribution.xml` whose
//! choices mirror the members' required and selected flags. Apps become an
//! application bundle shipped as a product and/or a disk image.
//!
//! iOS only supports static linking, so an iOS SDK is a single framework
//! bundle (one merged static library plus flattened headers) installed into
//! the user's home folder.

mod app;
mod buildtools;
mod component;
mod distribution;
mod framework;
mod ios;
mod plist;
mod pmdoc;
mod product;

pub use app::ApplicationPackager;
pub use buildtools::PackageBuild;
pub use component::ComponentPackager;
pub use distribution::{BundleChoice, DistributionXml};
pub use framework::{FrameworkBundle, create_framework_headers, versioned_include_dirs};
pub use ios::IosPackager;
pub use plist::{BundleType, InfoPlist};
pub use pmdoc::PmDoc;
pub use product::ProductPackager;

use crate::config::PackagingConfig;
use crate::error::{Error, Result};
use crate::package::{PackageBase, PackageEntity, Resource};
use crate::packager::{PackContext, Packager, make_executable};
use std::path::{Path, PathBuf};

pub fn new_packager(ctx: &PackContext, name: &str) -> Result<Box<dyn Packager>> {
    Ok(match ctx.package(name)? {
        PackageEntity::Package(_) => Box::new(ComponentPackager::new(ctx, name)),
        PackageEntity::Meta(_) => Box::new(ProductPackager::new(ctx, name)),
        PackageEntity::App(_) => Box::new(ApplicationPackager::new(ctx, name)),
    })
}

pub fn new_ios_packager(ctx: &PackContext, name: &str) -> Result<Box<dyn Packager>> {
    match ctx.package(name)? {
        PackageEntity::Meta(_) => Ok(Box::new(IosPackager::new(ctx, name))),
        _ => Err(Error::Usage(format!(
            "iOS packages are built from meta packages only, {} is not one",
            name
        ))),
    }
}

/// `<name>-<version>-<arch><suffix>`
pub(crate) fn artifact_name(config: &PackagingConfig, name: &str, version: &str, suffix: &str) -> String {
    format!("{}-{}-{}{}", name, version, config.target_arch, suffix)
}

/// Framework name derived from the package title, e.g. `GStreamer`
pub(crate) fn framework_name(base: &PackageBase) -> String {
    base.title().chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Copy the install scripts of a package into `dir`
///
/// Returns the directory when it holds at least one script.
pub(crate) fn copy_scripts(base: &PackageBase, dir: &Path) -> Result<Option<PathBuf>> {
    let mut found = false;
    for (resource, script) in [(Resource::PreInstall, "preinstall"), (Resource::PostInstall, "postinstall")] {
        if let Some(src) = base.existing_resource(resource) {
            std::fs::create_dir_all(dir)?;
            let dest = dir.join(script);
            std::fs::copy(&src, &dest)?;
            make_executable(&dest)?;
            found = true;
        }
    }
    Ok(found.then(|| dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Architecture, Distro, Platform};
    use tempfile::TempDir;

    #[test]
    fn test_names() {
        let config = PackagingConfig::new("/opt/sdk", Platform::Darwin, Architecture::Universal, Distro::Osx);
        assert_eq!(artifact_name(&config, "sdk-devel", "1.0", ".pkg"), "sdk-devel-1.0-universal.pkg");

        let mut base = PackageBase::new("sdk", "1.0", "SDK");
        base.title = Some("GStreamer 1.0".to_string());
        assert_eq!(framework_name(&base), "GStreamer10");
    }

    #[test]
    fn test_copy_scripts() {
        let resources = TempDir::new().unwrap();
        std::fs::write(resources.path().join("post.sh"), "#!/bin/sh\n").unwrap();
        let mut base = PackageBase::new("sdk", "1.0", "SDK");
        base.resources_dir = Some(resources.path().to_path_buf());

        let out = TempDir::new().unwrap();
        let scripts = out.path().join("Resources");
        assert_eq!(copy_scripts(&base, &scripts).unwrap(), None);

        base.resources.postinstall = Some(PathBuf::from("post.sh"));
        assert_eq!(copy_scripts(&base, &scripts).unwrap(), Some(scripts.clone()));
        assert!(scripts.join("postinstall").is_file());
        assert!(!scripts.join("preinstall").exists());
    }
}
