// src/packager/wix/mod.rs

//! WiX installers for Windows
//!
//! Leaf packages become merge modules (or fragments linked into a
//! library when the package opts into fragment composition). Meta packages
//! and apps become an MSI composing the merge modules of their dependency
//! closure. Sources are compiled by `candle`/`light` through a generated
//! `build.ninja`, so one `ninja` run builds the whole installer.

mod merge_module;
mod msi;
mod ninja;
mod packager;

pub use merge_module::MergeModule;
pub use msi::{Msi, MsiFeature};
pub use ninja::NinjaWriter;
pub use packager::{MergeModulePackager, MsiPackager};

use crate::config::{PackagingConfig, Platform};
use crate::error::Result;
use crate::package::{PackageBase, PackageEntity, PackageType, upgrade_uuid};
use crate::packager::{PackContext, Packager};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Component, Path};
use tracing::warn;

pub const WIX_NAMESPACE: &str = "http://schemas.microsoft.com/wix/2006/wi";

/// Longest identifier WiX accepts
const MAX_ID_LEN: usize = 72;

/// Leaf packages get a merge module, everything else an MSI
pub fn new_packager(ctx: &PackContext, name: &str) -> Result<Box<dyn Packager>> {
    Ok(match ctx.package(name)? {
        PackageEntity::Package(_) => Box::new(MergeModulePackager::new(ctx, name)?),
        _ => Box::new(MsiPackager::new(ctx, name)?),
    })
}

/// Turn a path or name into a WiX identifier
///
/// Separators and other invalid characters become `_`, dots are kept unless
/// `replace_dots` is set. Identifiers longer than WiX allows are truncated
/// and suffixed with a hash of the full input.
pub fn format_id(value: &str, replace_dots: bool) -> String {
    let mut id: String = value
        .chars()
        .map(|c| match c {
            '.' if !replace_dots => '.',
            c if c.is_ascii_alphanumeric() || c == '_' => c,
            _ => '_',
        })
        .collect();
    if !id.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        id.insert(0, '_');
    }
    if id.len() > MAX_ID_LEN {
        id = hashed_id(&id, value);
    }
    id
}

fn hashed_id(id: &str, source: &str) -> String {
    let digest = hex::encode(Sha256::digest(source.as_bytes()));
    let keep = MAX_ID_LEN - 17;
    format!("{}_{}", &id[..keep.min(id.len())], &digest[..16])
}

/// Allocates identifiers unique within one WiX source
///
/// Two different inputs that format to the same identifier (`a-b` and
/// `a_b`) get distinct ids; the same input always gets the same id.
#[derive(Debug, Default)]
pub struct IdAllocator {
    owners: HashMap<String, String>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&mut self, value: &str, replace_dots: bool) -> String {
        let id = format_id(value, replace_dots);
        match self.owners.get(&id) {
            Some(owner) if owner != value => {
                let id = hashed_id(&id, value);
                self.owners.insert(id.clone(), value.to_string());
                id
            }
            _ => {
                self.owners.insert(id.clone(), value.to_string());
                id
            }
        }
    }
}

/// `Level` of a feature: selected features install by default
pub fn format_level(selected: bool) -> &'static str {
    if selected { "1" } else { "4" }
}

/// `Absent` of a feature: required features cannot be deselected
pub fn format_absent(required: bool) -> &'static str {
    if required { "disallow" } else { "allow" }
}

/// Path as seen by Windows tools running under wine
pub fn to_wine_path(path: &Path) -> String {
    format!("z:{}", path.to_string_lossy().replace('/', "\\"))
}

/// Path of a source file for the WiX tools on the configured host
pub fn tool_path(config: &PackagingConfig, path: &Path) -> String {
    if config.with_wine() {
        to_wine_path(path)
    } else {
        path.to_string_lossy().to_string()
    }
}

/// `<name>-<toolchain>-<arch>-<version>`, the stem of installer artifacts
pub fn artifact_stem(config: &PackagingConfig, name: &str, version: &str) -> String {
    let platform = match config.target_platform {
        Platform::Windows => config.windows_toolchain.to_string(),
        other => other.to_string(),
    };
    format!("{}-{}-{}-{}", name, platform, config.target_arch, version)
}

/// Directories under Program Files the package installs into
///
/// Drive letters and roots are dropped; a package without any usable
/// component installs into a directory named after itself.
pub fn install_dir_components(config: &PackagingConfig, base: &PackageBase) -> Vec<String> {
    let components: Vec<String> = base
        .install_dir(config)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .filter(|part| !part.ends_with(':'))
        .collect();
    if components.is_empty() {
        vec![base.name.clone()]
    } else {
        components
    }
}

/// A fresh component GUID in the upper-case form WiX emits
pub fn new_guid() -> String {
    uuid::Uuid::new_v4().to_string().to_uppercase()
}

/// Upper-case upgrade code of the package, or a fresh one with a warning
///
/// Installers built with a fresh code do not upgrade previous installs.
pub fn upgrade_code_or_new(base: &PackageBase, mode: PackageType) -> String {
    match upgrade_uuid(base, mode) {
        Some(uuid) => uuid.to_uppercase(),
        None => {
            warn!("Package {} has no uuid, the installer will not upgrade", base.name);
            new_guid()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Architecture, Distro, WindowsToolchain};

    #[test]
    fn test_format_id() {
        assert_eq!(format_id("lib/gstreamer-1.0/libgstcore.dll", false), "lib_gstreamer_1.0_libgstcore.dll");
        assert_eq!(format_id("lib/gstreamer-1.0/libgstcore.dll", true), "lib_gstreamer_1_0_libgstcore_dll");
        assert_eq!(format_id("Core files", false), "Core_files");
        assert_eq!(format_id("1.0/bin", false), "_1.0_bin");
    }

    #[test]
    fn test_long_ids_are_hashed_and_stable() {
        let long = format!("share/{}/file.txt", "x".repeat(100));
        let a = format_id(&long, true);
        assert_eq!(a.len(), MAX_ID_LEN);
        assert_eq!(a, format_id(&long, true));

        let other = format!("share/{}/file.dat", "x".repeat(100));
        assert_ne!(a, format_id(&other, true));
    }

    #[test]
    fn test_allocator_resolves_collisions() {
        let mut ids = IdAllocator::new();
        let first = ids.id("lib/a-b", false);
        let second = ids.id("lib/a_b", false);
        assert_eq!(first, "lib_a_b");
        assert_ne!(first, second);
        assert!(second.starts_with("lib_a_b_"));
        assert_eq!(ids.id("lib/a-b", false), first);
    }

    #[test]
    fn test_levels() {
        assert_eq!(format_level(true), "1");
        assert_eq!(format_level(false), "4");
        assert_eq!(format_absent(true), "disallow");
        assert_eq!(format_absent(false), "allow");
    }

    #[test]
    fn test_wine_path() {
        assert_eq!(to_wine_path(Path::new("/opt/sdk/bin/a.dll")), "z:\\opt\\sdk\\bin\\a.dll");
    }

    #[test]
    fn test_artifact_stem() {
        let mut config = PackagingConfig::new("/opt", Platform::Windows, Architecture::X86_64, Distro::Windows);
        config.windows_toolchain = WindowsToolchain::Msvc;
        assert_eq!(artifact_stem(&config, "sdk", "1.2"), "sdk-msvc-x86_64-1.2");
    }
}
