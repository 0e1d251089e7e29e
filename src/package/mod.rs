// src/package/mod.rs

//! Package entity model
//!
//! Three kinds of distributable units share a common [`PackageBase`]:
//!
//! - [`Package`]: a leaf unit with a concrete file manifest
//! - [`MetaPackage`]: an ordered, flagged grouping of other packages
//! - [`App`]: one application recipe plus optionally embedded dependencies
//!
//! Display values (name, description, upgrade code) depend on the
//! [`PackageType`] being produced. They are computed by pure functions that
//! take the mode explicitly; entities never carry a "current mode".

mod app;
mod base;
pub mod descriptor;
mod leaf;
mod meta;

pub use app::App;
pub use base::{PackageBase, Resource, Resources};
pub use descriptor::PackageDescriptor;
pub use leaf::{Package, RecipeRef};
pub use meta::{MetaPackage, PackageRef};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Which part of a package is being produced
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PackageType {
    Runtime,
    Devel,
    Debug,
}

impl PackageType {
    /// Suffix appended to package and artifact names
    pub fn suffix(&self) -> &'static str {
        match self {
            PackageType::Runtime => "",
            PackageType::Devel => "-devel",
            PackageType::Debug => "-dbg",
        }
    }
}

/// Package name as shown for the given mode (`foo`, `foo-devel`, `foo-dbg`)
pub fn display_name(base: &PackageBase, mode: PackageType) -> String {
    format!("{}{}", base.name, mode.suffix())
}

/// Short description as shown for the given mode
pub fn display_description(base: &PackageBase, mode: PackageType) -> String {
    match mode {
        PackageType::Runtime => base.shortdesc.clone(),
        PackageType::Devel => format!("{} (Development Files)", base.shortdesc),
        PackageType::Debug => format!("{} (Debug Files)", base.shortdesc),
    }
}

/// Upgrade code for the given mode
///
/// Devel and debug variants flip the first hex digit of the base UUID so all
/// three stay recognisably related yet never collide.
pub fn upgrade_uuid(base: &PackageBase, mode: PackageType) -> Option<String> {
    let uuid = base.uuid.as_deref()?;
    let flip = |marker: char, alternate: char| {
        let mut chars = uuid.chars();
        match chars.next() {
            Some(first) => {
                let replacement = if first == marker { alternate } else { marker };
                std::iter::once(replacement).chain(chars).collect()
            }
            None => String::new(),
        }
    };
    Some(match mode {
        PackageType::Runtime => uuid.to_string(),
        PackageType::Devel => flip('0', '1'),
        PackageType::Debug => flip('2', '3'),
    })
}

/// Any entry of the package store
#[derive(Debug, Clone)]
pub enum PackageEntity {
    Package(Package),
    Meta(MetaPackage),
    App(App),
}

impl PackageEntity {
    pub fn base(&self) -> &PackageBase {
        match self {
            PackageEntity::Package(p) => &p.base,
            PackageEntity::Meta(m) => &m.base,
            PackageEntity::App(a) => &a.base,
        }
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn version(&self) -> &str {
        &self.base().version
    }

    /// Descriptor kind, as used in descriptor files
    pub fn kind(&self) -> &'static str {
        match self {
            PackageEntity::Package(_) => "package",
            PackageEntity::Meta(_) => "meta",
            PackageEntity::App(_) => "app",
        }
    }

    pub fn is_meta(&self) -> bool {
        matches!(self, PackageEntity::Meta(_))
    }

    pub fn as_package(&self) -> Option<&Package> {
        match self {
            PackageEntity::Package(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_meta(&self) -> Option<&MetaPackage> {
        match self {
            PackageEntity::Meta(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_app(&self) -> Option<&App> {
        match self {
            PackageEntity::App(a) => Some(a),
            _ => None,
        }
    }
}

impl From<Package> for PackageEntity {
    fn from(p: Package) -> Self {
        PackageEntity::Package(p)
    }
}

impl From<MetaPackage> for PackageEntity {
    fn from(m: MetaPackage) -> Self {
        PackageEntity::Meta(m)
    }
}

impl From<App> for PackageEntity {
    fn from(a: App) -> Self {
        PackageEntity::App(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PackageBase {
        let mut base = PackageBase::new("foo", "1.0", "Foo");
        base.uuid = Some("3ffe67b2-4565-411f-8287-e8faa892f853".to_string());
        base
    }

    #[test]
    fn test_runtime_mode_is_identity() {
        let b = base();
        assert_eq!(display_name(&b, PackageType::Runtime), "foo");
        assert_eq!(display_description(&b, PackageType::Runtime), "Foo");
        assert_eq!(upgrade_uuid(&b, PackageType::Runtime), b.uuid);
    }

    #[test]
    fn test_devel_mode() {
        let b = base();
        assert_eq!(display_name(&b, PackageType::Devel), "foo-devel");
        assert_eq!(display_description(&b, PackageType::Devel), "Foo (Development Files)");
        assert_eq!(
            upgrade_uuid(&b, PackageType::Devel).unwrap(),
            "0ffe67b2-4565-411f-8287-e8faa892f853"
        );
        // entity untouched
        assert_eq!(b.name, "foo");
        assert_eq!(b.shortdesc, "Foo");
    }

    #[test]
    fn test_devel_uuid_flip_from_zero() {
        let mut b = base();
        b.uuid = Some("0ffe67b2-4565-411f-8287-e8faa892f853".to_string());
        assert_eq!(
            upgrade_uuid(&b, PackageType::Devel).unwrap(),
            "1ffe67b2-4565-411f-8287-e8faa892f853"
        );
    }

    #[test]
    fn test_modes_have_distinct_upgrade_codes() {
        let b = base();
        let runtime = upgrade_uuid(&b, PackageType::Runtime);
        let devel = upgrade_uuid(&b, PackageType::Devel);
        let debug = upgrade_uuid(&b, PackageType::Debug);
        assert_ne!(runtime, devel);
        assert_ne!(runtime, debug);
        assert_ne!(devel, debug);
    }

    #[test]
    fn test_no_uuid() {
        let mut b = base();
        b.uuid = None;
        assert!(upgrade_uuid(&b, PackageType::Devel).is_none());
    }

    #[test]
    fn test_mode_parsing() {
        use std::str::FromStr;
        assert_eq!(PackageType::from_str("devel").unwrap(), PackageType::Devel);
        assert_eq!(PackageType::Debug.suffix(), "-dbg");
    }
}
