// src/packager/registry.rs

//! Backend selection
//!
//! The registry maps `(distro, distro version, artifact type)` to a packager
//! constructor and the native tool it needs. It is built once at startup
//! with [`PackagerRegistry::with_defaults`] and handed to the pipeline.
//!
//! Lookup is tolerant: an unknown distro version falls back to the generic
//! entry for the distro, and a backend whose tool is not installed falls
//! back to the distribution tarball.

use crate::config::{Distro, DistroVersion};
use crate::error::{Error, Result};
use crate::packager::{
    PackContext, Packager, android, debian, disttarball, inno, osx, rpm, wix,
};
use std::collections::HashMap;
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::{debug, info, warn};

/// Flavour of artifact requested from a distro's backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactType {
    #[default]
    Default,
    Inno,
    Tarball,
}

/// Constructor of a packager for one package of the store
pub type PackagerFactory = fn(&PackContext, &str) -> Result<Box<dyn Packager>>;

#[derive(Clone)]
struct Entry {
    factory: PackagerFactory,
    /// Native tool the backend drives, if any
    tool: Option<&'static str>,
}

type Key = (Distro, Option<DistroVersion>, ArtifactType);

#[derive(Clone, Default)]
pub struct PackagerRegistry {
    entries: HashMap<Key, Entry>,
}

impl std::fmt::Debug for PackagerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self
            .entries
            .keys()
            .map(|(d, v, t)| match v {
                Some(v) => format!("{}/{}/{}", d, v, t),
                None => format!("{}/{}", d, t),
            })
            .collect();
        keys.sort();
        f.debug_struct("PackagerRegistry").field("entries", &keys).finish()
    }
}

impl PackagerRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in backend
    pub fn with_defaults() -> Self {
        let mut r = Self::new();
        r.register(Distro::Debian, None, ArtifactType::Default, debian::new_packager, Some("dpkg-buildpackage"));
        r.register(Distro::Redhat, None, ArtifactType::Default, rpm::new_packager, Some("rpmbuild"));
        r.register(Distro::Suse, None, ArtifactType::Default, rpm::new_packager, Some("rpmbuild"));
        r.register(Distro::Windows, None, ArtifactType::Default, wix::new_packager, Some("ninja"));
        r.register(Distro::Windows, None, ArtifactType::Inno, inno::new_packager, None);
        r.register(Distro::Osx, None, ArtifactType::Default, osx::new_packager, Some("pkgbuild"));
        r.register(Distro::Ios, None, ArtifactType::Default, osx::new_ios_packager, Some("pkgbuild"));
        r.register(Distro::Android, None, ArtifactType::Default, android::new_packager, None);
        r.register(Distro::Gentoo, None, ArtifactType::Default, disttarball::new_packager, None);
        r.register(Distro::None, None, ArtifactType::Default, disttarball::new_packager, None);
        r
    }

    /// Register a backend, replacing any previous entry for the same key
    pub fn register(
        &mut self,
        distro: Distro,
        version: Option<DistroVersion>,
        artifact: ArtifactType,
        factory: PackagerFactory,
        tool: Option<&'static str>,
    ) {
        self.entries.insert((distro, version, artifact), Entry { factory, tool });
    }

    fn lookup(
        &self,
        distro: Distro,
        version: Option<&DistroVersion>,
        artifact: ArtifactType,
    ) -> Option<&Entry> {
        if let Some(v) = version {
            if let Some(entry) = self.entries.get(&(distro, Some(v.clone()), artifact)) {
                return Some(entry);
            }
            if self.entries.contains_key(&(distro, None, artifact)) {
                warn!(
                    "No specific packager available for the distro version {}, \
                     using generic packager for distro {}",
                    v, distro
                );
            }
        }
        self.entries.get(&(distro, None, artifact))
    }

    /// Constructor for the configured target
    pub fn factory(&self, ctx: &PackContext, artifact: ArtifactType) -> Result<PackagerFactory> {
        let config = &ctx.config;
        let distro = config.target_distro;

        let entry = match self.lookup(distro, config.target_distro_version.as_ref(), artifact) {
            Some(entry) => entry,
            None if artifact == ArtifactType::Tarball => {
                debug!("Using distribution tarball packager for {}", distro);
                return Ok(disttarball::new_packager);
            }
            None => return Err(Error::NoPackager(distro.to_string())),
        };

        if let Some(tool) = entry.tool
            && !ctx.runner.is_available(tool)
        {
            warn!(
                "Tool {} required by the {} packager was not found, \
                 falling back to the distribution tarball packager",
                tool, distro
            );
            return Ok(disttarball::new_packager);
        }
        Ok(entry.factory)
    }

    /// Build the packager for `package` on the configured target
    pub fn packager(
        &self,
        ctx: &PackContext,
        package: &str,
        artifact: ArtifactType,
    ) -> Result<Box<dyn Packager>> {
        ctx.package(package)?;
        let factory = self.factory(ctx, artifact)?;
        info!("Creating {} packager for {}", ctx.config.target_distro, package);
        factory(ctx, package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Architecture, PackagingConfig, Platform};
    use crate::manifest::RecipeManifest;
    use crate::package::{Package, PackageBase};
    use crate::packager::{ToolCommand, ToolRunner};
    use crate::store::PackagesStore;
    use std::sync::Arc;

    struct Tools(Vec<&'static str>);

    impl ToolRunner for Tools {
        fn output(&self, _command: &ToolCommand) -> Result<String> {
            Ok(String::new())
        }

        fn is_available(&self, program: &str) -> bool {
            self.0.contains(&program)
        }
    }

    fn ctx(distro: Distro, version: Option<&str>, tools: Vec<&'static str>) -> PackContext {
        let mut config = PackagingConfig::new("/opt", Platform::Linux, Architecture::X86_64, distro);
        config.target_distro_version = version.map(DistroVersion::new);
        let mut store = PackagesStore::new(Platform::Linux, Arc::new(RecipeManifest::new()));
        store
            .add_package(Package::new(PackageBase::new("foo", "1.0", "Foo"), vec![], &[], &[]))
            .unwrap();
        PackContext::new(Arc::new(config), Arc::new(store), Arc::new(Tools(tools)))
    }

    fn same(a: PackagerFactory, b: PackagerFactory) -> bool {
        std::ptr::fn_addr_eq(a, b)
    }

    #[test]
    fn test_exact_distro() {
        let registry = PackagerRegistry::with_defaults();
        let c = ctx(Distro::Debian, None, vec!["dpkg-buildpackage"]);
        let f = registry.factory(&c, ArtifactType::Default).unwrap();
        assert!(same(f, debian::new_packager));
    }

    #[test]
    fn test_unknown_version_uses_generic() {
        let registry = PackagerRegistry::with_defaults();
        let c = ctx(Distro::Redhat, Some("fedora_99"), vec!["rpmbuild"]);
        let f = registry.factory(&c, ArtifactType::Default).unwrap();
        assert!(same(f, rpm::new_packager));
    }

    #[test]
    fn test_specific_version_wins() {
        let mut registry = PackagerRegistry::with_defaults();
        registry.register(
            Distro::Redhat,
            Some(DistroVersion::new("fedora_16")),
            ArtifactType::Default,
            disttarball::new_packager,
            None,
        );
        let c = ctx(Distro::Redhat, Some("fedora_16"), vec!["rpmbuild"]);
        let f = registry.factory(&c, ArtifactType::Default).unwrap();
        assert!(same(f, disttarball::new_packager));
    }

    #[test]
    fn test_missing_tool_falls_back_to_tarball() {
        let registry = PackagerRegistry::with_defaults();
        let c = ctx(Distro::Debian, None, vec![]);
        let f = registry.factory(&c, ArtifactType::Default).unwrap();
        assert!(same(f, disttarball::new_packager));
    }

    #[test]
    fn test_no_packager() {
        let registry = PackagerRegistry::new();
        let c = ctx(Distro::Suse, None, vec![]);
        assert!(matches!(
            registry.factory(&c, ArtifactType::Default),
            Err(Error::NoPackager(d)) if d == "suse"
        ));
        let f = registry.factory(&c, ArtifactType::Tarball).unwrap();
        assert!(same(f, disttarball::new_packager));
    }

    #[test]
    fn test_unknown_package() {
        let registry = PackagerRegistry::with_defaults();
        let c = ctx(Distro::None, None, vec![]);
        assert!(registry.packager(&c, "bar", ArtifactType::Default).is_err());
        assert_eq!(
            registry.packager(&c, "foo", ArtifactType::Default).unwrap().package_name(),
            "foo"
        );
    }
}
