// src/packager/osx/product.rs

//! Product archives for meta packages

use super::buildtools::{PackageBuild, hdiutil_create, product_build};
use super::component::ComponentPackager;
use super::distribution::{BundleChoice, DistributionXml};
use super::framework::FrameworkBundle;
use super::pmdoc::PmDoc;
use super::{artifact_name, framework_name};
use crate::error::{Error, Result};
use crate::package::{MetaPackage, PackageBase, PackageType, display_name};
use crate::packager::{
    PackContext, PackOptions, PackSession, PackedInfo, Packager, StagingDir, check_output,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Component packages built for one mode of a product
#[derive(Debug, Default)]
struct Components {
    paths: BTreeMap<String, PathBuf>,
    files: BTreeMap<String, String>,
    empty: BTreeSet<String>,
}

impl Components {
    fn insert(&mut self, name: &str, path: PathBuf) {
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        self.files.insert(name.to_string(), file);
        self.paths.insert(name.to_string(), path);
    }
}

/// Framework bundle skeleton shipped with every macOS product
pub(crate) fn product_framework(base: &PackageBase, library: Option<String>) -> FrameworkBundle {
    FrameworkBundle {
        name: framework_name(base),
        identifier: format!("{}-framework", base.identifier(PackageType::Runtime)),
        version: base.version.clone(),
        description: format!("{} Framework Bundle Version {}", base.title(), base.version),
        library,
    }
}

pub struct ProductPackager {
    ctx: PackContext,
    name: String,
}

impl ProductPackager {
    pub fn new(ctx: &PackContext, name: &str) -> Self {
        Self {
            ctx: ctx.clone(),
            name: name.to_string(),
        }
    }

    fn meta(&self) -> Result<&MetaPackage> {
        self.ctx
            .package(&self.name)?
            .as_meta()
            .ok_or_else(|| Error::Usage(format!("{} is not a meta package", self.name)))
    }

    fn modes(opts: &PackOptions) -> Vec<PackageType> {
        if opts.devel {
            vec![PackageType::Runtime, PackageType::Devel]
        } else {
            vec![PackageType::Runtime]
        }
    }

    /// Build a component package for every package of the closure
    fn build_components(
        &self,
        packages_dir: &Path,
        opts: &PackOptions,
        session: &mut PackSession,
    ) -> Result<BTreeMap<PackageType, Components>> {
        let meta = self.meta()?;
        let config = &self.ctx.config;
        let mut components: BTreeMap<PackageType, Components> = BTreeMap::new();
        for dep in self.ctx.store.deps_names(&self.name, true)? {
            let component = ComponentPackager::new(&self.ctx, &dep)
                .with_install_dir(meta.base.install_dir(config))
                .with_version(meta.base.version.clone());
            for mode in Self::modes(opts) {
                let built = components.entry(mode).or_default();
                if session.is_empty(&dep) {
                    built.empty.insert(dep.clone());
                    continue;
                }
                info!("Creating {} package {}", mode, dep);
                match component.build(mode, packages_dir, opts)? {
                    Some(path) => built.insert(&dep, path),
                    None => {
                        built.empty.insert(dep.clone());
                        if mode == PackageType::Runtime {
                            session.mark_empty(&dep);
                        }
                    }
                }
            }
        }
        Ok(components)
    }

    /// Build the framework skeleton package, installed at the product root
    fn build_framework(&self, staging: &StagingDir, packages_dir: &Path) -> Result<BundleChoice> {
        let base = &self.meta()?.base;
        let config = &self.ctx.config;
        let bundle = product_framework(base, None);
        let root = staging.subdir("framework")?;
        bundle.create_layout(&root)?;

        let file = artifact_name(config, &format!("{}-framework", base.name), &base.version, ".pkg");
        let build = PackageBuild {
            root,
            identifier: bundle.identifier.clone(),
            version: base.version.clone(),
            install_location: base.install_dir(config),
            min_os_version: config.min_osx_version.clone(),
            scripts: None,
        };
        info!("Creating framework package {}", file);
        self.ctx.runner.run(&build.command(&packages_dir.join(&file)))?;
        Ok(BundleChoice {
            identifier: bundle.identifier,
            title: "Framework Bundle".to_string(),
            version: base.version.clone(),
            file,
        })
    }

    /// Disk image holding the runtime component packages
    fn create_packages_dmg(
        &self,
        staging: &StagingDir,
        output_dir: &Path,
        packages: &[PathBuf],
        opts: &PackOptions,
    ) -> Result<PathBuf> {
        let base = &self.meta()?.base;
        let dmg = output_dir.join(artifact_name(&self.ctx.config, &base.name, &base.version, "-packages.dmg"));
        check_output(&dmg, opts.force)?;
        let workdir = staging.subdir("hdidir")?;
        for p in packages {
            if let Some(name) = p.file_name() {
                std::fs::copy(p, workdir.join(name))?;
            }
        }
        info!("Creating image {}", dmg.display());
        self.ctx.runner.run(&hdiutil_create(&dmg, &workdir, None))?;
        Ok(dmg)
    }
}

impl Packager for ProductPackager {
    fn package_name(&self) -> &str {
        &self.name
    }

    fn pack_with(
        &self,
        output_dir: &Path,
        opts: &PackOptions,
        session: &mut PackSession,
    ) -> Result<Vec<PathBuf>> {
        let output_dir = std::path::absolute(output_dir)?;
        let meta = self.meta()?;
        let base = &meta.base;
        let config = &self.ctx.config;
        let members = meta.packages(self.ctx.store.platform());

        let staging = StagingDir::new("distpack-product-", opts.keep_temp)?;
        let packages_dir = staging.subdir("packages")?;
        let components = self.build_components(&packages_dir, opts, session)?;
        let framework = self.build_framework(&staging, &packages_dir)?;
        let no_components = Components::default();

        let mut paths = Vec::new();
        for mode in Self::modes(opts) {
            let built = components.get(&mode).unwrap_or(&no_components);
            if built.paths.is_empty() {
                if mode == PackageType::Runtime {
                    return Err(Error::EmptyPackage(self.name.clone()));
                }
                warn!("The {} product of {} is empty", mode, self.name);
                continue;
            }

            let output = output_dir.join(artifact_name(config, &display_name(base, mode), &base.version, ".pkg"));
            check_output(&output, opts.force)?;
            info!("Creating Distribution.xml for package {}", self.name);
            let mut distribution =
                DistributionXml::new(&self.ctx, base, members.clone(), mode, &built.files, &built.empty);
            if mode == PackageType::Runtime {
                distribution = distribution.with_bundle(framework.clone());
            }
            let distribution_path = staging.join(format!("Distribution-{}.xml", mode));
            distribution.write(&distribution_path)?;
            self.ctx
                .runner
                .run(&product_build(&distribution_path, &output, std::slice::from_ref(&packages_dir)))?;
            paths.push(output);

            if config.osx_pmdoc && mode == PackageType::Runtime {
                let pmdoc = PmDoc::new(&self.ctx, base, members.clone(), mode, &built.paths, &built.empty);
                paths.push(pmdoc.create(&output_dir, opts.keep_temp)?);
            }
        }
        session.record(
            &self.name,
            PackedInfo {
                has_runtime: true,
                has_devel: components.get(&PackageType::Devel).is_some_and(|c| !c.paths.is_empty()),
            },
        );

        let mut runtime: Vec<PathBuf> = components
            .get(&PackageType::Runtime)
            .map(|c| c.paths.values().cloned().collect())
            .unwrap_or_default();
        runtime.push(packages_dir.join(&framework.file));
        paths.push(self.create_packages_dmg(&staging, &output_dir, &runtime, opts)?);
        Ok(paths)
    }
}
