// src/packager/osx/ios.rs

//! iOS framework installers
//!
//! The framework holds one static library merging every `.a` of the
//! closure, and the headers flattened into `Headers`. The product installs
//! into the user's home folder.

use super::buildtools::{PackageBuild, libtool_static, product_build};
use super::distribution::{BundleChoice, DistributionXml};
use super::framework::{create_framework_headers, versioned_include_dirs};
use super::product::product_framework;
use super::{artifact_name, framework_name};
use crate::error::{Error, Result};
use crate::package::{MetaPackage, PackageType};
use crate::packager::{
    PackContext, PackOptions, PackSession, PackedInfo, Packager, StagingDir, check_output, copy_files,
    files_or_empty,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct IosPackager {
    ctx: PackContext,
    name: String,
}

impl IosPackager {
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

    /// Runtime and devel files of the whole closure
    fn all_files(&self, opts: &PackOptions, session: &mut PackSession) -> Result<Vec<String>> {
        let mut files = BTreeSet::new();
        for dep in self.ctx.store.deps_names(&self.name, true)? {
            if session.is_empty(&dep) {
                continue;
            }
            let runtime = files_or_empty(&self.ctx, &dep, PackageType::Runtime, opts.force)?;
            let devel = files_or_empty(&self.ctx, &dep, PackageType::Devel, opts.force)?;
            if runtime.is_empty() && devel.is_empty() {
                warn!("Package {} is empty", dep);
                session.mark_empty(&dep);
            }
            files.extend(runtime);
            files.extend(devel);
        }
        Ok(files.into_iter().collect())
    }

    /// Fill `Versions/<version>` with the headers and the merged library
    fn fill_version_dir(&self, version_dir: &Path, library: &str, files: &[String]) -> Result<()> {
        let prefix = &self.ctx.config.prefix;
        let headers: Vec<String> = files.iter().filter(|f| f.starts_with("include/")).cloned().collect();
        copy_files(prefix, &headers, version_dir)?;
        let dirs = versioned_include_dirs(version_dir, prefix, &self.ctx.config.framework_include_dirs);
        create_framework_headers(version_dir, &dirs)?;
        let include = version_dir.join("include");
        if include.exists() {
            std::fs::remove_dir_all(include)?;
        }

        let static_libs: Vec<PathBuf> = files
            .iter()
            .filter(|f| f.ends_with(".a"))
            .map(|f| prefix.join(f))
            .collect();
        if static_libs.is_empty() {
            warn!("No static libraries to merge into the {} framework", library);
        } else {
            info!("Merging {} static libraries into {}", static_libs.len(), library);
            self.ctx.runner.run(&libtool_static(&version_dir.join(library), &static_libs))?;
        }
        Ok(())
    }
}

impl Packager for IosPackager {
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
        let base = &self.meta()?.base;
        let config = &self.ctx.config;

        let output = output_dir.join(artifact_name(
            config,
            &base.name,
            &base.version,
            &format!("-{}.pkg", config.target_platform),
        ));
        check_output(&output, opts.force)?;
        std::fs::create_dir_all(&output_dir)?;

        let files = self.all_files(opts, session)?;
        if files.is_empty() {
            return Err(Error::EmptyPackage(self.name.clone()));
        }

        let library = framework_name(base);
        let bundle = product_framework(base, Some(library.clone()));
        let staging = StagingDir::new("distpack-ios-", opts.keep_temp)?;
        let root = staging.subdir("root")?;
        let framework_dir = root.join(format!("{}.framework", library));
        info!("Creating framework {}", framework_dir.display());
        bundle.create_layout(&framework_dir)?;
        self.fill_version_dir(&framework_dir.join(bundle.version_dir()), &library, &files)?;

        let packages_dir = staging.subdir("packages")?;
        let component = artifact_name(config, &format!("{}-ios-framework", base.name), &base.version, ".pkg");
        let build = PackageBuild {
            root,
            identifier: bundle.identifier.clone(),
            version: base.version.clone(),
            install_location: base.install_dir(config),
            min_os_version: config.min_osx_version.clone(),
            scripts: None,
        };
        self.ctx.runner.run(&build.command(&packages_dir.join(&component)))?;

        let no_files = BTreeMap::new();
        let no_empty = BTreeSet::new();
        let distribution_path = staging.join("Distribution.xml");
        DistributionXml::new(&self.ctx, base, Vec::new(), PackageType::Devel, &no_files, &no_empty)
            .with_home_folder(true)
            .with_bundle(BundleChoice {
                identifier: bundle.identifier,
                title: bundle.description,
                version: base.version.clone(),
                file: component,
            })
            .write(&distribution_path)?;
        info!("Creating {}", output.display());
        self.ctx.runner.run(&product_build(&distribution_path, &output, &[packages_dir]))?;

        session.record(
            &self.name,
            PackedInfo {
                has_runtime: false,
                has_devel: true,
            },
        );
        Ok(vec![output])
    }
}
