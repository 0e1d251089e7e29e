// src/packager/osx/component.rs

//! Flat component packages for single packages

use super::buildtools::PackageBuild;
use super::framework::{create_framework_headers, versioned_include_dirs};
use super::{artifact_name, copy_scripts};
use crate::error::{Error, Result};
use crate::package::{PackageBase, PackageType, display_name};
use crate::packager::{
    PackContext, PackOptions, PackSession, PackedInfo, Packager, StagingDir, check_output, copy_files,
    files_or_empty, pack_deps,
};
use crate::strip::Strip;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct ComponentPackager {
    ctx: PackContext,
    name: String,
    /// Install dir of the product this component belongs to
    install_dir: Option<PathBuf>,
    /// Version of the product this component belongs to
    version: Option<String>,
}

impl ComponentPackager {
    pub fn new(ctx: &PackContext, name: &str) -> Self {
        Self {
            ctx: ctx.clone(),
            name: name.to_string(),
            install_dir: None,
            version: None,
        }
    }

    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    fn base(&self) -> Result<&PackageBase> {
        Ok(self.ctx.package(&self.name)?.base())
    }

    fn version(&self) -> Result<String> {
        match &self.version {
            Some(v) => Ok(v.clone()),
            None => Ok(self.base()?.version.clone()),
        }
    }

    /// `<install dir>/Versions/<version>`
    pub fn install_location(&self) -> Result<PathBuf> {
        let dir = match &self.install_dir {
            Some(dir) => dir.clone(),
            None => self.base()?.install_dir(&self.ctx.config),
        };
        Ok(dir.join("Versions").join(self.version()?))
    }

    pub fn file_name(&self, mode: PackageType) -> Result<String> {
        let base = self.base()?;
        Ok(artifact_name(&self.ctx.config, &display_name(base, mode), &self.version()?, ".pkg"))
    }

    /// Build the component for one mode into `output_dir`
    ///
    /// Returns `None` when the package has no files for the mode.
    pub fn build(&self, mode: PackageType, output_dir: &Path, opts: &PackOptions) -> Result<Option<PathBuf>> {
        let config = &self.ctx.config;
        let base = self.base()?;
        let files = files_or_empty(&self.ctx, &self.name, mode, opts.force)?;
        if files.is_empty() {
            warn!("The {} package of {} is empty", mode, self.name);
            return Ok(None);
        }

        let output = output_dir.join(self.file_name(mode)?);
        check_output(&output, opts.force)?;
        std::fs::create_dir_all(output_dir)?;

        let staging = StagingDir::new("distpack-pkg-", opts.keep_temp)?;
        let root = staging.subdir("Root")?;
        info!("Creating package root for {} at {}", self.name, root.display());
        copy_files(&config.prefix, &files, &root)?;
        if base.strip && mode == PackageType::Runtime {
            Strip::new(config, &base.strip_excludes).strip_files(self.ctx.runner.as_ref(), &root, &files)?;
        }
        if mode == PackageType::Devel {
            let dirs = versioned_include_dirs(&root, &config.prefix, &config.framework_include_dirs);
            create_framework_headers(&root, &dirs)?;
        }
        let scripts = copy_scripts(base, &staging.join("Resources"))?;

        let build = PackageBuild {
            root,
            identifier: base.identifier(mode),
            version: self.version()?,
            install_location: self.install_location()?,
            min_os_version: config.min_osx_version.clone(),
            scripts,
        };
        info!("Creating {}", output.display());
        self.ctx.runner.run(&build.command(&output))?;
        Ok(Some(output))
    }
}

impl Packager for ComponentPackager {
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
        let mut paths = pack_deps(&self.ctx, &self.name, &output_dir, opts, session, super::new_packager)?;

        let runtime = self.build(PackageType::Runtime, &output_dir, opts)?;
        let devel = if opts.devel {
            self.build(PackageType::Devel, &output_dir, opts)?
        } else {
            None
        };
        if runtime.is_none() && devel.is_none() {
            return Err(Error::EmptyPackage(self.name.clone()));
        }
        session.record(
            &self.name,
            PackedInfo {
                has_runtime: runtime.is_some(),
                has_devel: devel.is_some(),
            },
        );
        paths.extend(runtime);
        paths.extend(devel);
        Ok(paths)
    }
}
