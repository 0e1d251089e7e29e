// src/packager/osx/app.rs

//! Application bundles
//!
//! ```text
//! <App>.app/Contents/Info.plist
//! <App>.app/Contents/MacOS/<App>      copy of Contents/Home/bin/<App>
//! <App>.app/Contents/Resources/       icon
//! <App>.app/Contents/Home/            the application's files
//! ```

use super::buildtools::{PackageBuild, hdiutil_create, product_build};
use super::distribution::DistributionXml;
use super::plist::{BundleType, InfoPlist};
use super::{artifact_name, copy_scripts};
use crate::error::{Error, Result};
use crate::package::{App, PackageRef, PackageType, Resource};
use crate::packager::{
    PackContext, PackOptions, PackSession, PackedInfo, Packager, StagingDir, check_output, copy_files,
    files_list, symlink,
};
use crate::strip::Strip;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct ApplicationPackager {
    ctx: PackContext,
    name: String,
}

impl ApplicationPackager {
    pub fn new(ctx: &PackContext, name: &str) -> Self {
        Self {
            ctx: ctx.clone(),
            name: name.to_string(),
        }
    }

    fn app(&self) -> Result<&App> {
        self.ctx
            .package(&self.name)?
            .as_app()
            .ok_or_else(|| Error::Usage(format!("{} is not an application", self.name)))
    }

    /// Lay out the `.app` bundle in `appdir`
    fn create_bundle(&self, appdir: &Path, files: &[String]) -> Result<()> {
        let app = self.app()?;
        let base = &app.base;
        let contents = appdir.join("Contents");
        let home = contents.join("Home");
        let macos = contents.join("MacOS");
        let resources = contents.join("Resources");
        for dir in [&home, &macos, &resources] {
            std::fs::create_dir_all(dir)?;
        }
        copy_files(&self.ctx.config.prefix, files, &home)?;

        let mut plist = InfoPlist::new(
            app.app_name(),
            &base.identifier(PackageType::Runtime),
            &base.version,
            &base.shortdesc,
            BundleType::Application,
        );
        plist.min_os_version = Some(self.ctx.config.min_osx_version.clone());
        if let Some(icon) = base.existing_resource(Resource::Icon)
            && let Some(icon_name) = icon.file_name()
        {
            std::fs::copy(&icon, resources.join(icon_name))?;
            plist.icon = Some(icon_name.to_string_lossy().to_string());
        }
        plist.save(&contents.join("Info.plist"))?;

        let executable = home.join("bin").join(app.app_name());
        if executable.is_file() {
            debug!("Adding main executable {}", executable.display());
            std::fs::copy(&executable, macos.join(app.app_name()))?;
        }

        if base.strip {
            let strip = Strip::new(&self.ctx.config, &base.strip_excludes);
            for dir in &base.strip_dirs {
                let dir = home.join(dir);
                if dir.is_dir() {
                    strip.strip_dir(self.ctx.runner.as_ref(), &dir)?;
                }
            }
        }
        Ok(())
    }

    /// Product archive installing the bundle into `/Applications`
    fn create_product(&self, staging: &StagingDir, approot: &Path, output: &Path) -> Result<()> {
        let app = self.app()?;
        let base = &app.base;
        let config = &self.ctx.config;

        let component_dir = staging.subdir("component")?;
        let component = artifact_name(config, &base.name, &base.version, ".pkg");
        let build = PackageBuild {
            root: approot.to_path_buf(),
            identifier: base.identifier(PackageType::Runtime),
            version: base.version.clone(),
            install_location: PathBuf::from("/Applications"),
            min_os_version: config.min_osx_version.clone(),
            scripts: copy_scripts(base, &staging.join("Resources"))?,
        };
        self.ctx.runner.run(&build.command(&component_dir.join(&component)))?;

        // dependencies are embedded in the bundle, never referenced
        let files = BTreeMap::from([(self.name.clone(), component)]);
        let embedded: BTreeSet<String> = self.ctx.store.deps_names(&self.name, true)?.into_iter().collect();
        let members = vec![PackageRef::new(&self.name, true, true)];
        let distribution_path = staging.join("Distribution.xml");
        DistributionXml::new(&self.ctx, base, members, PackageType::Runtime, &files, &embedded)
            .write(&distribution_path)?;
        info!("Creating {}", output.display());
        self.ctx
            .runner
            .run(&product_build(&distribution_path, output, &[component_dir]))
    }
}

impl Packager for ApplicationPackager {
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
        let app = self.app()?;
        let base = &app.base;
        let config = &self.ctx.config;
        let files = files_list(&self.ctx, &self.name, PackageType::Runtime, opts.force)?;

        let pkg = output_dir.join(artifact_name(config, &base.name, &base.version, ".pkg"));
        let dmg = output_dir.join(artifact_name(config, app.app_name(), &base.version, ".dmg"));
        if app.osx_create_pkg {
            check_output(&pkg, opts.force)?;
        }
        if app.osx_create_dmg {
            check_output(&dmg, opts.force)?;
        }
        std::fs::create_dir_all(&output_dir)?;

        let staging = StagingDir::new("distpack-app-", opts.keep_temp)?;
        let approot = staging.subdir("app")?;
        let appdir = approot.join(format!("{}.app", app.app_name()));
        info!("Creating application bundle {}", appdir.display());
        self.create_bundle(&appdir, &files)?;
        session.record(
            &self.name,
            PackedInfo {
                has_runtime: true,
                has_devel: false,
            },
        );

        let mut paths = Vec::new();
        if app.osx_create_pkg {
            self.create_product(&staging, &approot, &pkg)?;
            paths.push(pkg);
            symlink("/Applications", approot.join("Applications"))?;
        }
        if app.osx_create_dmg {
            info!("Creating image {}", dmg.display());
            self.ctx
                .runner
                .run(&hdiutil_create(&dmg, &approot, Some(app.app_name())))?;
            paths.push(dmg);
        }
        Ok(paths)
    }
}
