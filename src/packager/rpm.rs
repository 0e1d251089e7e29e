// src/packager/rpm.rs

//! RPM packages
//!
//! Renders a `.spec` for each package into a private `rpmbuild` top
//! directory and builds it with `rpmbuild -bb`. Meta packages get a spec
//! without sources whose only content is their requirements.

use crate::config::Architecture;
use crate::error::{Error, Result};
use crate::package::{PackageEntity, PackageType, Resource};
use crate::packager::linux::{
    embeds_deps, full_package_name, get_meta_requires, get_requires, licenses, native_name,
    source_tarball,
};
use crate::packager::{
    PackContext, PackOptions, PackSession, PackedInfo, Packager, StagingDir, ToolCommand,
    collect_artifacts, files_or_empty, pack_deps, place_artifact,
};
use std::path::{Path, PathBuf};
use tracing::info;

/// Suffix of RPM development packages
pub const DEVEL_SUFFIX: &str = "-devel";

const TREE: [&str; 5] = ["BUILD", "SOURCES", "RPMS", "SRPMS", "SPECS"];

pub fn new_packager(ctx: &PackContext, name: &str) -> Result<Box<dyn Packager>> {
    ctx.package(name)?;
    Ok(Box::new(RpmPackager {
        ctx: ctx.clone(),
        name: name.to_string(),
    }))
}

/// `rpmbuild --target` value for an architecture
pub fn build_target(arch: Architecture) -> Result<&'static str> {
    match arch {
        Architecture::X86 => Ok("i686-redhat-linux"),
        Architecture::X86_64 => Ok("x86_64-redhat-linux"),
        other => Err(Error::UnsupportedArch(other.to_string())),
    }
}

/// `%files` entries; python modules also own their compiled variants
pub fn spec_files(files: &[String]) -> String {
    let mut entries: Vec<String> = files.to_vec();
    for f in files.iter().filter(|f| f.ends_with(".py")) {
        for compiled in [format!("{}c", f), format!("{}o", f)] {
            if !entries.contains(&compiled) {
                entries.push(compiled);
            }
        }
    }
    entries
        .iter()
        .map(|f| format!("%{{prefix}}/{}", f))
        .collect::<Vec<_>>()
        .join("\n")
}

fn requires_lines(requires: &[String]) -> String {
    requires.iter().map(|r| format!("Requires: {}\n", r)).collect()
}

/// Values substituted into the spec templates
struct SpecValues {
    topdir: String,
    package_name: String,
    name: String,
    version: String,
    summary: String,
    description: String,
    source: String,
    licenses: String,
    prefix: String,
    packager: String,
    vendor: String,
    url: String,
    requires: String,
    devel_package: String,
    scripts: String,
    files: String,
    devel_files: String,
}

fn render_spec(v: &SpecValues) -> String {
    format!(
        "
%define _topdir {topdir}
%define _package_name {package_name}

Name:           {name}
Version:        {version}
Release:        1
Summary:        {summary}
Source:         {source}
Group:          Applications/Internet
License:        {licenses}
Prefix:         {prefix}
Packager:       {packager}
Vendor:         {vendor}
{url}
{requires}

%description
{description}

{devel_package}

%prep
%setup -n %{{_package_name}}

%build

%install
mkdir -p $RPM_BUILD_ROOT/%{{prefix}}
cp -r $RPM_BUILD_DIR/%{{_package_name}}/* $RPM_BUILD_ROOT/%{{prefix}}

%clean
rm -rf $RPM_BUILD_ROOT

{scripts}

%files
{files}

{devel_files}
",
        topdir = v.topdir,
        package_name = v.package_name,
        name = v.name,
        version = v.version,
        summary = v.summary,
        source = v.source,
        licenses = v.licenses,
        prefix = v.prefix,
        packager = v.packager,
        vendor = v.vendor,
        url = v.url,
        requires = v.requires,
        description = v.description,
        devel_package = v.devel_package,
        scripts = v.scripts,
        files = v.files,
        devel_files = v.devel_files,
    )
}

fn render_meta_spec(v: &SpecValues) -> String {
    format!(
        "
%define _topdir {topdir}
%define _package_name {package_name}

Name:           {name}
Version:        {version}
Release:        1
Summary:        {summary}
Group:          Applications/Internet
License:        {licenses}
Packager:       {packager}
Vendor:         {vendor}
{url}

{requires}

%description
{description}

{devel_package}

%prep

%build

%install

%clean
rm -rf $RPM_BUILD_ROOT

%files

{devel_files}
",
        topdir = v.topdir,
        package_name = v.package_name,
        name = v.name,
        version = v.version,
        summary = v.summary,
        licenses = v.licenses,
        packager = v.packager,
        vendor = v.vendor,
        url = v.url,
        requires = v.requires,
        description = v.description,
        devel_package = v.devel_package,
        devel_files = v.devel_files,
    )
}

fn render_devel_package(name: &str, requires: &str) -> String {
    format!(
        "
%package devel
{requires}
Summary: Development files for {name}
Provides: {name}{suffix}

%description devel
Development files for {name}
",
        requires = requires,
        name = name,
        suffix = DEVEL_SUFFIX,
    )
}

pub struct RpmPackager {
    ctx: PackContext,
    name: String,
}

impl RpmPackager {
    fn package(&self) -> Result<&PackageEntity> {
        self.ctx.package(&self.name)
    }

    fn scripts(&self, package: &PackageEntity) -> Result<String> {
        let base = package.base();
        let mut scripts = String::new();
        for (resource, section) in [
            (Resource::PreInstall, "%pre"),
            (Resource::PostInstall, "%post"),
            (Resource::PostRemove, "%postun"),
        ] {
            if let Some(path) = base.existing_resource(resource) {
                let content = std::fs::read_to_string(&path)?;
                scripts.push_str(&format!("{}\n{}\n", section, content));
            }
        }
        Ok(scripts)
    }

    /// Runtime and devel requirements, as `Requires:` lines
    fn requires(&self, session: &PackSession, package: &PackageEntity) -> Result<(String, String)> {
        match package {
            PackageEntity::Meta(meta) => {
                let runtime = get_meta_requires(&self.ctx, session, meta, PackageType::Runtime, DEVEL_SUFFIX)?;
                let devel = get_meta_requires(&self.ctx, session, meta, PackageType::Devel, DEVEL_SUFFIX)?;
                // rpm has no weak dependencies here: selected members are required too
                let runtime: Vec<String> = runtime.requires.into_iter().chain(runtime.recommends).collect();
                let devel: Vec<String> = devel.requires.into_iter().chain(devel.recommends).collect();
                Ok((requires_lines(&runtime), requires_lines(&devel)))
            }
            _ => Ok((
                requires_lines(&get_requires(&self.ctx, session, package, PackageType::Runtime, DEVEL_SUFFIX)?),
                requires_lines(&get_requires(&self.ctx, session, package, PackageType::Devel, DEVEL_SUFFIX)?),
            )),
        }
    }

    fn spec(
        &self,
        session: &PackSession,
        topdir: &Path,
        source: Option<&str>,
        runtime: &[String],
        devel: &[String],
        has_devel: bool,
    ) -> Result<String> {
        let package = self.package()?;
        let base = package.base();
        let (requires, devel_requires) = self.requires(session, package)?;

        let licenses = if package.is_meta() {
            vec![base.license.clone()]
        } else {
            licenses(&self.ctx, package, has_devel)?
        };

        let native = native_name(&self.ctx, package);
        let (devel_package, devel_files) = if has_devel {
            (
                render_devel_package(&native, &devel_requires),
                format!("%files devel \n{}", spec_files(devel)),
            )
        } else {
            (String::new(), String::new())
        };

        let values = SpecValues {
            topdir: topdir.display().to_string(),
            package_name: full_package_name(&self.ctx, package),
            name: native,
            version: base.version.clone(),
            summary: base.shortdesc.clone(),
            description: base.description().to_string(),
            source: source.unwrap_or_default().to_string(),
            licenses: licenses.join(" and "),
            prefix: base.install_dir(&self.ctx.config).display().to_string(),
            packager: self.ctx.config.packager.clone(),
            vendor: base.vendor().to_string(),
            url: base.url.as_deref().map(|u| format!("URL: {}\n", u)).unwrap_or_default(),
            requires,
            devel_package,
            scripts: self.scripts(package)?,
            files: spec_files(runtime),
            devel_files,
        };

        Ok(if package.is_meta() {
            render_meta_spec(&values)
        } else {
            render_spec(&values)
        })
    }
}

impl Packager for RpmPackager {
    fn package_name(&self) -> &str {
        &self.name
    }

    fn pack_with(
        &self,
        output_dir: &Path,
        opts: &PackOptions,
        session: &mut PackSession,
    ) -> Result<Vec<PathBuf>> {
        let target = build_target(self.ctx.config.target_arch)?;
        let package = self.package()?;
        let is_meta = package.is_meta();
        self.ctx.config.check_packager();

        let mut paths = Vec::new();
        if !embeds_deps(package) {
            paths.extend(pack_deps(&self.ctx, &self.name, output_dir, opts, session, new_packager)?);
        }

        let topdir = StagingDir::new("distpack-rpm-", opts.keep_temp)?;
        for d in TREE {
            topdir.subdir(d)?;
        }

        let (source, runtime, devel) = if is_meta {
            (None, Vec::new(), Vec::new())
        } else {
            let tarball = source_tarball(
                &self.ctx,
                package,
                opts,
                &topdir.join("SOURCES"),
                self.ctx.config.package_tarball_compression,
            )?;
            let source = tarball.file_name().map(|n| n.to_string_lossy().into_owned());
            let runtime = files_or_empty(&self.ctx, &self.name, PackageType::Runtime, opts.force)?;
            let devel = if opts.devel {
                files_or_empty(&self.ctx, &self.name, PackageType::Devel, opts.force)?
            } else {
                Vec::new()
            };
            (source, runtime, devel)
        };

        let info = PackedInfo {
            has_runtime: is_meta || !runtime.is_empty(),
            has_devel: if is_meta { opts.devel } else { !devel.is_empty() },
        };
        session.record(&self.name, info);

        info!("Creating package for {}", self.name);
        let spec = self.spec(session, topdir.path(), source.as_deref(), &runtime, &devel, info.has_devel)?;
        let spec_path = topdir.join("SPECS").join(format!("{}.spec", self.name));
        std::fs::write(&spec_path, spec)?;

        self.ctx.runner.run(
            &ToolCommand::new("rpmbuild")
                .arg("-bb")
                .arg("--buildroot")
                .arg_path(&topdir.join("buildroot"))
                .arg("--target")
                .arg(target)
                .arg_path(&spec_path)
                .envs(&self.ctx.config.env),
        )?;

        for rpm in collect_artifacts(&topdir.join("RPMS"), "*.rpm", 2)? {
            paths.push(place_artifact(&rpm, output_dir, opts.force)?);
        }
        Ok(paths)
    }
}
