// src/packager/linux.rs

//! Helpers shared by the Debian and RPM packagers

use crate::config::TarballCompression;
use crate::error::{Error, Result};
use crate::package::{MetaPackage, PackageEntity, PackageType};
use crate::packager::disttarball::DistTarball;
use crate::packager::{PackContext, PackOptions, PackSession, name_prefix};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Native name of a package, with the configured prefix
pub(crate) fn native_name(ctx: &PackContext, package: &PackageEntity) -> String {
    format!("{}{}", name_prefix(&ctx.config, package.base()), package.name())
}

/// `<native name>-<version>`, the name of the source tree
pub(crate) fn full_package_name(ctx: &PackContext, package: &PackageEntity) -> String {
    format!("{}-{}", native_name(ctx, package), package.version())
}

/// Whether the dependencies are embedded instead of required
pub(crate) fn embeds_deps(package: &PackageEntity) -> bool {
    package.as_app().is_some_and(|a| a.embed_deps)
}

fn has_runtime(session: &PackSession, name: &str) -> bool {
    session.info(name).map(|i| i.has_runtime).unwrap_or(true)
}

fn has_devel(session: &PackSession, name: &str) -> bool {
    session.info(name).map(|i| i.has_devel).unwrap_or(false)
}

/// Native requirements of a package for the given mode
///
/// Built from the direct dependencies minus the ones found empty. Devel
/// packages require the devel packages of their dependencies that have one,
/// plus their own runtime package. System dependencies are appended.
pub(crate) fn get_requires(
    ctx: &PackContext,
    session: &PackSession,
    package: &PackageEntity,
    mode: PackageType,
    devel_suffix: &str,
) -> Result<Vec<String>> {
    let mut requires = Vec::new();

    if !embeds_deps(package) {
        for dep in ctx.store.deps_names(package.name(), false)? {
            if session.is_empty(&dep) {
                debug!("Skipping empty dependency {} of {}", dep, package.name());
                continue;
            }
            let entity = ctx.package(&dep)?;
            match mode {
                PackageType::Devel if has_devel(session, &dep) => {
                    requires.push(format!("{}{}", native_name(ctx, entity), devel_suffix));
                }
                PackageType::Devel => {}
                _ => requires.push(native_name(ctx, entity)),
            }
        }
    }

    if mode == PackageType::Devel && has_runtime(session, package.name()) {
        requires.push(native_name(ctx, package));
    }

    let config = &ctx.config;
    requires.extend(package.base().sys_deps(
        config.target_distro,
        config.target_distro_version.as_ref(),
        mode,
    ));
    requires.sort();
    requires.dedup();
    Ok(requires)
}

/// Requirements of a meta package split by membership strength
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MetaRequires {
    pub requires: Vec<String>,
    pub recommends: Vec<String>,
    pub suggests: Vec<String>,
}

/// Required members become requirements, selected ones recommendations and
/// the rest suggestions; members without a package of this mode are skipped
pub(crate) fn get_meta_requires(
    ctx: &PackContext,
    session: &PackSession,
    meta: &MetaPackage,
    mode: PackageType,
    devel_suffix: &str,
) -> Result<MetaRequires> {
    let mut out = MetaRequires::default();
    for member in meta.packages(ctx.store.platform()) {
        let entity = ctx.package(&member.name)?;
        if session.is_empty(&member.name) {
            continue;
        }
        let mut name = native_name(ctx, entity);
        match mode {
            PackageType::Devel => {
                if !has_devel(session, &member.name) {
                    continue;
                }
                name.push_str(devel_suffix);
            }
            _ => {
                if !has_runtime(session, &member.name) {
                    continue;
                }
            }
        }
        if member.required {
            out.requires.push(name);
        } else if member.selected {
            out.recommends.push(name);
        } else {
            out.suggests.push(name);
        }
    }
    if mode == PackageType::Devel {
        out.requires.push(format!("{}{}", name_prefix(&ctx.config, &meta.base), meta.base.name));
    }
    Ok(out)
}

/// Licenses of a package: its own plus the recipes', sorted and unique
pub(crate) fn licenses(ctx: &PackContext, package: &PackageEntity, devel: bool) -> Result<Vec<String>> {
    let mut licenses = vec![package.base().license.clone()];
    licenses.extend(ctx.store.licenses(package.name(), PackageType::Runtime)?);
    if devel {
        licenses.extend(ctx.store.licenses(package.name(), PackageType::Devel)?);
    }
    licenses.sort();
    licenses.dedup();
    Ok(licenses)
}

/// Write the source tarball of a leaf package or app into `dir`
///
/// Runtime and devel files go into one archive rooted at the full package
/// name. An existing tarball is replaced.
pub(crate) fn source_tarball(
    ctx: &PackContext,
    package: &PackageEntity,
    opts: &PackOptions,
    dir: &Path,
    compression: TarballCompression,
) -> Result<PathBuf> {
    let tarball = DistTarball::new(ctx, package.name())?
        .with_split(false)
        .with_archive_root(full_package_name(ctx, package))
        .with_compression(compression);
    let staging_opts = PackOptions {
        force: true,
        ..*opts
    };
    tarball
        .pack_files(dir, &staging_opts)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::EmptyPackage(package.name().to_string()))
}

/// Stage every file of a leaf package or app as `<dir>/<full name>/...`
///
/// An uncompressed source tarball is written to `dir` and extracted in
/// place. Returns the tarball path.
pub(crate) fn stage_source(
    ctx: &PackContext,
    package: &PackageEntity,
    opts: &PackOptions,
    dir: &Path,
) -> Result<PathBuf> {
    let path = source_tarball(ctx, package, opts, dir, TarballCompression::None)?;
    debug!("Extracting {} into {}", path.display(), dir.display());
    let mut archive = tar::Archive::new(File::open(&path)?);
    archive.set_preserve_permissions(true);
    archive.unpack(dir)?;
    Ok(path)
}
