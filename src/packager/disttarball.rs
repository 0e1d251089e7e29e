// src/packager/disttarball.rs

//! Distribution tarballs
//!
//! The generic backend, used directly for targets without a native format
//! and as the staging primitive of the Linux packagers. Produces
//! `<prefix-><name>-<platform>-<arch>-<version><suffix>.<ext>` with a
//! runtime and (optionally) a devel archive.

use crate::config::{Platform, TarballCompression};
use crate::error::{Error, Result};
use crate::package::{PackageEntity, PackageType};
use crate::packager::{
    PackContext, PackOptions, PackSession, Packager, StagingDir, check_output, copy_files,
    files_or_empty, name_prefix,
};
use crate::strip::Strip;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use xz2::write::XzEncoder;
use zip::write::SimpleFileOptions;

pub fn new_packager(ctx: &PackContext, name: &str) -> Result<Box<dyn Packager>> {
    Ok(Box::new(DistTarball::new(ctx, name)?))
}

pub struct DistTarball {
    ctx: PackContext,
    name: String,
    compression: TarballCompression,
    /// Separate runtime and devel archives
    split: bool,
    /// Directory all entries are placed under inside the archive
    archive_root: Option<String>,
    strip: bool,
    runtime_suffix: &'static str,
    devel_suffix: &'static str,
}

impl DistTarball {
    pub fn new(ctx: &PackContext, name: &str) -> Result<Self> {
        let package = ctx.package(name)?;
        Ok(Self {
            ctx: ctx.clone(),
            name: name.to_string(),
            compression: ctx.config.package_tarball_compression,
            split: true,
            archive_root: None,
            strip: package.base().strip,
            runtime_suffix: PackageType::Runtime.suffix(),
            devel_suffix: PackageType::Devel.suffix(),
        })
    }

    /// Merge devel files into the runtime archive when false
    pub fn with_split(mut self, split: bool) -> Self {
        self.split = split;
        self
    }

    pub fn with_archive_root(mut self, root: impl Into<String>) -> Self {
        self.archive_root = Some(root.into());
        self
    }

    pub fn with_compression(mut self, compression: TarballCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Name suffixes of the runtime and devel archives
    pub fn with_suffixes(mut self, runtime: &'static str, devel: &'static str) -> Self {
        self.runtime_suffix = runtime;
        self.devel_suffix = devel;
        self
    }

    fn package(&self) -> Result<&PackageEntity> {
        self.ctx.package(&self.name)
    }

    fn suffix(&self, mode: PackageType) -> &'static str {
        match mode {
            PackageType::Devel => self.devel_suffix,
            _ => self.runtime_suffix,
        }
    }

    /// Archive file name for the given mode
    pub fn artifact_name(&self, mode: PackageType) -> Result<String> {
        self.artifact_name_with_ext(mode, self.compression.extension())
    }

    pub(crate) fn artifact_name_with_ext(&self, mode: PackageType, ext: &str) -> Result<String> {
        let config = &self.ctx.config;
        let package = self.package()?;
        let platform = match config.target_platform {
            Platform::Windows => config.windows_toolchain.to_string(),
            other => other.to_string(),
        };
        Ok(format!(
            "{}{}-{}-{}-{}{}.{}",
            name_prefix(config, package.base()),
            package.name(),
            platform,
            config.target_arch,
            package.version(),
            self.suffix(mode),
            ext
        ))
    }

    /// Runtime and devel files, empty lists for empty parts
    pub(crate) fn resolve_files(&self, opts: &PackOptions) -> Result<(Vec<String>, Vec<String>)> {
        let mut runtime = files_or_empty(&self.ctx, &self.name, PackageType::Runtime, opts.force)?;
        if runtime.is_empty() {
            warn!("The runtime package of {} is empty", self.name);
        }

        let mut devel = Vec::new();
        if opts.devel {
            devel = files_or_empty(&self.ctx, &self.name, PackageType::Devel, opts.force)?;
            if devel.is_empty() {
                warn!("The development package of {} is empty", self.name);
            }
        }

        if !self.split {
            runtime.append(&mut devel);
            runtime.sort();
            runtime.dedup();
        }

        if runtime.is_empty() && devel.is_empty() {
            return Err(Error::EmptyPackage(self.name.clone()));
        }
        Ok((runtime, devel))
    }

    /// Write the archives and return their paths
    pub fn pack_files(&self, output_dir: &Path, opts: &PackOptions) -> Result<Vec<PathBuf>> {
        let (runtime, devel) = self.resolve_files(opts)?;

        let mut paths = Vec::new();
        if !runtime.is_empty() {
            paths.push(self.create_tarball(output_dir, PackageType::Runtime, &runtime, opts)?);
        }
        if self.split && !devel.is_empty() {
            paths.push(self.create_tarball(output_dir, PackageType::Devel, &devel, opts)?);
        }
        Ok(paths)
    }

    pub(crate) fn create_tarball(
        &self,
        output_dir: &Path,
        mode: PackageType,
        files: &[String],
        opts: &PackOptions,
    ) -> Result<PathBuf> {
        let path = output_dir.join(self.artifact_name(mode)?);
        check_output(&path, opts.force)?;
        std::fs::create_dir_all(output_dir)?;

        let prefix = &self.ctx.config.prefix;
        if self.strip && mode == PackageType::Runtime {
            let scratch = StagingDir::new_in(&self.ctx.config.scratch_dir(), "distpack-strip-", opts.keep_temp)?;
            copy_files(prefix, files, scratch.path())?;
            let base = self.package()?.base();
            Strip::new(&self.ctx.config, &base.strip_excludes)
                .strip_files(self.ctx.runner.as_ref(), scratch.path(), files)?;
            self.write_tar(&path, scratch.path(), files)?;
        } else {
            self.write_tar(&path, prefix, files)?;
        }
        info!("Created {}", path.display());
        Ok(path)
    }

    fn write_tar(&self, path: &Path, root: &Path, files: &[String]) -> Result<()> {
        let result = write_archive(path, root, files, self.archive_root.as_deref(), self.compression);
        if result.is_err() && path.exists() {
            let mut partial = path.as_os_str().to_owned();
            partial.push(".partial");
            std::fs::rename(path, &partial)?;
        }
        result
    }
}

/// Write a tarball of `files` (relative to `root`), symlinks kept as links
pub fn write_archive(
    path: &Path,
    root: &Path,
    files: &[String],
    archive_root: Option<&str>,
    compression: TarballCompression,
) -> Result<()> {
    let file = File::create(path)?;
    match compression {
        TarballCompression::None => {
            let mut builder = tar::Builder::new(file);
            append_files(&mut builder, root, files, archive_root)?;
            builder.into_inner()?.flush()?;
        }
        TarballCompression::Gz => {
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
            append_files(&mut builder, root, files, archive_root)?;
            builder.into_inner()?.finish()?;
        }
        TarballCompression::Xz => {
            let mut builder = tar::Builder::new(XzEncoder::new(file, 6));
            append_files(&mut builder, root, files, archive_root)?;
            builder.into_inner()?.finish()?;
        }
    }
    Ok(())
}

/// Write a zip archive; entries are `(name in archive, source path)`
///
/// Symlinks are stored as links, directories are skipped.
pub fn write_zip(path: &Path, entries: &[(String, PathBuf)]) -> Result<()> {
    let archive_error = |e: zip::result::ZipError| Error::Archive(format!("{}: {}", path.display(), e));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut zip = zip::ZipWriter::new(File::create(path)?);
    for (name, src) in entries {
        let meta = std::fs::symlink_metadata(src)?;
        if meta.file_type().is_symlink() {
            let target = std::fs::read_link(src)?;
            zip.add_symlink(name.clone(), target.to_string_lossy().to_string(), options)
                .map_err(archive_error)?;
        } else if meta.is_file() {
            zip.start_file(name.clone(), options).map_err(archive_error)?;
            std::io::copy(&mut File::open(src)?, &mut zip)?;
        }
    }
    zip.finish().map_err(archive_error)?;
    Ok(())
}

fn append_files<W: Write>(
    builder: &mut tar::Builder<W>,
    root: &Path,
    files: &[String],
    archive_root: Option<&str>,
) -> Result<()> {
    builder.follow_symlinks(false);
    let mut unique: Vec<&String> = files.iter().collect();
    unique.sort();
    unique.dedup();
    for f in unique {
        let name = match archive_root {
            Some(dir) => Path::new(dir).join(f),
            None => PathBuf::from(f),
        };
        builder.append_path_with_name(root.join(f), &name)?;
    }
    Ok(())
}

impl Packager for DistTarball {
    fn package_name(&self) -> &str {
        &self.name
    }

    fn pack_with(
        &self,
        output_dir: &Path,
        opts: &PackOptions,
        _session: &mut PackSession,
    ) -> Result<Vec<PathBuf>> {
        self.pack_files(output_dir, opts)
    }
}
