// src/packager/android.rs

//! Android distribution archives
//!
//! Tarballs named `<name>-android-<arch>-<version>-runtime.<ext>` and
//! `<name>-android-<arch>-<version>.<ext>` for the devel part, each with a
//! `.zip` twin holding the same entries for hosts without tar.

use crate::error::{Error, Result};
use crate::package::PackageType;
use crate::packager::disttarball::{DistTarball, write_zip};
use crate::packager::{PackContext, PackOptions, PackSession, Packager, check_output};
use std::path::{Path, PathBuf};
use tracing::info;

/// Devel files living under these prefixes are not shipped to Android
const DEVEL_EXCLUDES: &[&str] = &["bin/", "share/aclocal"];

pub fn new_packager(ctx: &PackContext, name: &str) -> Result<Box<dyn Packager>> {
    Ok(Box::new(AndroidPackager::new(ctx, name)?))
}

pub struct AndroidPackager {
    ctx: PackContext,
    name: String,
    tarball: DistTarball,
}

impl AndroidPackager {
    pub fn new(ctx: &PackContext, name: &str) -> Result<Self> {
        Ok(Self {
            ctx: ctx.clone(),
            name: name.to_string(),
            tarball: DistTarball::new(ctx, name)?.with_suffixes("-runtime", ""),
        })
    }

    fn create_zip(&self, output_dir: &Path, mode: PackageType, files: &[String], force: bool) -> Result<PathBuf> {
        let path = output_dir.join(self.tarball.artifact_name_with_ext(mode, "zip")?);
        check_output(&path, force)?;
        let prefix = &self.ctx.config.prefix;
        let entries: Vec<(String, PathBuf)> = files.iter().map(|f| (f.clone(), prefix.join(f))).collect();
        write_zip(&path, &entries)?;
        info!("Created {}", path.display());
        Ok(path)
    }
}

fn filter_devel(files: Vec<String>) -> Vec<String> {
    files
        .into_iter()
        .filter(|f| !DEVEL_EXCLUDES.iter().any(|excluded| f.starts_with(excluded)))
        .collect()
}

impl Packager for AndroidPackager {
    fn package_name(&self) -> &str {
        &self.name
    }

    fn pack_with(
        &self,
        output_dir: &Path,
        opts: &PackOptions,
        _session: &mut PackSession,
    ) -> Result<Vec<PathBuf>> {
        let (runtime, devel) = self.tarball.resolve_files(opts)?;
        let devel = filter_devel(devel);
        if runtime.is_empty() && devel.is_empty() {
            return Err(Error::EmptyPackage(self.name.clone()));
        }

        let mut paths = Vec::new();
        for (mode, files) in [(PackageType::Runtime, &runtime), (PackageType::Devel, &devel)] {
            if files.is_empty() {
                continue;
            }
            paths.push(self.tarball.create_tarball(output_dir, mode, files, opts)?);
            paths.push(self.create_zip(output_dir, mode, files, opts.force)?);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Architecture, Distro, PackagingConfig, Platform};
    use crate::manifest::RecipeManifest;
    use crate::package::{Package, PackageBase};
    use crate::packager::{ToolCommand, ToolRunner};
    use crate::store::PackagesStore;
    use std::fs::File;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct NoTools;

    impl ToolRunner for NoTools {
        fn output(&self, _command: &ToolCommand) -> Result<String> {
            Ok(String::new())
        }

        fn is_available(&self, _program: &str) -> bool {
            false
        }
    }

    fn setup() -> (TempDir, PackContext) {
        let prefix = TempDir::new().unwrap();
        let files = [
            "lib/libfoo.so",
            "bin/foo-config",
            "include/foo.h",
            "share/aclocal/foo.m4",
            "lib/pkgconfig/foo.pc",
        ];
        for f in files {
            let p = prefix.path().join(f);
            std::fs::create_dir_all(p.parent().unwrap()).unwrap();
            std::fs::write(p, f).unwrap();
        }
        let mut manifest = RecipeManifest::new();
        manifest.add_files("foo", "libs", ["lib/libfoo.so"]);
        manifest.add_files("foo", "devel", ["bin/foo-config", "include/foo.h", "share/aclocal/foo.m4", "lib/pkgconfig/foo.pc"]);
        let mut store = PackagesStore::new(Platform::Android, Arc::new(manifest));
        store
            .add_package(Package::new(PackageBase::new("foo", "1.0", "Foo"), vec![], &["foo".to_string()], &[]))
            .unwrap();
        let cfg = PackagingConfig::new(prefix.path(), Platform::Android, Architecture::Arm64, Distro::Android);
        let ctx = PackContext::new(Arc::new(cfg), Arc::new(store), Arc::new(NoTools));
        (prefix, ctx)
    }

    fn zip_entries(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        names
    }

    #[test]
    fn test_devel_filter() {
        let files = vec![
            "bin/foo-config".to_string(),
            "share/aclocal/foo.m4".to_string(),
            "include/foo.h".to_string(),
        ];
        assert_eq!(filter_devel(files), vec!["include/foo.h"]);
    }

    #[test]
    fn test_archives_and_zips() {
        let (_prefix, ctx) = setup();
        let out = TempDir::new().unwrap();
        let paths = AndroidPackager::new(&ctx, "foo")
            .unwrap()
            .pack(out.path(), &PackOptions::default())
            .unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "foo-android-arm64-1.0-runtime.tar.gz".to_string(),
                "foo-android-arm64-1.0-runtime.zip".to_string(),
                "foo-android-arm64-1.0.tar.gz".to_string(),
                "foo-android-arm64-1.0.zip".to_string(),
            ]
        );
        assert_eq!(zip_entries(&paths[1]), vec!["lib/libfoo.so"]);
        assert_eq!(zip_entries(&paths[3]), vec!["include/foo.h", "lib/pkgconfig/foo.pc"]);
    }
}
