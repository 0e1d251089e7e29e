// src/packager/debian.rs

//! Debian packages
//!
//! Builds a native source tree per package (`debian/` control files plus
//! the staged files) and runs `dpkg-buildpackage` on it. The `shlibs` file
//! generated for each package is kept in the session's shared tree so that
//! dependents can list it in their `debian/shlibs.local`.

use crate::config::Architecture;
use crate::error::{Error, Result};
use crate::package::{PackageEntity, PackageType};
use crate::packager::linux::{
    MetaRequires, embeds_deps, full_package_name, get_meta_requires, get_requires, licenses,
    native_name, stage_source,
};
use crate::packager::{
    PackContext, PackOptions, PackSession, PackedInfo, Packager, StagingDir, ToolCommand,
    collect_artifacts, files_or_empty, pack_deps, place_artifact,
};
use std::path::{Path, PathBuf};
use tracing::info;

/// Suffix of Debian development packages
pub const DEVEL_SUFFIX: &str = "-dev";

const COMPAT: &str = "7\n";
const SOURCE_FORMAT: &str = "3.0 (native)\n";

const RULES: &str = "#!/usr/bin/make -f

# Uncomment this to turn on verbose mode.
#export DH_VERBOSE=1

build: build-stamp
build-stamp:
\tdh_testdir
\ttouch build-stamp

clean:
\tdh_testdir
\tdh_testroot
\trm -f build-stamp
\tdh_clean

install: build
\tdh_testdir
\tdh_testroot
\tdh_prep
\tdh_installdirs
\tdh_installdocs
\tdh_install

# Build architecture-independent files here.
binary-indep: build install
# We have nothing to do by default.

# Build architecture-dependent files here.
binary-arch: build install
\tdh_testdir -a
\tdh_testroot -a
\t@DH_STRIP@
\tdh_link -a
\tdh_compress -a
\tdh_fixperms -a
\tdh_makeshlibs -a -V
\tdh_installdeb -a
\tdh_shlibdeps -a
\tdh_gencontrol -a
\tdh_md5sums -a
\tdh_builddeb -a

binary: binary-indep binary-arch
.PHONY: build clean binary-indep binary-arch binary install
";

pub fn new_packager(ctx: &PackContext, name: &str) -> Result<Box<dyn Packager>> {
    ctx.package(name)?;
    Ok(Box::new(DebianPackager {
        ctx: ctx.clone(),
        name: name.to_string(),
    }))
}

pub struct DebianPackager {
    ctx: PackContext,
    name: String,
}

/// `", a, b"` or nothing
fn depends_tail(requires: &[String]) -> String {
    if requires.is_empty() {
        String::new()
    } else {
        format!(", {}", requires.join(", "))
    }
}

fn optional_field(field: &str, values: &[String]) -> String {
    if values.is_empty() {
        String::new()
    } else {
        format!("{}: {}\n", field, values.join(", "))
    }
}

impl DebianPackager {
    fn package(&self) -> Result<&PackageEntity> {
        self.ctx.package(&self.name)
    }

    fn datetime() -> String {
        chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S +0000").to_string()
    }

    fn changelog(&self, package: &PackageEntity, datetime: &str) -> String {
        let base = package.base();
        let url = base
            .url
            .as_deref()
            .map(|u| format!("  * Full changelog can be found at {}\n", u))
            .unwrap_or_default();
        format!(
            "{name} ({version}-0) unstable; urgency=low\n\n  * Release {version}\n{url}\n -- {packager}  {datetime}\n",
            name = native_name(&self.ctx, package),
            version = base.version,
            url = url,
            packager = self.ctx.config.packager,
            datetime = datetime,
        )
    }

    fn control_source(&self, package: &PackageEntity) -> String {
        let homepage = package
            .base()
            .url
            .as_deref()
            .map(|u| format!("Homepage: {}\n", u))
            .unwrap_or_default();
        format!(
            "Source: {name}\nPriority: extra\nMaintainer: {packager}\nBuild-Depends: debhelper\nStandards-Version: 3.8.4\nSection: libs\n{homepage}\n",
            name = native_name(&self.ctx, package),
            packager = self.ctx.config.packager,
            homepage = homepage,
        )
    }

    fn control_runtime(&self, package: &PackageEntity, requires: &MetaRequires) -> String {
        let base = package.base();
        format!(
            "Package: {name}\nSection: libs\nArchitecture: any\nDepends: ${{shlibs:Depends}}, ${{misc:Depends}}{depends}\n{recommends}{suggests}Description: {shortdesc}\n {longdesc}\n\n",
            name = native_name(&self.ctx, package),
            depends = depends_tail(&requires.requires),
            recommends = optional_field("Recommends", &requires.recommends),
            suggests = optional_field("Suggests", &requires.suggests),
            shortdesc = base.shortdesc,
            longdesc = base.description(),
        )
    }

    fn control_debug(&self, package: &PackageEntity) -> String {
        let name = native_name(&self.ctx, package);
        format!(
            "Package: {name}-dbg\nSection: debug\nArchitecture: any\nDepends: {name} (= ${{binary:Version}})\nDescription: Debug symbols for {name}\n Debug symbols for {name}\n\n",
            name = name,
        )
    }

    fn control_devel(&self, package: &PackageEntity, requires: &MetaRequires) -> String {
        let name = native_name(&self.ctx, package);
        // the runtime package is pinned to the same version
        let depends: Vec<String> = requires
            .requires
            .iter()
            .map(|r| {
                if *r == name {
                    format!("{} (= ${{binary:Version}})", name)
                } else {
                    r.clone()
                }
            })
            .collect();
        let shortdesc = format!("Development files for {}", name);
        format!(
            "Package: {name}{suffix}\nSection: libdevel\nArchitecture: any\nDepends: ${{shlibs:Depends}}, ${{misc:Depends}}{depends}\n{recommends}{suggests}Description: {shortdesc}\n {shortdesc}\n\n",
            name = name,
            suffix = DEVEL_SUFFIX,
            depends = depends_tail(&depends),
            recommends = optional_field("Recommends", &requires.recommends),
            suggests = optional_field("Suggests", &requires.suggests),
            shortdesc = shortdesc,
        )
    }

    fn copyright(&self, licenses: &[String], datetime: &str) -> String {
        let locations: Vec<String> = licenses
            .iter()
            .map(|l| format!("/usr/share/common-licenses/{}", l))
            .collect();
        format!(
            "This package was debianized by {packager} on\n{datetime}.\n\nLicense:\n\n    {licenses}\n\nOn Debian systems, the complete text of the license(s) can be found in\n{locations}.\n\n",
            packager = self.ctx.config.packager,
            datetime = datetime,
            licenses = licenses.join(" "),
            locations = locations.join(", "),
        )
    }

    fn rules(&self, package: &PackageEntity) -> String {
        let dh_strip = if package.is_meta() {
            String::new()
        } else {
            let mut line = format!("dh_strip -a --dbg-package={}-dbg", native_name(&self.ctx, package));
            for exclude in &package.base().strip_excludes {
                line.push_str(&format!(" -X{}", exclude));
            }
            line
        };
        RULES.replace("@DH_STRIP@", &dh_strip)
    }

    /// `.install` lines mapping staged files to the install directory
    fn install_lines(&self, package: &PackageEntity, files: &[String]) -> String {
        let install_dir = package.base().install_dir(&self.ctx.config);
        let install_dir = install_dir.to_string_lossy();
        let install_dir = install_dir.trim_start_matches('/');
        files
            .iter()
            .map(|f| {
                let dir = Path::new(f)
                    .parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let target = if dir.is_empty() {
                    install_dir.to_string()
                } else {
                    format!("{}/{}", install_dir, dir)
                };
                format!("{} {}\n", f, target)
            })
            .collect()
    }

    fn check_arch(&self) -> Result<()> {
        match self.ctx.config.target_arch {
            Architecture::X86 | Architecture::X86_64 => Ok(()),
            other => Err(Error::UnsupportedArch(other.to_string())),
        }
    }

    fn write_shlibs_local(
        &self,
        debdir: &Path,
        shared: &Path,
    ) -> Result<()> {
        let deps = self.ctx.store.deps_names(&self.name, true)?;
        if deps.is_empty() {
            return Ok(());
        }
        let shlibs_local = debdir.join("shlibs.local");
        let mut content = String::new();
        for dep in deps {
            let path = shared.join(format!("{}-shlibs", dep));
            if !path.exists() {
                continue;
            }
            info!(
                "Copying generated shlibs file {} for dependency {} to {}",
                path.display(),
                dep,
                shlibs_local.display()
            );
            content.push_str(&std::fs::read_to_string(&path)?);
        }
        std::fs::write(&shlibs_local, content)?;
        Ok(())
    }
}

impl Packager for DebianPackager {
    fn package_name(&self) -> &str {
        &self.name
    }

    fn pack_with(
        &self,
        output_dir: &Path,
        opts: &PackOptions,
        session: &mut PackSession,
    ) -> Result<Vec<PathBuf>> {
        self.check_arch()?;
        let package = self.package()?;
        let is_meta = package.is_meta();
        self.ctx.config.check_packager();

        let mut paths = Vec::new();
        if !embeds_deps(package) {
            paths.extend(pack_deps(&self.ctx, &self.name, output_dir, opts, session, new_packager)?);
        }

        let staging = StagingDir::new("distpack-deb-", opts.keep_temp)?;
        let full_name = full_package_name(&self.ctx, package);
        info!("Creating debian package structure at {} for package {}", staging.path().display(), self.name);

        let (runtime, devel) = if is_meta {
            (Vec::new(), Vec::new())
        } else {
            stage_source(&self.ctx, package, opts, staging.path())?;
            let runtime = files_or_empty(&self.ctx, &self.name, PackageType::Runtime, opts.force)?;
            let devel = if opts.devel {
                files_or_empty(&self.ctx, &self.name, PackageType::Devel, opts.force)?
            } else {
                Vec::new()
            };
            (runtime, devel)
        };

        let srcdir = staging.subdir(&full_name)?;
        let debdir = staging.subdir(Path::new(&full_name).join("debian"))?;
        std::fs::create_dir_all(debdir.join("source"))?;

        let info = PackedInfo {
            has_runtime: is_meta || !runtime.is_empty(),
            has_devel: if is_meta { opts.devel } else { !devel.is_empty() },
        };
        session.record(&self.name, info);

        let (runtime_requires, devel_requires) = match package {
            PackageEntity::Meta(meta) => (
                get_meta_requires(&self.ctx, session, meta, PackageType::Runtime, DEVEL_SUFFIX)?,
                get_meta_requires(&self.ctx, session, meta, PackageType::Devel, DEVEL_SUFFIX)?,
            ),
            _ => (
                MetaRequires {
                    requires: get_requires(&self.ctx, session, package, PackageType::Runtime, DEVEL_SUFFIX)?,
                    ..MetaRequires::default()
                },
                MetaRequires {
                    requires: get_requires(&self.ctx, session, package, PackageType::Devel, DEVEL_SUFFIX)?,
                    ..MetaRequires::default()
                },
            ),
        };

        info!("Creating debian package for {}", self.name);
        let datetime = Self::datetime();
        let mut control = self.control_source(package);
        control.push_str(&self.control_runtime(package, &runtime_requires));
        if !is_meta && !runtime.is_empty() {
            control.push_str(&self.control_debug(package));
        }
        if info.has_devel {
            control.push_str(&self.control_devel(package, &devel_requires));
        }

        let native = native_name(&self.ctx, package);
        std::fs::write(debdir.join("changelog"), self.changelog(package, &datetime))?;
        std::fs::write(debdir.join("compat"), COMPAT)?;
        std::fs::write(debdir.join("control"), control)?;
        std::fs::write(
            debdir.join("copyright"),
            self.copyright(&licenses(&self.ctx, package, opts.devel)?, &datetime),
        )?;
        std::fs::write(debdir.join("rules"), self.rules(package))?;
        std::fs::write(debdir.join("source").join("format"), SOURCE_FORMAT)?;
        std::fs::write(
            debdir.join(format!("{}.install", native)),
            self.install_lines(package, &runtime),
        )?;
        if !devel.is_empty() {
            std::fs::write(
                debdir.join(format!("{}{}.install", native, DEVEL_SUFFIX)),
                self.install_lines(package, &devel),
            )?;
        }

        let shared = session.shared_dir(opts.keep_temp)?.to_path_buf();
        if !is_meta {
            self.write_shlibs_local(&debdir, &shared)?;
        }

        self.ctx.runner.run(
            &ToolCommand::new("dpkg-buildpackage")
                .args(["-rfakeroot", "-us", "-uc", "-D", "-b"])
                .envs(&self.ctx.config.env)
                .current_dir(&srcdir),
        )?;

        if !runtime.is_empty() {
            let shlibs = debdir.join(&native).join("DEBIAN").join("shlibs");
            if shlibs.exists() {
                let out = shared.join(format!("{}-shlibs", self.name));
                info!("Copying generated shlibs file {} to {}", shlibs.display(), out.display());
                std::fs::copy(&shlibs, &out)?;
            }
        }

        for deb in collect_artifacts(staging.path(), "*.deb", 1)? {
            paths.push(place_artifact(&deb, output_dir, opts.force)?);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Distro, PackagingConfig, Platform};
    use crate::manifest::RecipeManifest;
    use crate::package::{Package, PackageBase};
    use crate::packager::ToolRunner;
    use crate::store::PackagesStore;
    use std::sync::Arc;

    struct NoTools;

    impl ToolRunner for NoTools {
        fn output(&self, _command: &ToolCommand) -> Result<String> {
            Ok(String::new())
        }

        fn is_available(&self, _program: &str) -> bool {
            true
        }
    }

    fn packager(arch: Architecture) -> DebianPackager {
        let mut store = PackagesStore::new(Platform::Linux, Arc::new(RecipeManifest::new()));
        let mut base = PackageBase::new("gstreamer-test1", "1.0", "GStreamer Test");
        base.url = Some("http://gstreamer.freedesktop.org".to_string());
        base.strip_excludes = vec!["libfoo.so".to_string()];
        store.add_package(Package::new(base, vec![], &[], &[])).unwrap();
        let mut config = PackagingConfig::new("/usr", Platform::Linux, arch, Distro::Debian);
        config.packager = "Jane Doe <jane@example.org>".to_string();
        let ctx = PackContext::new(Arc::new(config), Arc::new(store), Arc::new(NoTools));
        DebianPackager {
            ctx,
            name: "gstreamer-test1".to_string(),
        }
    }

    #[test]
    fn test_install_lines() {
        let p = packager(Architecture::X86_64);
        let package = p.package().unwrap();
        let lines = p.install_lines(package, &["lib/libfoo.so.1".to_string(), "README".to_string()]);
        assert_eq!(lines, "lib/libfoo.so.1 usr/lib\nREADME usr\n");
    }

    #[test]
    fn test_rules_strip_line() {
        let p = packager(Architecture::X86_64);
        let rules = p.rules(p.package().unwrap());
        assert!(rules.contains("\tdh_strip -a --dbg-package=gstreamer-test1-dbg -Xlibfoo.so\n"));
        assert!(rules.starts_with("#!/usr/bin/make -f"));
    }

    #[test]
    fn test_control_stanzas() {
        let p = packager(Architecture::X86_64);
        let package = p.package().unwrap();
        let requires = MetaRequires {
            requires: vec!["gstreamer-test1".to_string(), "gstreamer-test2-dev".to_string()],
            ..MetaRequires::default()
        };
        let source = p.control_source(package);
        assert!(source.contains("Maintainer: Jane Doe <jane@example.org>\n"));
        assert!(source.contains("Homepage: http://gstreamer.freedesktop.org\n"));
        let devel = p.control_devel(package, &requires);
        assert!(devel.starts_with("Package: gstreamer-test1-dev\n"));
        assert!(devel.contains(
            "Depends: ${shlibs:Depends}, ${misc:Depends}, gstreamer-test1 (= ${binary:Version}), gstreamer-test2-dev\n"
        ));
        let runtime = p.control_runtime(package, &MetaRequires::default());
        assert!(runtime.contains("Depends: ${shlibs:Depends}, ${misc:Depends}\n"));
        assert!(!runtime.contains("Recommends"));
    }

    #[test]
    fn test_changelog() {
        let p = packager(Architecture::X86);
        let changelog = p.changelog(p.package().unwrap(), "Mon, 01 Jan 2024 00:00:00 +0000");
        assert!(changelog.starts_with("gstreamer-test1 (1.0-0) unstable; urgency=low\n"));
        assert!(changelog.contains("Full changelog can be found at http://gstreamer.freedesktop.org"));
        assert!(changelog.ends_with(" -- Jane Doe <jane@example.org>  Mon, 01 Jan 2024 00:00:00 +0000\n"));
    }

    #[test]
    fn test_unsupported_arch() {
        let p = packager(Architecture::Arm);
        let out = tempfile::TempDir::new().unwrap();
        let result = p.pack(out.path(), &PackOptions::default());
        assert!(matches!(result, Err(Error::UnsupportedArch(a)) if a == "arm"));
    }
}
