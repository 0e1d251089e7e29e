// tests/workflow.rs

//! Descriptors loaded from disk through to distribution archives.

mod common;

use common::{FakeRunner, Fixture, leaf, meta, names};
use distpack::{
    Architecture, ArtifactType, Distro, Error, PackContext, PackOptions, PackagerRegistry,
    PackagesStore, PackagingConfig, Platform, RecipeManifest,
};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const MANIFEST: &str = r#"
[recipes.base]
licenses = ["LGPLv2+"]

[recipes.base.categories]
libs = ["lib/libbase.so.1"]
devel = ["include/base.h", "bin/base-config"]

[recipes.top.categories]
bins = ["bin/top"]
"#;

const BASE: &str = r#"
kind = "package"
name = "base"
shortdesc = "Base library"
version = "1.0"
files = ["base:libs"]
"#;

const TOP: &str = r#"
kind = "package"
name = "top"
shortdesc = "Top tool"
version = "1.0"
deps = ["base"]
files = ["top:bins"]
"#;

const SDK: &str = r#"
kind = "meta"
name = "sdk"
shortdesc = "Test SDK"
version = "1.0"
packages = [
    { name = "top", required = true, selected = true },
]
"#;

/// Install prefix and descriptor tree laid out the way the CLI reads them
struct Workspace {
    dir: TempDir,
    prefix: TempDir,
}

impl Workspace {
    fn new(descriptors: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        let prefix = TempDir::new().unwrap();
        for f in ["lib/libbase.so.1", "include/base.h", "bin/base-config", "bin/top"] {
            let path = prefix.path().join(f);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, f).unwrap();
        }

        std::fs::write(dir.path().join("manifest.toml"), MANIFEST).unwrap();
        let packages = dir.path().join("packages");
        std::fs::create_dir(&packages).unwrap();
        for (file, content) in descriptors {
            std::fs::write(packages.join(file), content).unwrap();
        }
        std::fs::write(
            dir.path().join("distpack.toml"),
            format!(
                "target_platform = \"linux\"\ntarget_arch = \"x86_64\"\ntarget_distro = \"none\"\nprefix = \"{}\"\n",
                prefix.path().display()
            ),
        )
        .unwrap();
        Self { dir, prefix }
    }

    fn load(&self) -> distpack::Result<(PackagingConfig, PackagesStore)> {
        let config = PackagingConfig::from_file(&self.dir.path().join("distpack.toml"))?;
        let manifest = RecipeManifest::from_file(&self.dir.path().join("manifest.toml"))?;
        let store = PackagesStore::load_dir(
            &self.dir.path().join("packages"),
            config.target_platform,
            Arc::new(manifest),
        )?;
        store.validate()?;
        Ok((config, store))
    }
}

fn tar_entries(path: &Path) -> Vec<String> {
    let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).unwrap()));
    let mut entries: Vec<String> = archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
        .collect();
    entries.sort();
    entries
}

#[test]
fn test_loaded_meta_package_to_tarballs() {
    let ws = Workspace::new(&[("base.toml", BASE), ("top.toml", TOP), ("sdk.toml", SDK), ("README", "ignored")]);
    let (config, store) = ws.load().unwrap();
    assert_eq!(config.prefix, ws.prefix.path());

    let listed: Vec<&str> = store.packages_list().iter().map(|p| p.name()).collect();
    assert_eq!(listed, vec!["base", "sdk", "top"]);
    assert_eq!(store.deps_names("sdk", true).unwrap(), vec!["top", "base"]);

    let ctx = PackContext::new(Arc::new(config), Arc::new(store), Arc::new(FakeRunner::new()));
    let output = TempDir::new().unwrap();
    let paths = PackagerRegistry::with_defaults()
        .packager(&ctx, "sdk", ArtifactType::Default)
        .unwrap()
        .pack(output.path(), &PackOptions::default())
        .unwrap();

    assert_eq!(
        names(&paths),
        vec!["sdk-linux-x86_64-1.0-devel.tar.gz", "sdk-linux-x86_64-1.0.tar.gz"]
    );
    let runtime = output.path().join("sdk-linux-x86_64-1.0.tar.gz");
    assert_eq!(tar_entries(&runtime), vec!["bin/top", "lib/libbase.so.1"]);
    let devel = output.path().join("sdk-linux-x86_64-1.0-devel.tar.gz");
    assert_eq!(tar_entries(&devel), vec!["bin/base-config", "include/base.h"]);
}

#[test]
fn test_validation_errors() {
    let dangling = r#"
kind = "package"
name = "top"
shortdesc = "Top tool"
version = "1.0"
deps = ["missing"]
files = ["top:bins"]
"#;
    let ws = Workspace::new(&[("top.toml", dangling)]);
    assert!(matches!(ws.load(), Err(Error::PackageNotFound(name)) if name == "missing"));

    let unknown_recipe = r#"
kind = "package"
name = "other"
shortdesc = "Other"
version = "1.0"
files = ["nowhere:libs"]
"#;
    let ws = Workspace::new(&[("other.toml", unknown_recipe)]);
    assert!(matches!(ws.load(), Err(Error::RecipeNotFound(recipe)) if recipe == "nowhere"));

    let cyclic_base = BASE.replace("files =", "deps = [\"top\"]\nfiles =");
    let ws = Workspace::new(&[("base.toml", &cyclic_base), ("top.toml", TOP)]);
    assert!(matches!(ws.load(), Err(Error::DependencyCycle(cycle)) if cycle.len() == 3));

    let ws = Workspace::new(&[("base.toml", BASE), ("again.toml", BASE)]);
    assert!(matches!(ws.load(), Err(Error::DuplicatePackage(name)) if name == "base"));

    let ws = Workspace::new(&[("broken.toml", "kind = \"package\"\nname = 3\n")]);
    assert!(matches!(ws.load(), Err(Error::Descriptor { .. })));
}

fn fixture() -> Fixture {
    Fixture::new()
        .recipe("base", "libs", &["lib/libbase.so"])
        .recipe("base", "devel", &["include/base.h", "lib/pkgconfig/base.pc", "bin/base-config"])
        .package(leaf("base", &[], &["base:libs"], &[]))
        .package(meta("sdk", &[("base", true, true)]))
}

#[test]
fn test_android_archives() {
    let fixture = fixture();
    let config = fixture.config(Platform::Android, Architecture::Arm64, Distro::Android);
    let ctx = fixture.context(config, Arc::new(FakeRunner::new()));
    let paths = PackagerRegistry::with_defaults()
        .packager(&ctx, "base", ArtifactType::Default)
        .unwrap()
        .pack(fixture.output_dir(), &PackOptions::default())
        .unwrap();

    assert_eq!(
        names(&paths),
        vec![
            "base-android-arm64-1.0-runtime.tar.gz",
            "base-android-arm64-1.0-runtime.zip",
            "base-android-arm64-1.0.tar.gz",
            "base-android-arm64-1.0.zip",
        ]
    );
    // host tools are not shipped in the devel archive
    let devel = fixture.output_dir().join("base-android-arm64-1.0.tar.gz");
    assert_eq!(tar_entries(&devel), vec!["include/base.h", "lib/pkgconfig/base.pc"]);

    let zip = File::open(fixture.output_dir().join("base-android-arm64-1.0-runtime.zip")).unwrap();
    let archive = zip::ZipArchive::new(zip).unwrap();
    assert_eq!(archive.file_names().collect::<Vec<_>>(), vec!["lib/libbase.so"]);
}

#[test]
fn test_tarball_artifact_on_any_distro() {
    let fixture = fixture();
    let runner = Arc::new(FakeRunner::new());
    let mut config = fixture.config(Platform::Linux, Architecture::X86, Distro::Debian);
    config.packages_prefix = Some("gst".to_string());
    let ctx = fixture.context(config, runner.clone());
    let registry = PackagerRegistry::with_defaults();

    let paths = registry
        .packager(&ctx, "base", ArtifactType::Tarball)
        .unwrap()
        .pack(fixture.output_dir(), &PackOptions::default())
        .unwrap();
    assert_eq!(
        names(&paths),
        vec!["gst-base-linux-x86-1.0-devel.tar.gz", "gst-base-linux-x86-1.0.tar.gz"]
    );
    assert!(runner.calls().is_empty());

    assert!(matches!(
        registry.packager(&ctx, "base", ArtifactType::Inno),
        Err(Error::NoPackager(_))
    ));
}

#[test]
fn test_runtime_only_tarball() {
    let fixture = fixture();
    let config = fixture.config(Platform::Linux, Architecture::X86_64, Distro::Gentoo);
    let ctx = fixture.context(config, Arc::new(FakeRunner::new()));
    let opts = PackOptions {
        devel: false,
        ..PackOptions::default()
    };
    let paths = PackagerRegistry::with_defaults()
        .packager(&ctx, "sdk", ArtifactType::Default)
        .unwrap()
        .pack(fixture.output_dir(), &opts)
        .unwrap();
    assert_eq!(names(&paths), vec!["sdk-linux-x86_64-1.0.tar.gz"]);
}
