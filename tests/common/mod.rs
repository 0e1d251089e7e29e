// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.
//!
//! [`Fixture`] builds an install prefix, a recipe manifest and a store.
//! [`FakeRunner`] stands in for the native packaging tools: it records
//! every invocation and fabricates the files each tool would produce.

#![allow(dead_code)]

use distpack::{
    Architecture, Distro, MetaPackage, Package, PackageBase, PackageEntity, PackageRef, PackagesStore,
    PackagingConfig, Platform, RecipeManifest, ToolCommand, ToolRunner,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records commands and fakes their outputs
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<ToolCommand>>,
    missing: Vec<String>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner reporting the given tools as not installed
    pub fn without(tools: &[&str]) -> Self {
        Self {
            missing: tools.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Tool names in invocation order
    pub fn tools(&self) -> Vec<String> {
        self.calls().iter().map(tool_name).collect()
    }

    pub fn calls_to(&self, tool: &str) -> Vec<ToolCommand> {
        self.calls().into_iter().filter(|c| tool_name(c) == tool).collect()
    }
}

/// Name of the tool a command runs, looking through wine
pub fn tool_name(cmd: &ToolCommand) -> String {
    let program = match cmd.program() {
        "wine" => cmd.get_args().first().map(String::as_str).unwrap_or("wine"),
        p => p,
    };
    Path::new(program)
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"fake").unwrap();
}

fn arg_after(cmd: &ToolCommand, flag: &str) -> Option<String> {
    let args = cmd.get_args();
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).cloned()
}

fn fake_dpkg_buildpackage(cmd: &ToolCommand) {
    let srcdir = cmd.get_cwd().unwrap();
    let control = std::fs::read_to_string(srcdir.join("debian/control")).unwrap();
    let dir_name = srcdir.file_name().unwrap().to_string_lossy().to_string();
    let version = dir_name.rsplit_once('-').map(|(_, v)| v.to_string()).unwrap();
    for line in control.lines() {
        if let Some(name) = line.strip_prefix("Package: ") {
            touch(&srcdir.parent().unwrap().join(format!("{}_{}_amd64.deb", name, version)));
            let shlibs = srcdir.join("debian").join(name).join("DEBIAN/shlibs");
            std::fs::create_dir_all(shlibs.parent().unwrap()).unwrap();
            std::fs::write(shlibs, format!("lib{} 1 {}\n", name, name)).unwrap();
        }
    }
}

fn fake_rpmbuild(cmd: &ToolCommand) {
    let spec_path = PathBuf::from(cmd.get_args().last().unwrap());
    let topdir = spec_path.parent().unwrap().parent().unwrap();
    let target = arg_after(cmd, "--target").unwrap();
    let arch = target.split('-').next().unwrap();
    let spec = std::fs::read_to_string(&spec_path).unwrap();
    let field = |key: &str| {
        spec.lines()
            .find_map(|l| l.strip_prefix(key).map(|v| v.trim().to_string()))
            .unwrap()
    };
    let (name, version) = (field("Name:"), field("Version:"));
    let rpms = topdir.join("RPMS").join(arch);
    touch(&rpms.join(format!("{}-{}-1.{}.rpm", name, version, arch)));
    if spec.contains("%package devel") {
        touch(&rpms.join(format!("{}-devel-{}-1.{}.rpm", name, version, arch)));
    }
}

fn fake_ninja(cmd: &ToolCommand) {
    let build_dir = cmd.get_cwd().unwrap();
    let graph = std::fs::read_to_string(build_dir.join("build.ninja")).unwrap();
    for line in graph.lines() {
        if let Some(rest) = line.strip_prefix("build ") {
            let outputs = rest.split(':').next().unwrap();
            for output in outputs.split_whitespace() {
                touch(&build_dir.join(output));
            }
        }
    }
}

fn fake_iscc(cmd: &ToolCommand) {
    let build_dir = cmd.get_cwd().unwrap();
    let script = std::fs::read_to_string(build_dir.join("installer.iss")).unwrap();
    let base = script
        .lines()
        .find_map(|l| l.strip_prefix("OutputBaseFilename="))
        .unwrap();
    touch(&build_dir.join(format!("{}.exe", base)));
}

/// `lsbom -p fm` output for a package holding `bin/foo` and `lib/libfoo.dylib`
const LSBOM_FILES: &str = ".\t40755\n./bin\t40755\n./bin/foo\t100755\n./lib\t40755\n./lib/libfoo.dylib\t100644\n";
const LSBOM_DIRS: &str = ".\n./bin\n./lib\n";

impl ToolRunner for FakeRunner {
    fn output(&self, command: &ToolCommand) -> distpack::Result<String> {
        self.calls.lock().unwrap().push(command.clone());
        let args = command.get_args();
        match tool_name(command).as_str() {
            "dpkg-buildpackage" => fake_dpkg_buildpackage(command),
            "rpmbuild" => fake_rpmbuild(command),
            "ninja" => fake_ninja(command),
            "iscc.exe" => fake_iscc(command),
            "pkgbuild" => touch(Path::new(args.last().unwrap())),
            "productbuild" | "libtool" => touch(Path::new(&args[2])),
            "hdiutil" => touch(Path::new(&args[1])),
            "pkgutil" => touch(&Path::new(&args[2]).join("Bom")),
            "lsbom" if args.iter().any(|a| a == "-d") => return Ok(LSBOM_DIRS.to_string()),
            "lsbom" => return Ok(LSBOM_FILES.to_string()),
            _ => {}
        }
        Ok(String::new())
    }

    fn is_available(&self, program: &str) -> bool {
        !self.missing.iter().any(|m| m == program)
    }
}

/// Install prefix, recipe manifest and packages of one test
pub struct Fixture {
    pub prefix: TempDir,
    pub output: TempDir,
    pub manifest: RecipeManifest,
    packages: Vec<PackageEntity>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            prefix: TempDir::new().unwrap(),
            output: TempDir::new().unwrap(),
            manifest: RecipeManifest::new(),
            packages: Vec::new(),
        }
    }

    /// Declare recipe files and create them in the prefix
    pub fn recipe(mut self, recipe: &str, category: &str, files: &[&str]) -> Self {
        for f in files {
            touch(&self.prefix.path().join(f));
        }
        self.manifest.add_files(recipe, category, files.iter().copied());
        self
    }

    /// Declare recipe files without installing them
    pub fn declared(mut self, recipe: &str, category: &str, files: &[&str]) -> Self {
        self.manifest.add_files(recipe, category, files.iter().copied());
        self
    }

    pub fn package(mut self, package: impl Into<PackageEntity>) -> Self {
        self.packages.push(package.into());
        self
    }

    pub fn output_dir(&self) -> &Path {
        self.output.path()
    }

    pub fn config(&self, platform: Platform, arch: Architecture, distro: Distro) -> PackagingConfig {
        let mut config = PackagingConfig::new(self.prefix.path(), platform, arch, distro);
        config.packager = "Tester <tester@example.com>".to_string();
        config
    }

    pub fn store(&self, platform: Platform) -> PackagesStore {
        let mut store = PackagesStore::new(platform, Arc::new(self.manifest.clone()));
        for p in &self.packages {
            store.add_package(p.clone()).unwrap();
        }
        store
    }

    pub fn context(&self, config: PackagingConfig, runner: Arc<FakeRunner>) -> distpack::PackContext {
        let store = self.store(config.target_platform);
        distpack::PackContext::new(Arc::new(config), Arc::new(store), runner)
    }
}

pub fn leaf(name: &str, deps: &[&str], files: &[&str], files_devel: &[&str]) -> Package {
    let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let mut base = PackageBase::new(name, "1.0", &format!("{} package", name));
    base.uuid = Some("5f1b6f6e-8c6d-4b0e-9a3c-000000000001".to_string());
    Package::new(base, strings(deps), &strings(files), &strings(files_devel))
}

/// Meta package from `(name, required, selected)` members
pub fn meta(name: &str, members: &[(&str, bool, bool)]) -> MetaPackage {
    let mut base = PackageBase::new(name, "1.0", "Test SDK");
    base.uuid = Some("5f1b6f6e-8c6d-4b0e-9a3c-000000000002".to_string());
    MetaPackage::new(
        base,
        members
            .iter()
            .map(|(n, required, selected)| PackageRef::new(n, *required, *selected))
            .collect(),
        BTreeMap::new(),
    )
}

/// File names found directly in `dir`, sorted
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// Names of the artifacts, without their directories
pub fn names(paths: &[PathBuf]) -> Vec<String> {
    let mut names: Vec<String> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
