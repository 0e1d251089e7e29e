// tests/osx_packaging.rs

//! macOS product, component, app and iOS framework installers

mod common;

use common::{FakeRunner, Fixture, leaf, meta, names};
use distpack::{
    App, Architecture, ArtifactType, Distro, Error, PackOptions, PackageBase, PackagerRegistry,
    PackagingConfig, Platform,
};
use std::path::PathBuf;
use std::sync::Arc;

fn fixture() -> Fixture {
    Fixture::new()
        .recipe("base", "libs", &["lib/libbase.dylib", "lib/libbase.a"])
        .recipe("base", "devel", &["include/base/base.h"])
        .recipe("top", "bins", &["bin/top"])
        .declared("empty", "libs", &["lib/libempty.dylib"])
        .package(leaf("base", &[], &["base:libs"], &[]))
        .package(leaf("empty", &[], &["empty"], &[]))
        .package(leaf("top", &["base", "empty"], &["top:bins"], &[]))
        .package(meta("sdk", &[("top", true, true), ("base", false, true)]))
}

fn osx_config(fixture: &Fixture) -> PackagingConfig {
    fixture.config(Platform::Darwin, Architecture::Universal, Distro::Osx)
}

fn pack_with(
    fixture: &Fixture,
    config: PackagingConfig,
    package: &str,
) -> (Arc<FakeRunner>, distpack::Result<Vec<PathBuf>>) {
    let runner = Arc::new(FakeRunner::new());
    let ctx = fixture.context(config, runner.clone());
    let result = PackagerRegistry::with_defaults()
        .packager(&ctx, package, ArtifactType::Default)
        .and_then(|p| p.pack(fixture.output_dir(), &PackOptions::default()));
    (runner, result)
}

#[test]
fn test_component_packages() {
    let fixture = fixture();
    let (runner, result) = pack_with(&fixture, osx_config(&fixture), "top");
    assert_eq!(
        names(&result.unwrap()),
        vec!["base-1.0-universal.pkg", "base-devel-1.0-universal.pkg", "top-1.0-universal.pkg"]
    );

    let builds = runner.calls_to("pkgbuild");
    assert_eq!(builds.len(), 3);
    let location = builds[0].get_args().iter().position(|a| a == "--install-location").unwrap();
    assert!(builds[0].get_args()[location + 1].ends_with("Versions/1.0"));
}

#[test]
fn test_product_archive() {
    let fixture = fixture();
    let (runner, result) = pack_with(&fixture, osx_config(&fixture), "sdk");
    assert_eq!(
        names(&result.unwrap()),
        vec![
            "sdk-1.0-universal-packages.dmg",
            "sdk-1.0-universal.pkg",
            "sdk-devel-1.0-universal.pkg",
        ]
    );

    // base, base-devel, top and the framework skeleton
    assert_eq!(runner.calls_to("pkgbuild").len(), 4);
    assert_eq!(runner.calls_to("productbuild").len(), 2);
    assert_eq!(runner.calls_to("hdiutil").len(), 1);
    let framework = runner
        .calls_to("pkgbuild")
        .into_iter()
        .filter_map(|c| c.get_args().last().cloned())
        .find(|out| out.ends_with("sdk-framework-1.0-universal.pkg"));
    assert!(framework.is_some());
    assert!(runner.calls_to("pkgbuild").iter().all(|c| !c.get_args().last().unwrap().contains("empty")));
}

#[test]
fn test_product_with_pmdoc() {
    let fixture = fixture();
    let mut config = osx_config(&fixture);
    config.osx_pmdoc = true;
    let (_, result) = pack_with(&fixture, config, "sdk");
    let paths = result.unwrap();

    let pmdoc = fixture.output_dir().join("sdk.pmdoc");
    assert!(paths.contains(&pmdoc));
    assert!(pmdoc.join("index.xml").is_file());
    assert!(pmdoc.join("base.xml").is_file());
    assert!(pmdoc.join("top-contents.xml").is_file());
    assert!(!pmdoc.join("empty.xml").exists());
}

#[test]
fn test_ios_framework() {
    let fixture = fixture();
    let (runner, result) = pack_with(
        &fixture,
        fixture.config(Platform::Ios, Architecture::Arm64, Distro::Ios),
        "sdk",
    );
    assert_eq!(names(&result.unwrap()), vec!["sdk-1.0-arm64-ios.pkg"]);

    let libtool = runner.calls_to("libtool");
    assert_eq!(libtool.len(), 1);
    assert!(libtool[0].get_args().last().unwrap().ends_with("lib/libbase.a"));
    assert_eq!(runner.tools(), vec!["libtool", "pkgbuild", "productbuild"]);
}

#[test]
fn test_ios_requires_meta_package() {
    let fixture = fixture();
    let (runner, result) = pack_with(
        &fixture,
        fixture.config(Platform::Ios, Architecture::Arm64, Distro::Ios),
        "base",
    );
    assert!(matches!(result, Err(Error::Usage(_))));
    assert!(runner.calls().is_empty());
}

#[test]
fn test_application_bundle() {
    let mut app = App::new(PackageBase::new("viewer", "2.1", "Image viewer"), "viewer", vec!["base".to_string()]);
    app.app_name = Some("Viewer".to_string());
    let fixture = Fixture::new()
        .recipe("viewer", "bins", &["bin/Viewer"])
        .recipe("base", "libs", &["lib/libbase.dylib"])
        .package(leaf("base", &[], &["base:libs"], &[]))
        .package(app);

    let (runner, result) = pack_with(&fixture, osx_config(&fixture), "viewer");
    assert_eq!(
        names(&result.unwrap()),
        vec!["Viewer-2.1-universal.dmg", "viewer-2.1-universal.pkg"]
    );
    assert_eq!(runner.tools(), vec!["pkgbuild", "productbuild", "hdiutil"]);

    let pkgbuild = &runner.calls_to("pkgbuild")[0];
    let location = pkgbuild.get_args().iter().position(|a| a == "--install-location").unwrap();
    assert_eq!(pkgbuild.get_args()[location + 1], "/Applications");
}

#[test]
fn test_missing_pkgbuild_falls_back_to_tarballs() {
    let fixture = fixture();
    let runner = Arc::new(FakeRunner::without(&["pkgbuild"]));
    let ctx = fixture.context(osx_config(&fixture), runner.clone());
    let paths = PackagerRegistry::with_defaults()
        .packager(&ctx, "base", ArtifactType::Default)
        .unwrap()
        .pack(fixture.output_dir(), &PackOptions::default())
        .unwrap();
    assert_eq!(
        names(&paths),
        vec!["base-darwin-universal-1.0-devel.tar.gz", "base-darwin-universal-1.0.tar.gz"]
    );
    assert!(runner.calls().is_empty());
}
