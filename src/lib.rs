// src/lib.rs

//! distpack
//!
//! Turns a finished install prefix into native distributable artifacts:
//! Debian and RPM packages, WiX merge modules and MSIs, Inno Setup
//! installers, macOS component/product packages and disk images, iOS
//! frameworks, Android archives and plain tarballs.
//!
//! # Architecture
//!
//! - Descriptors: one TOML file per package, parsed into typed entities
//! - Store: every package of a run, indexed by name, with dependency closures
//! - Manifest: recipe name + category to the files the recipe installed
//! - Packagers: one backend per target distro, chosen through a registry
//! - Tools: native packaging tools run behind the [`ToolRunner`] seam

pub mod config;
mod error;
pub mod manifest;
pub mod package;
pub mod packager;
pub mod store;
pub mod strip;

pub use config::{Architecture, Distro, DistroVersion, PackagingConfig, Platform, TarballCompression};
pub use error::{Error, Result};
pub use manifest::{FileManifest, RecipeManifest};
pub use package::{
    App, MetaPackage, Package, PackageBase, PackageDescriptor, PackageEntity, PackageRef, PackageType,
    display_description, display_name, upgrade_uuid,
};
pub use packager::{
    ArtifactType, PackContext, PackOptions, PackSession, Packager, PackagerRegistry, SystemRunner, ToolCommand,
    ToolRunner,
};
pub use store::PackagesStore;
