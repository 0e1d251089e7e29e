// src/cli.rs
//! CLI definitions for distpack
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use distpack::{ArtifactType, PackageType};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "distpack")]
#[command(author = "Distpack Contributors")]
#[command(version)]
#[command(about = "Package a built install prefix into native distributable artifacts", long_about = None)]
pub struct Cli {
    /// Log debug messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Inputs shared by every command
#[derive(Args, Clone)]
pub struct SourceArgs {
    /// Packaging configuration file
    #[arg(short, long, default_value = "distpack.toml")]
    pub config: PathBuf,

    /// Directory holding the package descriptors
    #[arg(short, long, default_value = "packages")]
    pub packages_dir: PathBuf,

    /// Recipe file manifest
    #[arg(short, long, default_value = "manifest.toml")]
    pub manifest: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pack a package and its dependencies
    Pack {
        /// Name of the package to pack
        package: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Output directory for the artifacts
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Skip the development packages
        #[arg(long)]
        no_devel: bool,

        /// Overwrite existing artifacts and skip missing files
        #[arg(short, long)]
        force: bool,

        /// Keep the temporary staging trees
        #[arg(long)]
        keep_temp: bool,

        /// Artifact flavour: default, inno or tarball
        #[arg(short, long, default_value = "default", value_parser = ArtifactType::from_str)]
        r#type: ArtifactType,
    },

    /// List the packages of the store
    List {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Show the dependencies of a package
    Deps {
        /// Package name
        package: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Show the whole dependency closure
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show the files a package covers
    Files {
        /// Package name
        package: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Package mode: runtime, devel or debug
        #[arg(long, default_value = "runtime", value_parser = PackageType::from_str)]
        mode: PackageType,

        /// Only list files present in the install prefix
        #[arg(long)]
        existing: bool,
    },
}
