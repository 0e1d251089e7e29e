// src/config.rs

//! Resolved packaging configuration
//!
//! The configuration is produced once per run (normally from a TOML file)
//! and shared read-only by the store and every packager.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::warn;

/// Packager identity used when the configuration does not set one
pub const DEFAULT_PACKAGER: &str = "Default <default@change.me>";

/// Minimum macOS version passed to pkgbuild
pub const DEFAULT_MIN_OSX_VERSION: &str = "10.13";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Linux,
    Windows,
    Darwin,
    Android,
    Ios,
}

impl Platform {
    /// Platform of the machine running the packager
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Darwin
        } else {
            Platform::Linux
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Architecture {
    X86,
    X86_64,
    Universal,
    Arm,
    Armv7,
    Arm64,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Distro {
    Debian,
    Redhat,
    Suse,
    Windows,
    Osx,
    Ios,
    Android,
    Gentoo,
    None,
}

/// Distribution release, e.g. `debian_wheezy` or `fedora_16`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistroVersion(pub String);

impl DistroVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DistroVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TarballCompression {
    None,
    #[default]
    Gz,
    Xz,
}

impl TarballCompression {
    /// File extension of a tarball compressed with this method
    pub fn extension(&self) -> &'static str {
        match self {
            TarballCompression::None => "tar",
            TarballCompression::Gz => "tar.gz",
            TarballCompression::Xz => "tar.xz",
        }
    }
}

/// Windows toolchain flavour, used in artifact names
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WindowsToolchain {
    #[default]
    Mingw,
    Msvc,
}

fn default_packager() -> String {
    DEFAULT_PACKAGER.to_string()
}

fn default_min_osx_version() -> String {
    DEFAULT_MIN_OSX_VERSION.to_string()
}

fn default_wix_prefix() -> PathBuf {
    PathBuf::from("C:/Program Files (x86)/WiX Toolset v3.11/bin")
}

fn default_inno_prefix() -> PathBuf {
    PathBuf::from("C:/Program Files (x86)/Inno Setup 6")
}

/// Configuration consumed by the packaging pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagingConfig {
    pub target_platform: Platform,
    pub target_arch: Architecture,
    pub target_distro: Distro,

    #[serde(default)]
    pub target_distro_version: Option<DistroVersion>,

    /// Host platform, defaults to the running one
    #[serde(default = "Platform::host")]
    pub platform: Platform,

    /// Install prefix holding the already built files
    pub prefix: PathBuf,

    /// Packager identity, "Name <email>"
    #[serde(default = "default_packager")]
    pub packager: String,

    /// Prefix prepended to generated Linux package and tarball names
    #[serde(default)]
    pub packages_prefix: Option<String>,

    #[serde(default)]
    pub package_tarball_compression: TarballCompression,

    #[serde(default)]
    pub windows_toolchain: WindowsToolchain,

    #[serde(default = "default_wix_prefix")]
    pub wix_prefix: PathBuf,

    #[serde(default = "default_inno_prefix")]
    pub inno_prefix: PathBuf,

    /// Visual C runtime merge module embedded into MSVC installers
    #[serde(default)]
    pub vcredist_merge_module: Option<PathBuf>,

    /// Versioned include directories flattened into framework `Headers`
    #[serde(default)]
    pub framework_include_dirs: Vec<PathBuf>,

    #[serde(default = "default_min_osx_version")]
    pub min_osx_version: String,

    /// Also write a PackageMaker `.pmdoc` next to macOS product packages
    #[serde(default)]
    pub osx_pmdoc: bool,

    /// Extra environment for native tools (e.g. `STRIP`)
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Scratch directory for stripped copies, defaults to the system temp dir
    #[serde(default)]
    pub home_dir: Option<PathBuf>,
}

impl PackagingConfig {
    /// Build a configuration for the given target with every optional field defaulted
    pub fn new(
        prefix: impl Into<PathBuf>,
        target_platform: Platform,
        target_arch: Architecture,
        target_distro: Distro,
    ) -> Self {
        Self {
            target_platform,
            target_arch,
            target_distro,
            target_distro_version: None,
            platform: Platform::host(),
            prefix: prefix.into(),
            packager: default_packager(),
            packages_prefix: None,
            package_tarball_compression: TarballCompression::default(),
            windows_toolchain: WindowsToolchain::default(),
            wix_prefix: default_wix_prefix(),
            inno_prefix: default_inno_prefix(),
            vcredist_merge_module: None,
            framework_include_dirs: Vec::new(),
            min_osx_version: default_min_osx_version(),
            osx_pmdoc: false,
            env: BTreeMap::new(),
            home_dir: None,
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: PackagingConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.prefix.as_os_str().is_empty() {
            return Err(Error::Config("prefix must not be empty".to_string()));
        }
        if !self.packager.contains('<') || !self.packager.ends_with('>') {
            return Err(Error::Config(format!(
                "packager '{}' must have the form \"Name <email>\"",
                self.packager
            )));
        }
        if let Some(prefix) = &self.packages_prefix
            && prefix.contains(char::is_whitespace)
        {
            return Err(Error::Config(format!(
                "packages_prefix '{}' must not contain whitespace",
                prefix
            )));
        }
        Ok(())
    }

    /// Whether Windows tools must be run through wine
    pub fn with_wine(&self) -> bool {
        self.platform != Platform::Windows
    }

    /// The `STRIP` command configured for the target, if any
    pub fn strip_command(&self) -> Option<&str> {
        self.env.get("STRIP").map(String::as_str).filter(|s| !s.trim().is_empty())
    }

    /// Warn when packaging with the placeholder identity
    pub fn check_packager(&self) {
        if self.packager == DEFAULT_PACKAGER {
            warn!("No packager defined, using default packager \"{}\"", self.packager);
        }
    }

    /// Directory used for scratch copies of the prefix
    pub fn scratch_dir(&self) -> PathBuf {
        self.home_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
