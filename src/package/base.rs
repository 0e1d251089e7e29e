// src/package/base.rs

//! Identity and metadata shared by every package kind

use crate::config::{Distro, DistroVersion, PackagingConfig};
use crate::package::{PackageType, display_name};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

fn default_license() -> String {
    "GPL".to_string()
}

fn default_strip_dirs() -> Vec<String> {
    vec!["bin".to_string(), "lib".to_string(), "libexec".to_string()]
}

/// Named resource files shipped alongside a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Icon,
    License,
    Background,
    PreInstall,
    PostInstall,
    PostRemove,
}

/// Resource paths, relative to the descriptor's directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default)]
    pub icon: Option<PathBuf>,
    #[serde(default)]
    pub license: Option<PathBuf>,
    #[serde(default)]
    pub background: Option<PathBuf>,
    #[serde(default)]
    pub preinstall: Option<PathBuf>,
    #[serde(default)]
    pub postinstall: Option<PathBuf>,
    #[serde(default)]
    pub postremove: Option<PathBuf>,
}

impl Resources {
    fn get(&self, resource: Resource) -> Option<&PathBuf> {
        match resource {
            Resource::Icon => self.icon.as_ref(),
            Resource::License => self.license.as_ref(),
            Resource::Background => self.background.as_ref(),
            Resource::PreInstall => self.preinstall.as_ref(),
            Resource::PostInstall => self.postinstall.as_ref(),
            Resource::PostRemove => self.postremove.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageBase {
    pub name: String,
    pub shortdesc: String,
    pub version: String,

    #[serde(default)]
    pub longdesc: Option<String>,

    /// Reverse-DNS organisation, e.g. `org.freedesktop.gstreamer`
    #[serde(default)]
    pub org: Option<String>,

    #[serde(default)]
    pub vendor: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    /// Stable identifier kept across releases for upgrade continuity
    #[serde(default)]
    pub uuid: Option<String>,

    #[serde(default = "default_license")]
    pub license: String,

    /// Installer title, defaults to the short description
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub resources: Resources,

    /// Target install directory, defaults to the configured prefix
    #[serde(default)]
    pub install_dir: Option<PathBuf>,

    /// Never prefix this package's name with the configured packages prefix
    #[serde(default)]
    pub ignore_package_prefix: bool,

    /// System packages required at runtime, keyed by distro version or distro
    #[serde(default)]
    pub sys_deps: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub sys_deps_devel: BTreeMap<String, Vec<String>>,

    /// Strip binaries before packaging
    #[serde(default)]
    pub strip: bool,

    #[serde(default = "default_strip_dirs")]
    pub strip_dirs: Vec<String>,

    /// File names never stripped
    #[serde(default)]
    pub strip_excludes: Vec<String>,

    /// Compose WiX installers from fragments instead of merge modules
    #[serde(default)]
    pub wix_use_fragment: bool,

    /// Directory the descriptor was loaded from
    #[serde(skip)]
    pub resources_dir: Option<PathBuf>,
}

impl PackageBase {
    pub fn new(name: &str, version: &str, shortdesc: &str) -> Self {
        Self {
            name: name.to_string(),
            shortdesc: shortdesc.to_string(),
            version: version.to_string(),
            longdesc: None,
            org: None,
            vendor: None,
            url: None,
            uuid: None,
            license: default_license(),
            title: None,
            resources: Resources::default(),
            install_dir: None,
            ignore_package_prefix: false,
            sys_deps: BTreeMap::new(),
            sys_deps_devel: BTreeMap::new(),
            strip: false,
            strip_dirs: default_strip_dirs(),
            strip_excludes: Vec::new(),
            wix_use_fragment: false,
            resources_dir: None,
        }
    }

    /// Long description, falling back to the short one
    pub fn description(&self) -> &str {
        self.longdesc.as_deref().unwrap_or(&self.shortdesc)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.shortdesc)
    }

    pub fn vendor(&self) -> &str {
        self.vendor.as_deref().unwrap_or("")
    }

    /// Reverse-DNS identifier used by macOS installers
    pub fn identifier(&self, mode: PackageType) -> String {
        let org = self.org.as_deref().unwrap_or("org.distpack");
        format!("{}.{}", org, display_name(self, mode))
    }

    /// Absolute path of a resource, if the descriptor declares it
    pub fn resource(&self, resource: Resource) -> Option<PathBuf> {
        let path = self.resources.get(resource)?;
        Some(match &self.resources_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.clone(),
        })
    }

    /// Resource path only when the file actually exists
    pub fn existing_resource(&self, resource: Resource) -> Option<PathBuf> {
        self.resource(resource).filter(|p| p.exists())
    }

    pub fn install_dir(&self, config: &PackagingConfig) -> PathBuf {
        self.install_dir
            .clone()
            .unwrap_or_else(|| config.prefix.clone())
    }

    /// System dependencies for the target, distro version entries win
    pub fn sys_deps(
        &self,
        distro: Distro,
        version: Option<&DistroVersion>,
        mode: PackageType,
    ) -> Vec<String> {
        let table = match mode {
            PackageType::Devel => &self.sys_deps_devel,
            _ => &self.sys_deps,
        };
        if let Some(v) = version
            && let Some(deps) = table.get(v.as_str())
        {
            return deps.clone();
        }
        table.get(distro.as_ref()).cloned().unwrap_or_default()
    }

    pub(crate) fn set_resources_dir(&mut self, dir: &Path) {
        self.resources_dir = Some(dir.to_path_buf());
    }
}
