// src/package/meta.rs

//! Meta packages: ordered groupings of other packages

use crate::config::{Architecture, Platform};
use crate::package::PackageBase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Membership of a package in a meta package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    /// The installer must always install it
    #[serde(default)]
    pub required: bool,
    /// Installed unless the user deselects it
    #[serde(default)]
    pub selected: bool,
}

impl PackageRef {
    pub fn new(name: &str, required: bool, selected: bool) -> Self {
        Self {
            name: name.to_string(),
            required,
            selected,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetaPackage {
    pub base: PackageBase,
    packages: Vec<PackageRef>,
    platform_packages: BTreeMap<Platform, Vec<PackageRef>>,
    /// Environment variable pointing at the install root on Windows
    pub root_env_var: Option<String>,
}

impl MetaPackage {
    pub fn new(
        base: PackageBase,
        packages: Vec<PackageRef>,
        platform_packages: BTreeMap<Platform, Vec<PackageRef>>,
    ) -> Self {
        Self {
            base,
            packages,
            platform_packages,
            root_env_var: None,
        }
    }

    /// Membership for a platform: the base list followed by the platform's
    /// additions, duplicates dropped and base flags kept
    pub fn packages(&self, platform: Platform) -> Vec<PackageRef> {
        let mut merged: Vec<PackageRef> = Vec::new();
        let extra = self.platform_packages.get(&platform).into_iter().flatten();
        for p in self.packages.iter().chain(extra) {
            if !merged.iter().any(|m| m.name == p.name) {
                merged.push(p.clone());
            }
        }
        merged
    }

    pub fn list_packages(&self, platform: Platform) -> Vec<String> {
        self.packages(platform).into_iter().map(|p| p.name).collect()
    }

    /// Name of the root environment variable, e.g. `GSTREAMER_1_0_ROOT_X86_64`
    pub fn root_env_var(&self, arch: Architecture) -> String {
        if let Some(var) = &self.root_env_var {
            return var.clone();
        }
        let stem: String = self
            .base
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}_ROOT_{}", stem, arch.as_ref().to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(platform: Vec<PackageRef>) -> MetaPackage {
        let mut platform_packages = BTreeMap::new();
        platform_packages.insert(Platform::Linux, platform);
        MetaPackage::new(
            PackageBase::new("sdk", "1.0", "SDK"),
            vec![PackageRef::new("a", true, true), PackageRef::new("b", false, true)],
            platform_packages,
        )
    }

    #[test]
    fn test_platform_additions_appended() {
        let m = meta(vec![PackageRef::new("c", false, false)]);
        assert_eq!(m.list_packages(Platform::Linux), vec!["a", "b", "c"]);
        assert_eq!(m.list_packages(Platform::Windows), vec!["a", "b"]);
    }

    #[test]
    fn test_base_flags_win_on_duplicates() {
        let m = meta(vec![PackageRef::new("b", true, false), PackageRef::new("d", false, false)]);
        let packages = m.packages(Platform::Linux);
        assert_eq!(
            packages.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "d"]
        );
        assert!(!packages[1].required);
        assert!(packages[1].selected);
    }

    #[test]
    fn test_root_env_var() {
        let mut m = meta(vec![]);
        m.base.name = "gstreamer-1.0".to_string();
        assert_eq!(m.root_env_var(Architecture::X86_64), "GSTREAMER_1_0_ROOT_X86_64");
        m.root_env_var = Some("SDK_ROOT".to_string());
        assert_eq!(m.root_env_var(Architecture::X86), "SDK_ROOT");
    }
}
