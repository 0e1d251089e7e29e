// src/packager/wix/msi.rs

//! MSI installer sources composing merge modules

use super::{
    WIX_NAMESPACE, format_absent, format_id, format_level, install_dir_components, new_guid,
    upgrade_code_or_new,
};
use crate::config::{Architecture, PackagingConfig, WindowsToolchain};
use crate::error::{Error, Result};
use crate::package::{PackageBase, PackageEntity, PackageType, display_description, display_name};
use crate::packager::xml::Element;
use crate::packager::PackContext;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// A merge module or fragment built for one package of the closure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRef {
    /// Merge id, or component group id for fragments
    pub id: String,
    /// Compiled `.msm` for merge modules, `None` for fragments
    pub source: Option<String>,
}

/// A selectable feature of the installer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsiFeature {
    pub package: String,
    pub title: String,
    pub required: bool,
    pub selected: bool,
    /// Packages whose modules the feature installs, itself last
    pub packages: Vec<String>,
}

/// Features of an installer for `package`
///
/// Meta packages get one feature per member. A member's feature references
/// its own module and those of its dependencies. Required members reference
/// their whole closure; optional members leave out what a required member
/// already installs. Packages without a module (empty ones) are left out.
/// Apps get a single feature.
pub fn plan_features(
    ctx: &PackContext,
    package: &PackageEntity,
    mode: PackageType,
    modules: &BTreeMap<String, ModuleRef>,
) -> Result<Vec<MsiFeature>> {
    let meta = match package {
        PackageEntity::Meta(meta) => meta,
        other => {
            return Ok(vec![MsiFeature {
                package: other.name().to_string(),
                title: display_description(other.base(), mode),
                required: true,
                selected: true,
                packages: vec![other.name().to_string()],
            }]);
        }
    };

    let members = meta.packages(ctx.store.platform());
    let mut forced = BTreeSet::new();
    for member in members.iter().filter(|m| m.required) {
        forced.extend(ctx.store.deps_names(&member.name, true)?);
    }

    let mut features = Vec::new();
    for member in members {
        if !modules.contains_key(&member.name) {
            debug!("No module for {}, skipping its feature", member.name);
            continue;
        }
        let mut packages: Vec<String> = ctx
            .store
            .deps_names(&member.name, true)?
            .into_iter()
            .filter(|d| modules.contains_key(d) && (member.required || !forced.contains(d)))
            .collect();
        packages.push(member.name.clone());

        let base = ctx.package(&member.name)?.base();
        features.push(MsiFeature {
            package: member.name.clone(),
            title: display_description(base, mode),
            required: member.required,
            selected: member.selected,
            packages,
        });
    }
    Ok(features)
}

/// WiX source of an MSI installer
pub struct Msi<'a> {
    config: &'a PackagingConfig,
    base: &'a PackageBase,
    mode: PackageType,
    modules: &'a BTreeMap<String, ModuleRef>,
    features: &'a [MsiFeature],
    root_env_var: Option<String>,
}

impl<'a> Msi<'a> {
    pub fn new(
        config: &'a PackagingConfig,
        base: &'a PackageBase,
        mode: PackageType,
        modules: &'a BTreeMap<String, ModuleRef>,
        features: &'a [MsiFeature],
    ) -> Self {
        Self {
            config,
            base,
            mode,
            modules,
            features,
            root_env_var: None,
        }
    }

    /// Register an environment variable pointing at the install dir
    pub fn with_root_env_var(mut self, var: impl Into<String>) -> Self {
        self.root_env_var = Some(var.into());
        self
    }

    fn is_x64(&self) -> bool {
        self.config.target_arch == Architecture::X86_64
    }

    fn product_name(&self) -> String {
        match self.mode {
            PackageType::Runtime => self.base.title().to_string(),
            _ => format!("{} (Development Files)", self.base.title()),
        }
    }

    fn module(&self, package: &str) -> Result<&ModuleRef> {
        self.modules
            .get(package)
            .ok_or_else(|| Error::PackageNotFound(package.to_string()))
    }

    /// The vcredist merge module, for MSVC builds that configure one
    fn vcredist(&self) -> Option<&Path> {
        match self.config.windows_toolchain {
            WindowsToolchain::Msvc => self.config.vcredist_merge_module.as_deref(),
            WindowsToolchain::Mingw => None,
        }
    }

    fn component(&self, id: &str) -> Element {
        let mut component = Element::new("Component").attr("Id", id).attr("Guid", new_guid());
        if self.is_x64() {
            component.set("Win64", "yes");
        }
        component
    }

    pub fn to_element(&self) -> Result<Element> {
        let mut wix = Element::new("Wix").attr("xmlns", WIX_NAMESPACE);
        let product = wix.push(
            Element::new("Product")
                .attr("Id", "*")
                .attr("Version", self.base.version.clone())
                .attr("UpgradeCode", upgrade_code_or_new(self.base, self.mode))
                .attr("Language", "1033")
                .attr("Name", self.product_name())
                .attr("Manufacturer", self.base.vendor()),
        );

        let mut package = Element::new("Package")
            .attr("Description", display_description(self.base, self.mode))
            .attr("Comments", self.base.description())
            .attr("Manufacturer", self.base.vendor())
            .attr("InstallerVersion", "200")
            .attr("Compressed", "yes")
            .attr("InstallScope", "perMachine");
        package.set("Platform", if self.is_x64() { "x64" } else { "x86" });
        product.push(package);
        product.push(
            Element::new("Media")
                .attr("Id", "1")
                .attr("Cabinet", "product.cab")
                .attr("EmbedCab", "yes"),
        );
        product.push(
            Element::new("Property")
                .attr("Id", "WIXUI_INSTALLDIR")
                .attr("Value", "INSTALLDIR"),
        );
        product.push(Element::new("UIRef").attr("Id", "WixUI_Mondo"));

        // install dir: TARGETDIR / ProgramFiles / <install dir components>
        let program_files = if self.is_x64() { "ProgramFiles64Folder" } else { "ProgramFilesFolder" };
        let mut install_dir = Element::new("Directory").attr("Id", "INSTALLDIR");
        let mut component_refs = Vec::new();
        for (package, module) in self.modules {
            if let Some(source) = &module.source {
                debug!("Merging {} from {}", package, source);
                install_dir.push(
                    Element::new("Merge")
                        .attr("Id", module.id.clone())
                        .attr("Language", "1033")
                        .attr("SourceFile", source.clone())
                        .attr("DiskId", "1"),
                );
            }
        }
        let key = format!("Software\\{}\\{}", self.base.name, self.config.target_arch);
        install_dir.push(
            self.component("RegistryInstallDir").child(
                Element::new("RegistryKey")
                    .attr("Root", "HKLM")
                    .attr("Key", key)
                    .child(
                        Element::new("RegistryValue")
                            .attr("Name", "InstallDir")
                            .attr("Type", "string")
                            .attr("Value", "[INSTALLDIR]")
                            .attr("KeyPath", "yes"),
                    )
                    .child(
                        Element::new("RegistryValue")
                            .attr("Name", "Version")
                            .attr("Type", "string")
                            .attr("Value", self.base.version.clone()),
                    ),
            ),
        );
        component_refs.push("RegistryInstallDir");
        if let Some(var) = &self.root_env_var {
            install_dir.push(
                self.component("RootEnvVar").child(
                    Element::new("Environment")
                        .attr("Id", "RootEnvVarValue")
                        .attr("Name", var.clone())
                        .attr("Action", "set")
                        .attr("Part", "all")
                        .attr("System", "yes")
                        .attr("Permanent", "no")
                        .attr("Value", "[INSTALLDIR]"),
                ),
            );
            component_refs.push("RootEnvVar");
        }

        let mut parts = install_dir_components(self.config, self.base);
        let mut dir = install_dir;
        if let Some(last) = parts.pop() {
            dir.set("Name", last);
        }
        while let Some(part) = parts.pop() {
            let prefix: Vec<&str> = parts.iter().map(String::as_str).chain([part.as_str()]).collect();
            dir = Element::new("Directory")
                .attr("Id", format_id(&prefix.join("/"), true))
                .attr("Name", part.clone())
                .child(dir);
        }
        let mut target = Element::new("Directory")
            .attr("Id", "TARGETDIR")
            .attr("Name", "SourceDir")
            .child(
                Element::new("Directory")
                    .attr("Id", program_files)
                    .attr("Name", "PFiles")
                    .child(dir),
            );
        if let Some(vcredist) = self.vcredist() {
            target.push(
                Element::new("Merge")
                    .attr("Id", "VCRedist")
                    .attr("SourceFile", vcredist.to_string_lossy().to_string())
                    .attr("DiskId", "1")
                    .attr("Language", "0"),
            );
        }
        product.push(target);

        let mut main = Element::new("Feature")
            .attr("Id", format_id(&display_name(self.base, self.mode), true))
            .attr("Title", self.base.title())
            .attr("Level", "1")
            .attr("Display", "expand")
            .attr("AllowAdvertise", "no")
            .attr("ConfigurableDirectory", "INSTALLDIR");
        for id in component_refs {
            main.push(Element::new("ComponentRef").attr("Id", id));
        }
        for feature in self.features {
            main.push(self.feature(feature)?);
        }
        product.push(main);

        if self.vcredist().is_some() {
            product.push(
                Element::new("Feature")
                    .attr("Id", "VCRedist")
                    .attr("Title", "Visual C++ Runtime")
                    .attr("AllowAdvertise", "no")
                    .attr("Display", "hidden")
                    .attr("Level", "1")
                    .child(Element::new("MergeRef").attr("Id", "VCRedist")),
            );
        }
        Ok(wix)
    }

    fn feature(&self, feature: &MsiFeature) -> Result<Element> {
        let mut element = Element::new("Feature")
            .attr("Id", format!("F_{}", format_id(&feature.package, true)))
            .attr("Title", feature.title.clone())
            .attr("Level", format_level(feature.selected))
            .attr("Display", "expand")
            .attr("Absent", format_absent(feature.required));
        let mut seen = BTreeSet::new();
        for package in &feature.packages {
            if !seen.insert(package.as_str()) {
                continue;
            }
            let module = self.module(package)?;
            let reference = match module.source {
                Some(_) => "MergeRef",
                None => "ComponentGroupRef",
            };
            element.push(Element::new(reference).attr("Id", module.id.clone()));
        }
        Ok(element)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        self.to_element()?.write(path)
    }
}
