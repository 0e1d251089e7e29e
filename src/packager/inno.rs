// src/packager/inno.rs

//! Inno Setup installers
//!
//! An alternative to the WiX pipeline producing one self-contained `.exe`
//! for a meta package. Instead of composing merge modules, every package of
//! the closure becomes a component of a single `installer.iss` script and
//! the files are deduplicated across components.

use crate::config::Architecture;
use crate::error::{Error, Result};
use crate::package::{MetaPackage, PackageType, Resource, display_description};
use crate::packager::wix::{artifact_stem, install_dir_components, tool_path, upgrade_code_or_new};
use crate::packager::{
    PackContext, PackOptions, PackSession, PackedInfo, Packager, StagingDir, ToolCommand,
    check_output, files_or_empty, place_artifact,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub fn new_packager(ctx: &PackContext, name: &str) -> Result<Box<dyn Packager>> {
    match ctx.package(name)?.as_meta() {
        Some(_) => Ok(Box::new(InnoSetup::new(ctx, name))),
        None => Err(Error::Usage(format!(
            "Inno Setup installers are built for meta packages only, {} is not one",
            name
        ))),
    }
}

/// Component name of a package: `<mode>/<escaped name>`
pub fn format_inno_feature_id(name: &str, mode: PackageType) -> String {
    let name = name.strip_suffix(mode.suffix()).unwrap_or(name);
    let mut id = name.replace('_', "__");
    for c in ['/', '-', ' ', '@', '+', '.'] {
        id = id.replace(c, "_");
    }
    if id.starts_with(|c: char| c.is_ascii_digit()) {
        id.insert_str(0, "innogst");
    }
    format!("{}/{}", mode, id)
}

/// Installation types a component belongs to
fn feature_types(mode: PackageType) -> &'static str {
    match mode {
        PackageType::Runtime => "full compact custom",
        _ => "full custom",
    }
}

fn mode_description(mode: PackageType) -> &'static str {
    match mode {
        PackageType::Runtime => "Runtime",
        PackageType::Devel => "Development",
        PackageType::Debug => "Debugging",
    }
}

/// One `[Components]` entry with the files it installs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnoComponent {
    pub name: String,
    pub description: String,
    pub types: &'static str,
    pub fixed: bool,
    /// `(source, destination dir)` pairs
    pub files: Vec<(String, String)>,
}

/// Everything the `.iss` script is rendered from
#[derive(Debug, Clone)]
pub struct InnoScript {
    pub app_id: String,
    pub app_name: String,
    pub version: String,
    pub publisher: Option<String>,
    pub url: Option<String>,
    pub x64: bool,
    pub output_base: String,
    pub default_dir: String,
    pub wizard_image: Option<PathBuf>,
    pub setup_icon: Option<PathBuf>,
    pub license: Option<PathBuf>,
    pub components: Vec<InnoComponent>,
    pub root_env_var: String,
    pub registry_subkey: String,
}

impl InnoScript {
    /// Files mapped to destinations, each listing every component needing it
    fn deduplicated_files(&self) -> BTreeMap<(&str, &str), BTreeSet<&str>> {
        let mut files: BTreeMap<(&str, &str), BTreeSet<&str>> = BTreeMap::new();
        for component in &self.components {
            for (source, dest) in &component.files {
                files
                    .entry((source.as_str(), dest.as_str()))
                    .or_default()
                    .insert(component.name.as_str());
            }
        }
        files
    }

    pub fn render(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("// Installer script for \"{}\"\n", self.output_base));
        s.push_str("// Generated by distpack, do not edit\n");

        s.push_str("\n[Setup]\n");
        s.push_str(&format!("AppId={}\n", self.app_id));
        s.push_str(&format!("AppName=\"{}\"\n", self.app_name));
        s.push_str(&format!("AppVersion={}\n", self.version));
        s.push_str(&format!("VersionInfoVersion={}\n", self.version));
        if let Some(publisher) = &self.publisher {
            s.push_str(&format!("AppPublisher={}\n", publisher));
        }
        if let Some(url) = &self.url {
            s.push_str(&format!("AppPublisherUrl={}\n", url));
        }
        s.push_str("WizardStyle=modern\n");
        if let Some(image) = &self.wizard_image {
            s.push_str(&format!("WizardImageFile={}\n", image.display()));
        }
        s.push_str("DisableWelcomePage=no\n");
        if let Some(icon) = &self.setup_icon {
            s.push_str(&format!("SetupIconFile={}\n", icon.display()));
        }
        if let Some(license) = &self.license {
            s.push_str(&format!("LicenseFile={}\n", license.display()));
        }
        if self.x64 {
            s.push_str("ArchitecturesAllowed=x64compatible\n");
            s.push_str("ArchitecturesInstallIn64BitMode=x64compatible\n");
        } else {
            s.push_str("ArchitecturesAllowed=x86compatible\n");
        }
        s.push_str("Compression=lzma2/max\nSolidCompression=yes\n");
        s.push_str(&format!("OutputBaseFilename={}\n", self.output_base));
        s.push_str("OutputDir=.\n");
        s.push_str(&format!("DefaultDirName={{autopf}}/{}\n", self.default_dir));
        s.push_str("SetupLogging=yes\nUninstallLogging=yes\n");
        s.push_str("PrivilegesRequired=admin\nPrivilegesRequiredOverridesAllowed=dialog\n");
        s.push_str("ChangesEnvironment=yes\n");

        s.push_str("\n[Types]\n");
        s.push_str("Name: \"full\"; Description: \"Full installation\"\n");
        s.push_str("Name: \"compact\"; Description: \"Compact installation\"\n");
        s.push_str("Name: \"custom\"; Description: \"Custom installation\"; Flags: iscustom\n");

        s.push_str("\n[Components]\n");
        for c in &self.components {
            s.push_str(&format!("Name: {}; Description: \"{}\"; Types: {};", c.name, c.description, c.types));
            if c.fixed {
                s.push_str(" Flags: fixed;");
            }
            s.push('\n');
        }

        s.push_str("\n[Files]\n");
        for ((source, dest), components) in self.deduplicated_files() {
            let components: Vec<&str> = components.into_iter().collect();
            s.push_str(&format!(
                "Source: \"{}\"; DestDir: \"{}\"; Components: {}; Flags: ignoreversion;\n",
                source,
                dest,
                components.join(" ")
            ));
        }

        s.push_str("\n[Tasks]\n");
        s.push_str(&format!(
            "Name: \"environment_variables\"; Description: \"Set or update the {} environment variable\"; Components: runtime; Flags: checkedonce;\n",
            self.root_env_var
        ));
        s.push_str("Name: \"registry_install_dir\"; Description: \"Set or update the installation registry keys\"; Components: runtime; Flags: checkedonce;\n");

        s.push_str("\n[Registry]\n");
        s.push_str(&format!(
            "Root: \"HKA\"; Subkey: \"SYSTEM\\CurrentControlSet\\Control\\Session Manager\\Environment\"; ValueType: string; ValueName: \"{}\"; ValueData: \"{{app}}\"; Flags: createvalueifdoesntexist preservestringtype; Tasks: environment_variables\n",
            self.root_env_var
        ));
        for (name, value) in [("InstallDir", "{app}"), ("Version", self.version.as_str())] {
            s.push_str(&format!(
                "Root: \"HKA\"; Subkey: \"{}\"; ValueType: string; ValueName: \"{}\"; ValueData: \"{}\"; Flags: createvalueifdoesntexist preservestringtype; Tasks: registry_install_dir\n",
                self.registry_subkey, name, value
            ));
        }
        s
    }
}

pub struct InnoSetup {
    ctx: PackContext,
    name: String,
}

impl InnoSetup {
    pub fn new(ctx: &PackContext, name: &str) -> Self {
        Self {
            ctx: ctx.clone(),
            name: name.to_string(),
        }
    }

    fn meta(&self) -> Result<&MetaPackage> {
        self.ctx
            .package(&self.name)?
            .as_meta()
            .ok_or_else(|| Error::Usage(format!("{} is not a meta package", self.name)))
    }

    /// Members with their flags, followed by their dependencies
    ///
    /// A dependency shared by several members is required (or selected) if
    /// any of them is.
    fn packages_with_flags(&self) -> Result<Vec<(String, bool)>> {
        let meta = self.meta()?;
        let members = meta.packages(self.ctx.store.platform());
        let mut ordered: Vec<(String, bool)> = members.iter().map(|m| (m.name.clone(), m.required)).collect();
        let mut transitive: Vec<(String, bool)> = Vec::new();
        for member in &members {
            for dep in self.ctx.store.deps_names(&member.name, true)? {
                if ordered.iter().any(|(n, _)| *n == dep) {
                    continue;
                }
                match transitive.iter_mut().find(|(n, _)| *n == dep) {
                    Some(entry) => entry.1 |= member.required,
                    None => transitive.push((dep, member.required)),
                }
            }
        }
        ordered.extend(transitive);
        Ok(ordered)
    }

    fn components(&self, mode: PackageType, opts: &PackOptions, session: &mut PackSession) -> Result<Vec<InnoComponent>> {
        let mut components = vec![InnoComponent {
            name: mode.to_string(),
            description: mode_description(mode).to_string(),
            types: feature_types(mode),
            fixed: false,
            files: Vec::new(),
        }];
        for (name, required) in self.packages_with_flags()? {
            if session.is_empty(&name) {
                continue;
            }
            let files = files_or_empty(&self.ctx, &name, mode, opts.force)?;
            if files.is_empty() {
                warn!("Package {} is empty, skipping its {} component", name, mode);
                if mode == PackageType::Runtime {
                    session.mark_empty(&name);
                }
                continue;
            }
            info!("Creating component for {}", name);
            let base = self.ctx.package(&name)?.base();
            components.push(InnoComponent {
                name: format_inno_feature_id(&name, mode),
                description: display_description(base, mode),
                types: feature_types(mode),
                fixed: required,
                files: files
                    .iter()
                    .map(|f| {
                        let dir = Path::new(f).parent().map(|p| p.to_string_lossy().to_string()).unwrap_or_default();
                        let dest = if dir.is_empty() { "{app}".to_string() } else { format!("{{app}}/{}", dir) };
                        (tool_path(&self.ctx.config, &self.ctx.config.prefix.join(f)), dest)
                    })
                    .collect(),
            });
        }
        Ok(components)
    }

    fn script(&self, opts: &PackOptions, session: &mut PackSession) -> Result<InnoScript> {
        let meta = self.meta()?;
        let base = &meta.base;
        let config = &self.ctx.config;

        let mut modes = vec![PackageType::Runtime];
        if opts.devel {
            modes.extend([PackageType::Devel, PackageType::Debug]);
        }
        let mut components = Vec::new();
        for mode in modes {
            let mode_components = self.components(mode, opts, session)?;
            // only the group entry: nothing to install in this mode
            if mode_components.len() == 1 {
                if mode == PackageType::Runtime {
                    return Err(Error::EmptyPackage(self.name.clone()));
                }
                continue;
            }
            components.extend(mode_components);
        }

        Ok(InnoScript {
            app_id: upgrade_code_or_new(base, PackageType::Runtime),
            app_name: format!("{} ({} {})", base.shortdesc, config.windows_toolchain, config.target_arch),
            version: base.version.clone(),
            publisher: base.vendor.clone(),
            url: base.url.clone(),
            x64: config.target_arch == Architecture::X86_64,
            output_base: artifact_stem(config, &self.name, &base.version),
            default_dir: install_dir_components(config, base).join("/"),
            wizard_image: base.existing_resource(Resource::Background),
            setup_icon: base.existing_resource(Resource::Icon),
            license: base.existing_resource(Resource::License),
            components,
            root_env_var: meta.root_env_var(config.target_arch),
            registry_subkey: format!("Software\\{}\\{}", base.shortdesc.replace(' ', ""), config.target_arch),
        })
    }

    fn iscc(&self, script: &Path) -> ToolCommand {
        let config = &self.ctx.config;
        let iscc = config.inno_prefix.join("iscc.exe");
        let cmd = if config.with_wine() {
            ToolCommand::new("wine").arg(iscc.to_string_lossy().to_string())
        } else {
            ToolCommand::new(iscc.to_string_lossy().to_string())
        };
        cmd.arg("/Qp").arg_path(script).envs(&config.env)
    }
}

impl Packager for InnoSetup {
    fn package_name(&self) -> &str {
        &self.name
    }

    fn pack_with(
        &self,
        output_dir: &Path,
        opts: &PackOptions,
        session: &mut PackSession,
    ) -> Result<Vec<PathBuf>> {
        let output_dir = std::path::absolute(output_dir)?;
        let script = self.script(opts, session)?;
        let exe = format!("{}.exe", script.output_base);
        check_output(&output_dir.join(&exe), opts.force)?;

        let build = StagingDir::new_in(&output_dir, &format!("inno-{}-", script.output_base), opts.keep_temp)?;
        info!("Creating Inno Setup project for {}", self.name);
        let iss = build.join("installer.iss");
        std::fs::write(&iss, script.render())?;
        session.record(
            &self.name,
            PackedInfo {
                has_runtime: true,
                has_devel: opts.devel,
            },
        );

        info!("Building {} in {}", exe, build.path().display());
        self.ctx.runner.run(&self.iscc(Path::new("installer.iss")).current_dir(build.path()))?;
        Ok(vec![place_artifact(&build.join(&exe), &output_dir, opts.force)?])
    }
}
