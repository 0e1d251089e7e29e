// src/packager/wix/packager.rs

//! WiX pipelines driven by one `ninja` run

use super::msi::{ModuleRef, plan_features};
use super::{MergeModule, Msi, NinjaWriter, artifact_stem};
use crate::config::Architecture;
use crate::error::{Error, Result};
use crate::package::{PackageEntity, PackageType, display_name};
use crate::packager::disttarball::write_zip;
use crate::packager::{
    PackContext, PackOptions, PackSession, PackedInfo, Packager, StagingDir, ToolCommand,
    check_output, copy_files, files_list, place_artifact,
};
use crate::strip::Strip;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const UI_EXTENSION: &str = "-ext WixUIExtension";

/// Output of one package's module in the build graph
struct BuiltModule {
    module: ModuleRef,
    /// `.msm` or `.wixlib`, relative to the build dir
    output: String,
}

/// Write the source of one package's module and add its build statements
///
/// Returns `None` for an empty package. Binaries are stripped into a copy
/// under the build dir when the package asks for it, so the prefix is never
/// touched.
fn add_module(
    ctx: &PackContext,
    build_dir: &Path,
    writer: &mut NinjaWriter,
    name: &str,
    mode: PackageType,
    opts: &PackOptions,
    fragment: bool,
) -> Result<Option<BuiltModule>> {
    let files = match files_list(ctx, name, mode, opts.force) {
        Ok(files) => files,
        Err(e) if e.is_empty_package() => {
            warn!("Package {} is empty, skipping module generation", name);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let config = &ctx.config;
    let base = ctx.package(name)?.base();
    let stem = display_name(base, mode);

    let mut source_root = config.prefix.clone();
    if base.strip && mode == PackageType::Runtime {
        if config.strip_command().is_some() {
            let stripped = build_dir.join(format!("{}.stripped.d", stem));
            copy_files(&config.prefix, &files, &stripped)?;
            Strip::new(config, &base.strip_excludes).strip_files(ctx.runner.as_ref(), &stripped, &files)?;
            source_root = stripped;
        } else {
            warn!("Strip command is not defined for this configuration, not stripping {}", name);
        }
    }

    let module = MergeModule::new(config, base, mode, &files)
        .with_source_root(&source_root)
        .with_fragment(fragment);
    let wxs = format!("{}.wxs", stem);
    let wxs_path = build_dir.join(&wxs);
    if wxs_path.exists() {
        return Err(Error::Usage(format!(
            "Merge module source {} already exists",
            wxs_path.display()
        )));
    }
    module.write(&wxs_path)?;

    let wixobj = format!("{}.wixobj", stem);
    writer.build(&[wixobj.clone()], "candle", &[wxs], &[], &[]);
    let built = if module.is_fragment() {
        let output = format!("{}.wixlib", stem);
        writer.build(&[output.clone()], "lit", &[wixobj], &[], &[]);
        BuiltModule {
            module: ModuleRef {
                id: module.component_group_id(),
                source: None,
            },
            output,
        }
    } else {
        let output = format!("{}.msm", stem);
        writer.build(&[output.clone()], "light", &[wixobj], &[], &[]);
        BuiltModule {
            module: ModuleRef {
                id: module.id(),
                source: Some(output.clone()),
            },
            output,
        }
    };
    debug!("Added {} to the build graph", built.output);
    Ok(Some(built))
}

fn new_writer(ctx: &PackContext, what: &str) -> NinjaWriter {
    let mut writer = NinjaWriter::new();
    writer.comment(&format!("Build file for {}", what));
    writer.comment("Generated by distpack, do not edit");
    writer.newline();
    writer.wix_rules(&ctx.config);
    writer
}

/// Run ninja in `build_dir`, with WiX temporaries in a scratch dir
fn run_ninja(ctx: &PackContext, build_dir: &Path, writer: &NinjaWriter) -> Result<()> {
    writer.write(&build_dir.join("build.ninja"))?;
    let tmp = StagingDir::new("wix-", false)?;
    info!("Building WiX sources in {}", build_dir.display());
    let cmd = ToolCommand::new("ninja")
        .current_dir(build_dir)
        .envs(&ctx.config.env)
        .env("TMP", tmp.path().to_string_lossy().to_string());
    ctx.runner.run(&cmd)
}

fn modes(opts: &PackOptions, devel: bool) -> Vec<PackageType> {
    if opts.devel && devel {
        vec![PackageType::Runtime, PackageType::Devel]
    } else {
        vec![PackageType::Runtime]
    }
}

/// Merge modules (or fragment libraries) of a single leaf package
pub struct MergeModulePackager {
    ctx: PackContext,
    name: String,
}

impl MergeModulePackager {
    pub fn new(ctx: &PackContext, name: &str) -> Result<Self> {
        ctx.package(name)?;
        Ok(Self {
            ctx: ctx.clone(),
            name: name.to_string(),
        })
    }
}

impl Packager for MergeModulePackager {
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
        let fragment = self.ctx.package(&self.name)?.base().wix_use_fragment;
        let build = StagingDir::new_in(&output_dir, &format!("merge-module-{}-", self.name), opts.keep_temp)?;
        let mut writer = new_writer(&self.ctx, &format!("the merge module {}", self.name));

        let mut outputs = Vec::new();
        let mut info = PackedInfo::default();
        for mode in modes(opts, true) {
            if let Some(built) = add_module(&self.ctx, build.path(), &mut writer, &self.name, mode, opts, fragment)? {
                match mode {
                    PackageType::Devel => info.has_devel = true,
                    _ => info.has_runtime = true,
                }
                outputs.push(built.output);
            }
        }
        if outputs.is_empty() {
            return Err(Error::EmptyPackage(self.name.clone()));
        }
        for output in &outputs {
            check_output(&output_dir.join(output), opts.force)?;
        }
        session.record(&self.name, info);

        run_ninja(&self.ctx, build.path(), &writer)?;
        outputs
            .iter()
            .map(|o| place_artifact(&build.join(o), &output_dir, opts.force))
            .collect()
    }
}

/// MSI installer of a meta package or an app
pub struct MsiPackager {
    ctx: PackContext,
    name: String,
}

struct Installer {
    msi: String,
    merge_modules: Vec<String>,
}

impl MsiPackager {
    pub fn new(ctx: &PackContext, name: &str) -> Result<Self> {
        ctx.package(name)?;
        Ok(Self {
            ctx: ctx.clone(),
            name: name.to_string(),
        })
    }

    fn package(&self) -> Result<&PackageEntity> {
        self.ctx.package(&self.name)
    }

    /// Packages whose modules go into the installer
    fn closure(&self) -> Result<Vec<String>> {
        match self.package()? {
            PackageEntity::App(_) => Ok(vec![self.name.clone()]),
            _ => self.ctx.store.deps_names(&self.name, true),
        }
    }

    fn stem(&self, mode: PackageType) -> Result<String> {
        let base = self.package()?.base();
        Ok(artifact_stem(&self.ctx.config, &display_name(base, mode), &base.version))
    }

    /// Add the modules and the installer of one mode to the build graph
    fn add_installer(
        &self,
        build_dir: &Path,
        writer: &mut NinjaWriter,
        mode: PackageType,
        opts: &PackOptions,
        session: &mut PackSession,
    ) -> Result<Option<Installer>> {
        let package = self.package()?;
        let base = package.base();
        let fragment = base.wix_use_fragment;

        writer.comment(&format!("{} installer", mode));
        let mut modules = BTreeMap::new();
        let mut outputs = Vec::new();
        for dep in self.closure()? {
            if session.is_empty(&dep) {
                continue;
            }
            info!("Creating {} module for {}", mode, dep);
            match add_module(&self.ctx, build_dir, writer, &dep, mode, opts, fragment)? {
                Some(built) => {
                    modules.insert(dep, built.module);
                    outputs.push(built.output);
                }
                None if mode == PackageType::Runtime => session.mark_empty(&dep),
                None => {}
            }
        }
        if modules.is_empty() {
            return Ok(None);
        }

        let features = plan_features(&self.ctx, package, mode, &modules)?;
        let mut msi = Msi::new(&self.ctx.config, base, mode, &modules, &features);
        if let PackageEntity::Meta(meta) = package
            && mode == PackageType::Runtime
        {
            msi = msi.with_root_env_var(meta.root_env_var(self.ctx.config.target_arch));
        }
        let stem = self.stem(mode)?;
        let wxs = format!("{}.wxs", stem);
        msi.write(&build_dir.join(&wxs))?;

        let arch = match self.ctx.config.target_arch {
            Architecture::X86_64 => "x64",
            _ => "x86",
        };
        let wixobj = format!("{}.wixobj", stem);
        writer.build(
            &[wixobj.clone()],
            "candle",
            &[wxs],
            &[],
            &[("extra", format!("-arch {}", arch))],
        );

        // fragment libraries are linked in, merge modules are only referenced
        let (libs, merge_modules): (Vec<String>, Vec<String>) =
            outputs.into_iter().partition(|o| o.ends_with(".wixlib"));
        let mut inputs = vec![wixobj];
        inputs.extend(libs);
        let msi_name = format!("{}.msi", stem);
        writer.build(
            &[msi_name.clone()],
            "light",
            &inputs,
            &merge_modules,
            &[("extra", UI_EXTENSION.to_string())],
        );
        Ok(Some(Installer {
            msi: msi_name,
            merge_modules,
        }))
    }

    /// Zip the runtime merge modules and the build file next to the MSI
    fn bundle_merge_modules(
        &self,
        build_dir: &Path,
        output_dir: &Path,
        merge_modules: &[String],
        opts: &PackOptions,
    ) -> Result<PathBuf> {
        let stem = self.stem(PackageType::Runtime)?;
        let path = output_dir.join(format!("{}-merge-modules.zip", stem));
        check_output(&path, opts.force)?;
        let mut entries: Vec<(String, PathBuf)> = merge_modules
            .iter()
            .map(|m| (format!("{}/{}", stem, m), build_dir.join(m)))
            .collect();
        entries.push((format!("{}/build.ninja", stem), build_dir.join("build.ninja")));
        write_zip(&path, &entries)?;
        info!("Created {}", path.display());
        Ok(path)
    }
}

impl Packager for MsiPackager {
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
        let package = self.package()?;
        let runtime_stem = self.stem(PackageType::Runtime)?;
        let build = StagingDir::new_in(&output_dir, &format!("msi-{}-", runtime_stem), opts.keep_temp)?;
        let mut writer = new_writer(&self.ctx, &format!("the MSI installer {}", runtime_stem));

        let mut installers = BTreeMap::new();
        for mode in modes(opts, package.as_app().is_none()) {
            match self.add_installer(build.path(), &mut writer, mode, opts, session)? {
                Some(installer) => {
                    installers.insert(mode, installer);
                }
                None if mode == PackageType::Runtime => {
                    return Err(Error::EmptyPackage(self.name.clone()));
                }
                None => warn!("The development installer of {} is empty", self.name),
            }
        }
        for installer in installers.values() {
            check_output(&output_dir.join(&installer.msi), opts.force)?;
        }
        session.record(
            &self.name,
            PackedInfo {
                has_runtime: true,
                has_devel: installers.contains_key(&PackageType::Devel),
            },
        );

        run_ninja(&self.ctx, build.path(), &writer)?;

        let mut paths = Vec::new();
        for installer in installers.values() {
            paths.push(place_artifact(&build.join(&installer.msi), &output_dir, opts.force)?);
        }
        if let Some(runtime) = installers.get(&PackageType::Runtime)
            && !runtime.merge_modules.is_empty()
        {
            paths.push(self.bundle_merge_modules(build.path(), &output_dir, &runtime.merge_modules, opts)?);
        }
        Ok(paths)
    }
}
