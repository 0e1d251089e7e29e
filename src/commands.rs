// src/commands.rs
//! Command handlers for the distpack CLI

use crate::cli::SourceArgs;
use anyhow::{Context, Result};
use distpack::packager::files_list;
use distpack::{
    ArtifactType, PackContext, PackOptions, PackageType, PackagerRegistry, PackagesStore, PackagingConfig,
    RecipeManifest, SystemRunner,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Configuration and store of one run
struct Loaded {
    config: Arc<PackagingConfig>,
    store: Arc<PackagesStore>,
}

impl Loaded {
    fn context(&self) -> PackContext {
        PackContext::new(self.config.clone(), self.store.clone(), Arc::new(SystemRunner))
    }
}

fn load(source: &SourceArgs) -> Result<Loaded> {
    let config = PackagingConfig::from_file(&source.config)
        .with_context(|| format!("Failed to load configuration {}", source.config.display()))?;
    let manifest = RecipeManifest::from_file(&source.manifest)
        .with_context(|| format!("Failed to load file manifest {}", source.manifest.display()))?;
    let store = PackagesStore::load_dir(&source.packages_dir, config.target_platform, Arc::new(manifest))
        .with_context(|| format!("Failed to load packages from {}", source.packages_dir.display()))?;
    store.validate()?;
    Ok(Loaded {
        config: Arc::new(config),
        store: Arc::new(store),
    })
}

pub fn cmd_pack(
    package: &str,
    source: &SourceArgs,
    output_dir: &Path,
    opts: PackOptions,
    artifact: ArtifactType,
) -> Result<()> {
    let loaded = load(source)?;
    loaded.config.check_packager();
    let ctx = loaded.context();

    let registry = PackagerRegistry::with_defaults();
    let packager = registry.packager(&ctx, package, artifact)?;
    info!("Packing {} into {}", package, output_dir.display());
    let paths = packager
        .pack(output_dir, &opts)
        .with_context(|| format!("Failed to pack {}", package))?;

    println!("Created {} artifacts for {}:", paths.len(), package);
    for path in paths {
        println!("  {}", path.display());
    }
    Ok(())
}

pub fn cmd_list(source: &SourceArgs) -> Result<()> {
    let loaded = load(source)?;
    let packages = loaded.store.packages_list();
    if packages.is_empty() {
        println!("No packages found in {}", source.packages_dir.display());
        return Ok(());
    }
    for p in packages {
        println!("{:<32} {:<8} {:<12} {}", p.name(), p.kind(), p.version(), p.base().shortdesc);
    }
    Ok(())
}

pub fn cmd_deps(package: &str, source: &SourceArgs, recursive: bool) -> Result<()> {
    let loaded = load(source)?;
    let deps = loaded.store.get_package_deps(package, recursive)?;
    if deps.is_empty() {
        println!("{} has no dependencies", package);
        return Ok(());
    }
    for dep in deps {
        println!("{}", dep.name());
    }
    Ok(())
}

pub fn cmd_files(package: &str, source: &SourceArgs, mode: PackageType, existing: bool) -> Result<()> {
    let loaded = load(source)?;
    let files = if existing {
        files_list(&loaded.context(), package, mode, true)?
    } else {
        loaded.store.files(package, mode)?
    };
    for f in files {
        println!("{}", f);
    }
    Ok(())
}
