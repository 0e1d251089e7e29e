// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use distpack::PackOptions;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Pack {
            package,
            source,
            output_dir,
            no_devel,
            force,
            keep_temp,
            r#type,
        } => {
            let opts = PackOptions {
                devel: !no_devel,
                force,
                keep_temp,
            };
            commands::cmd_pack(&package, &source, &output_dir, opts, r#type)
        }
        Commands::List { source } => commands::cmd_list(&source),
        Commands::Deps {
            package,
            source,
            recursive,
        } => commands::cmd_deps(&package, &source, recursive),
        Commands::Files {
            package,
            source,
            mode,
            existing,
        } => commands::cmd_files(&package, &source, mode, existing),
    }
}
