// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Arguments locating the configuration, descriptors and file manifest
fn source_args() -> [Arg; 3] {
    [
        Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .default_value("distpack.toml")
            .help("Packaging configuration file"),
        Arg::new("packages_dir")
            .short('p')
            .long("packages-dir")
            .value_name("DIR")
            .default_value("packages")
            .help("Directory holding the package descriptors"),
        Arg::new("manifest")
            .short('m')
            .long("manifest")
            .value_name("FILE")
            .default_value("manifest.toml")
            .help("Recipe file manifest"),
    ]
}

fn flag(name: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(long).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("distpack")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Distpack Contributors")
        .about("Package a built install prefix into native distributable artifacts")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log debug messages"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("pack")
                .about("Pack a package and its dependencies")
                .arg(Arg::new("package").required(true).help("Name of the package to pack"))
                .args(source_args())
                .arg(
                    Arg::new("output_dir")
                        .short('o')
                        .long("output-dir")
                        .default_value(".")
                        .help("Output directory for the artifacts"),
                )
                .arg(flag("no_devel", "no-devel", "Skip the development packages"))
                .arg(flag("force", "force", "Overwrite existing artifacts and skip missing files"))
                .arg(flag("keep_temp", "keep-temp", "Keep the temporary staging trees"))
                .arg(
                    Arg::new("type")
                        .short('t')
                        .long("type")
                        .default_value("default")
                        .value_parser(["default", "inno", "tarball"])
                        .help("Artifact flavour"),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List the packages of the store")
                .args(source_args()),
        )
        .subcommand(
            Command::new("deps")
                .about("Show the dependencies of a package")
                .arg(Arg::new("package").required(true).help("Package name"))
                .args(source_args())
                .arg(flag("recursive", "recursive", "Show the whole dependency closure")),
        )
        .subcommand(
            Command::new("files")
                .about("Show the files a package covers")
                .arg(Arg::new("package").required(true).help("Package name"))
                .args(source_args())
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .default_value("runtime")
                        .value_parser(["runtime", "devel", "debug"])
                        .help("Package mode"),
                )
                .arg(flag("existing", "existing", "Only list files present in the install prefix")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("distpack.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
