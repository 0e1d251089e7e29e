// src/strip.rs

//! Binary stripping
//!
//! Strips object files inside an isolated copy of the install prefix. Files
//! are independent of each other, so a tree is stripped with a rayon fan-out
//! and the first failure is returned once every task has finished.

use crate::config::{PackagingConfig, Platform};
use crate::error::{Error, Result};
use crate::packager::{ToolCommand, ToolRunner};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Object file signatures: ELF, Mach-O (both endians, 32/64 bit and fat),
/// PE and static archives
const MAGICS: &[&[u8]] = &[
    b"\x7fELF",
    &[0xfe, 0xed, 0xfa, 0xce],
    &[0xfe, 0xed, 0xfa, 0xcf],
    &[0xce, 0xfa, 0xed, 0xfe],
    &[0xcf, 0xfa, 0xed, 0xfe],
    &[0xca, 0xfe, 0xba, 0xbe],
    b"MZ",
    b"!<arch>\n",
];

/// Whether a file starts with an object file signature
pub fn is_object_file(path: &Path) -> bool {
    let mut header = [0u8; 8];
    let read = match File::open(path).and_then(|mut f| f.read(&mut header)) {
        Ok(n) => n,
        Err(_) => return false,
    };
    MAGICS
        .iter()
        .any(|magic| read >= magic.len() && header.starts_with(magic))
}

#[derive(Debug, Clone)]
pub struct Strip {
    command: Vec<String>,
    env: BTreeMap<String, String>,
    darwin: bool,
    excludes: Vec<String>,
    keep_symbols: Vec<String>,
}

impl Strip {
    /// Stripper for the configured target; `STRIP` defaults to `strip`
    pub fn new(config: &PackagingConfig, excludes: &[String]) -> Self {
        let command = config
            .strip_command()
            .unwrap_or("strip")
            .split_whitespace()
            .map(String::from)
            .collect();
        Self {
            command,
            env: config.env.clone(),
            darwin: config.target_platform == Platform::Darwin
                || config.target_platform == Platform::Ios,
            excludes: excludes.to_vec(),
            keep_symbols: Vec::new(),
        }
    }

    pub fn with_keep_symbols(mut self, symbols: &[String]) -> Self {
        self.keep_symbols = symbols.to_vec();
        self
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.excludes.iter().any(|e| path.contains(e.as_str()))
    }

    /// Command stripping one file
    pub fn command(&self, path: &Path) -> Result<ToolCommand> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| Error::Config("STRIP command is empty".to_string()))?;
        let mut cmd = ToolCommand::new(program.clone()).args(args.iter().cloned()).envs(&self.env);
        if self.darwin {
            cmd = cmd.arg("-x");
        } else {
            for symbol in &self.keep_symbols {
                cmd = cmd.arg("-K").arg(symbol.clone());
            }
            cmd = cmd.arg("--strip-unneeded");
        }
        Ok(cmd.arg_path(path))
    }

    /// Strip a single file; returns whether it was stripped
    pub fn strip_file(&self, runner: &dyn ToolRunner, path: &Path) -> Result<bool> {
        if self.is_excluded(path) || path.is_symlink() || !is_object_file(path) {
            return Ok(false);
        }
        debug!("Stripping {}", path.display());
        runner.run(&self.command(path)?)?;
        Ok(true)
    }

    fn strip_paths(&self, runner: &dyn ToolRunner, paths: &[PathBuf]) -> Result<usize> {
        let results: Vec<Result<bool>> = paths
            .par_iter()
            .map(|path| self.strip_file(runner, path))
            .collect();

        let mut stripped = 0;
        for result in results {
            if result? {
                stripped += 1;
            }
        }
        Ok(stripped)
    }

    /// Strip the listed files, relative to `root`
    pub fn strip_files(&self, runner: &dyn ToolRunner, root: &Path, files: &[String]) -> Result<usize> {
        let paths: Vec<PathBuf> = files.iter().map(|f| root.join(f)).collect();
        let stripped = self.strip_paths(runner, &paths)?;
        info!("Stripped {} of {} files in {}", stripped, files.len(), root.display());
        Ok(stripped)
    }

    /// Strip every regular file below `dir`
    pub fn strip_dir(&self, runner: &dyn ToolRunner, dir: &Path) -> Result<usize> {
        let paths: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        let stripped = self.strip_paths(runner, &paths)?;
        info!("Stripped {} files in {}", stripped, dir.display());
        Ok(stripped)
    }
}
