// src/packager/wix/ninja.rs

//! `build.ninja` generation for the WiX tools

use crate::config::PackagingConfig;
use std::path::Path;

/// Escape a path for use in a build statement
fn escape_path(path: &str) -> String {
    path.replace('$', "$$").replace(' ', "$ ").replace(':', "$:")
}

/// Writes a ninja build file line by line
#[derive(Debug, Default)]
pub struct NinjaWriter {
    out: String,
}

impl NinjaWriter {
    pub fn new() -> Self {
        let mut writer = Self::default();
        writer.line("ninja_required_version = 1.1");
        writer.newline();
        writer
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    pub fn newline(&mut self) {
        self.out.push('\n');
    }

    pub fn comment(&mut self, text: &str) {
        for line in text.lines() {
            self.line(&format!("# {}", line));
        }
    }

    pub fn rule(&mut self, name: &str, command: &str, description: &str) {
        self.line(&format!("rule {}", name));
        self.line(&format!("  command = {}", command));
        self.line(&format!("  description = {}", description));
        self.newline();
    }

    /// `build outputs: rule inputs | implicit` with per-build variables
    pub fn build(
        &mut self,
        outputs: &[String],
        rule: &str,
        inputs: &[String],
        implicit: &[String],
        variables: &[(&str, String)],
    ) {
        let join = |paths: &[String]| {
            paths.iter().map(|p| escape_path(p)).collect::<Vec<_>>().join(" ")
        };
        let mut statement = format!("build {}: {}", join(outputs), rule);
        if !inputs.is_empty() {
            statement.push(' ');
            statement.push_str(&join(inputs));
        }
        if !implicit.is_empty() {
            statement.push_str(" | ");
            statement.push_str(&join(implicit));
        }
        self.line(&statement);
        for (key, value) in variables {
            self.line(&format!("  {} = {}", key, value));
        }
        self.newline();
    }

    /// Rules compiling sources with candle, linking with light and
    /// archiving fragments with lit
    pub fn wix_rules(&mut self, config: &PackagingConfig) {
        let tool = |name: &str| wix_tool(config, name);
        self.comment("Incantations for the WiX Toolkit");
        self.rule(
            "candle",
            &format!("{} -nologo -out $out $extra $in", tool("candle.exe")),
            "Compiling $out",
        );
        self.rule(
            "light",
            &format!("{} -nologo -out $out -sval $extra $in", tool("light.exe")),
            "Linking $out",
        );
        self.rule(
            "lit",
            &format!("{} -nologo -out $out $in", tool("lit.exe")),
            "Archiving $out",
        );
    }

    pub fn contents(&self) -> &str {
        &self.out
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.out)
    }
}

/// Command line prefix running a WiX tool, through wine when needed
fn wix_tool(config: &PackagingConfig, name: &str) -> String {
    let path = config.wix_prefix.join(name);
    let quoted = format!("\"{}\"", path.to_string_lossy().replace('\\', "/"));
    if config.with_wine() {
        format!("wine {}", quoted)
    } else {
        quoted
    }
}
