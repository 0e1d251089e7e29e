// src/error.rs

//! Error types shared by the whole packaging pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Package '{0}' not found")]
    PackageNotFound(String),

    #[error("Recipe '{0}' not found in the file manifest")]
    RecipeNotFound(String),

    #[error("Package '{0}' is empty")]
    EmptyPackage(String),

    #[error("The following files required by package '{package}' are missing:\n {}", files.join("\n "))]
    MissingPackageFiles { package: String, files: Vec<String> },

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Package '{0}' is already registered")]
    DuplicatePackage(String),

    #[error("Circular package dependency: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Command '{command}' failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Required tool '{0}' was not found")]
    ToolNotFound(String),

    #[error("No packager available for distro {0}")]
    NoPackager(String),

    #[error("Architecture {0} is not supported by this packager")]
    UnsupportedArch(String),

    #[error("Invalid package descriptor {path}: {message}")]
    Descriptor { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to render XML: {0}")]
    Xml(String),

    #[error("Failed to write archive: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error means "nothing to package" rather than a hard failure
    pub fn is_empty_package(&self) -> bool {
        matches!(self, Error::EmptyPackage(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_message_lists_every_file() {
        let err = Error::MissingPackageFiles {
            package: "gstreamer-core".to_string(),
            files: vec!["bin/a".to_string(), "bin/b".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("gstreamer-core"));
        assert!(msg.contains("bin/a"));
        assert!(msg.contains("bin/b"));
    }

    #[test]
    fn test_cycle_message() {
        let err = Error::DependencyCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "Circular package dependency: a -> b -> a");
    }

    #[test]
    fn test_is_empty_package() {
        assert!(Error::EmptyPackage("x".into()).is_empty_package());
        assert!(!Error::PackageNotFound("x".into()).is_empty_package());
    }
}
