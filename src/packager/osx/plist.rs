// src/packager/osx/plist.rs

//! `Info.plist` files for framework and application bundles

use crate::error::Result;
use std::collections::BTreeMap;
use std::path::Path;

const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
"#;

/// A plist value; only the kinds bundles need
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlistValue {
    String(String),
    Bool(bool),
}

/// Bundle kind, stored as `CFBundlePackageType`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleType {
    Framework,
    Application,
}

impl BundleType {
    fn code(self) -> &'static str {
        match self {
            BundleType::Framework => "FMWK",
            BundleType::Application => "APPL",
        }
    }
}

fn format_property(key: &str, value: &PlistValue) -> String {
    match value {
        PlistValue::String(s) => format!("<key>{}</key>\n<string>{}</string>", key, escape(s)),
        PlistValue::Bool(b) => format!("<key>{}</key>\n<{}/>", key, b),
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Render a dictionary with its keys in sorted order
pub fn render_dict(properties: &BTreeMap<String, PlistValue>) -> String {
    let body: Vec<String> = properties.iter().map(|(k, v)| format_property(k, v)).collect();
    format!("{}<dict>\n{}\n</dict>\n</plist>\n", HEADER, body.join("\n"))
}

#[derive(Debug, Clone)]
pub struct InfoPlist {
    pub name: String,
    pub identifier: String,
    pub version: String,
    pub info: String,
    pub bundle_type: BundleType,
    pub icon: Option<String>,
    pub min_os_version: Option<String>,
}

impl InfoPlist {
    pub fn new(name: &str, identifier: &str, version: &str, info: &str, bundle_type: BundleType) -> Self {
        Self {
            name: name.to_string(),
            identifier: identifier.to_string(),
            version: version.to_string(),
            info: info.to_string(),
            bundle_type,
            icon: None,
            min_os_version: None,
        }
    }

    pub fn properties(&self) -> BTreeMap<String, PlistValue> {
        let mut props = BTreeMap::new();
        let mut insert = |k: &str, v: &str| {
            props.insert(k.to_string(), PlistValue::String(v.to_string()));
        };
        insert("CFBundleName", &self.name);
        insert("CFBundleIdentifier", &self.identifier);
        insert("CFBundleVersion", &self.version);
        insert("CFBundleGetInfoString", &self.info);
        insert("CFBundlePackageType", self.bundle_type.code());
        if let Some(icon) = &self.icon {
            insert("CFBundleIconFile", icon);
        }
        if let Some(version) = &self.min_os_version {
            insert("LSMinimumSystemVersion", version);
        }
        props
    }

    pub fn render(&self) -> String {
        render_dict(&self.properties())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())?;
        Ok(())
    }
}
