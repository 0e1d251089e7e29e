// src/packager/osx/pmdoc.rs

//! PackageMaker documents
//!
//! A `<name>.pmdoc` directory holds an `index.xml` with one choice per
//! member, plus for every built component package a `<pkg>.xml` reference
//! and a `<pkg>-contents.xml` listing. The listing is read back from the
//! built package's bill of materials, so it describes what was actually
//! packed rather than what the descriptors declared.

use super::buildtools::{lsbom_dirs, lsbom_files, pkgutil_expand};
use crate::error::{Error, Result};
use crate::package::{PackageBase, PackageRef, PackageType, Resource};
use crate::packager::xml::Element;
use crate::packager::{PackContext, StagingDir};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SPEC_VERSION: &str = "1.12";
const OWNER: &str = "root";
const GROUP: &str = "admin";
/// `drwxr-xr-x` as a decimal stat mode
const ROOT_MODE: &str = "16877";

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn mods(parent: &mut Element, names: &[&str]) {
    for name in names {
        parent.push(Element::new("mod").text(*name));
    }
}

/// Parse `lsbom -p fm` output into paths and decimal stat modes
///
/// The first line describes the root and is skipped.
pub fn parse_bom_files(output: &str) -> Result<BTreeMap<String, String>> {
    let mut modes = BTreeMap::new();
    for line in output.lines().skip(1).filter(|l| !l.is_empty()) {
        let (path, mode) = line
            .split_once('\t')
            .ok_or_else(|| Error::Usage(format!("unexpected lsbom line '{}'", line)))?;
        let mode = u32::from_str_radix(mode.trim(), 8)
            .map_err(|e| Error::Usage(format!("invalid mode in lsbom line '{}': {}", line, e)))?;
        modes.insert(path.to_string(), mode.to_string());
    }
    Ok(modes)
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => (".", path),
    }
}

/// The `pkg-contents` tree of one package
///
/// `dirs` come in the order `lsbom -d` lists them, parents first.
pub fn contents_element(dirs: &[String], modes: &BTreeMap<String, String>) -> Result<Element> {
    let entry = |name: &str, mode: &str| {
        Element::new("f")
            .attr("n", name)
            .attr("o", OWNER)
            .attr("g", GROUP)
            .attr("p", mode)
    };

    // children of every directory, keyed by directory path
    let mut children: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
    let dir_set: BTreeSet<&str> = dirs.iter().map(String::as_str).collect();
    for dir in dirs.iter().filter(|d| d.as_str() != ".") {
        let (parent, name) = split_parent(dir);
        let mode = modes
            .get(dir)
            .ok_or_else(|| Error::Usage(format!("no mode listed for directory {}", dir)))?;
        children.entry(parent).or_default().push((name, mode));
    }
    for (path, mode) in modes.iter().filter(|(p, _)| !dir_set.contains(p.as_str())) {
        let (parent, name) = split_parent(path);
        children.entry(parent).or_default().push((name, mode));
    }

    fn build(
        node: &mut Element,
        path: &str,
        children: &BTreeMap<&str, Vec<(&str, &str)>>,
        entry: &dyn Fn(&str, &str) -> Element,
    ) {
        for (name, mode) in children.get(path).into_iter().flatten() {
            let mut child = entry(name, mode);
            build(&mut child, &format!("{}/{}", path, name), children, entry);
            node.push(child);
        }
    }

    let mut package_root = Element::new("f")
        .attr("n", "PackageRoot")
        .attr("o", OWNER)
        .attr("g", GROUP)
        .attr("pt", ".")
        .attr("m", "true")
        .attr("t", "bom")
        .attr("p", ROOT_MODE);
    mods(&mut package_root, &["name"]);
    build(&mut package_root, ".", &children, &entry);

    Ok(Element::new("pkg-contents").attr("spec", SPEC_VERSION).child(package_root))
}

/// `<pkg>.xml`, the reference to one built component package
pub fn pkgref_element(base: &PackageBase, mode: PackageType, package_path: &Path) -> Result<Element> {
    let uuid = base
        .uuid
        .as_deref()
        .ok_or_else(|| Error::Usage(format!("uuid for package '{}' is not set", base.name)))?;
    let mut config = Element::new("config")
        .child(Element::new("version").text("1.0"))
        .child(Element::new("identifier").text(base.identifier(mode)))
        .child(Element::new("description").text(base.shortdesc.as_str()))
        .child(Element::new("post-install").attr("type", "none"))
        .child(Element::new("requireAuthorization"))
        .child(Element::new("installTo").attr("relative", "true").attr("mod", "true").text("."))
        .child(Element::new("packageStore").attr("type", "internal"));
    mods(
        &mut config,
        &[
            "installTo.isAbsoluteType",
            "installTo.path",
            "installTo.isRelativeType",
            "installTo",
            "parent",
            "version",
            "identifier",
        ],
    );
    config.push(Element::new("flags").child(Element::new("followSymbolicLinks")));

    Ok(Element::new("pkgref")
        .attr("spec", SPEC_VERSION)
        .attr("uuid", uuid)
        .child(config)
        .child(
            Element::new("scripts").child(
                Element::new("scripts-dir").text(package_path.join("Contents").join("Resources").display().to_string()),
            ),
        )
        .child(
            Element::new("contents")
                .child(Element::new("file-list").text(format!("{}-contents.xml", base.name)))
                .child(Element::new("filter").text(".DS_Store$")),
        )
        .child(
            Element::new("extra")
                .child(Element::new("title").text(base.shortdesc.as_str()))
                .child(Element::new("packagePath").text(package_path.display().to_string())),
        ))
}

/// Builds a `.pmdoc` for a product and its component packages
pub struct PmDoc<'a> {
    ctx: &'a PackContext,
    base: &'a PackageBase,
    members: Vec<PackageRef>,
    mode: PackageType,
    package_paths: &'a BTreeMap<String, PathBuf>,
    empty: &'a BTreeSet<String>,
}

impl<'a> PmDoc<'a> {
    pub fn new(
        ctx: &'a PackContext,
        base: &'a PackageBase,
        members: Vec<PackageRef>,
        mode: PackageType,
        package_paths: &'a BTreeMap<String, PathBuf>,
        empty: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            ctx,
            base,
            members,
            mode,
            package_paths,
            empty,
        }
    }

    /// `index.xml`; `out_dir` is the directory holding the product package
    pub fn index_element(&self, out_dir: &Path) -> Result<Element> {
        let mut properties = Element::new("properties")
            .child(Element::new("organization").text(self.base.org.clone().unwrap_or_default()))
            .child(Element::new("title").text(self.base.title()))
            .child(Element::new("build").text(out_dir.join(format!("{}.pkg", self.base.name)).display().to_string()));
        properties.push(Element::new("userSees").attr("ui", "custom"));
        properties.push(Element::new("min-target").attr("os", "2"));
        properties.push(Element::new("domain").attr("system", "true"));

        let mut root = Element::new("pkmdoc").attr("spec", SPEC_VERSION).child(properties).child(
            Element::new("distribution")
                .child(Element::new("scripts"))
                .child(Element::new("version").attr("min-spec", "1.000000")),
        );
        root.push(Element::new("description").text(self.base.shortdesc.as_str()));
        mods(&mut root, &["description", "properties.title", "properties.customizeOption"]);
        root.push(Element::new("flags"));

        let mut contents = Element::new("contents");
        let mut items = Vec::new();
        let mut referenced = BTreeSet::new();
        for member in &self.members {
            if self.empty.contains(&member.name) {
                continue;
            }
            let base = self.ctx.package(&member.name)?.base();
            let mut choice = Element::new("choice")
                .attr("title", base.shortdesc.as_str())
                .attr("id", base.name.as_str())
                .attr("starts_selected", bool_str(member.selected))
                .attr("starts_enabled", bool_str(!member.required))
                .attr("starts_hidden", "false");
            let mut closure = vec![member.name.clone()];
            closure.extend(self.ctx.store.deps_names(&member.name, true)?);
            for name in closure.into_iter().filter(|n| !self.empty.contains(n)) {
                let pkg = self.ctx.package(&name)?.base();
                choice.push(Element::new("pkgref").attr("id", pkg.identifier(self.mode)));
                if referenced.insert(name.clone()) {
                    items.push(Element::new("item").attr("type", "pkgref").text(format!("{}.xml", name)));
                }
            }
            contents.push(choice);
        }
        root.push(contents);
        for item in items {
            root.push(item);
        }

        let mut locale = Element::new("locale").attr("lang", "en");
        if let Some(background) = self.base.existing_resource(Resource::Background) {
            locale.push(
                Element::new("resource")
                    .attr("mod", "true")
                    .attr("type", "background")
                    .text(background.display().to_string()),
            );
        }
        if let Some(license) = self.base.existing_resource(Resource::License) {
            locale.push(
                Element::new("resource")
                    .attr("mod", "true")
                    .attr("type", "license")
                    .text(license.display().to_string()),
            );
        }
        root.push(
            Element::new("resources")
                .attr("bg-align", "left")
                .attr("bg-scale", "none")
                .child(locale),
        );
        Ok(root)
    }

    /// Read the bill of materials of a built package
    fn package_contents(&self, package: &Path, keep_temp: bool) -> Result<Element> {
        let scratch = StagingDir::new("distpack-pkgutil-", keep_temp)?;
        let expanded = scratch.join("expanded");
        self.ctx.runner.run(&pkgutil_expand(package, &expanded))?;
        let bom = expanded.join("Bom");
        let dirs: Vec<String> = self
            .ctx
            .runner
            .output(&lsbom_dirs(&bom))?
            .lines()
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        let modes = parse_bom_files(&self.ctx.runner.output(&lsbom_files(&bom))?)?;
        contents_element(&dirs, &modes)
    }

    /// Write the document into `<output_dir>/<name>.pmdoc`
    pub fn create(&self, output_dir: &Path, keep_temp: bool) -> Result<PathBuf> {
        let doc_dir = output_dir.join(format!("{}.pmdoc", self.base.name));
        std::fs::create_dir_all(&doc_dir)?;
        info!("Creating PackageMaker document {}", doc_dir.display());

        let mut done = BTreeSet::new();
        for member in &self.members {
            let mut closure = vec![member.name.clone()];
            closure.extend(self.ctx.store.deps_names(&member.name, true)?);
            for name in closure {
                if self.empty.contains(&name) || !done.insert(name.clone()) {
                    continue;
                }
                let path = self
                    .package_paths
                    .get(&name)
                    .ok_or_else(|| Error::PackageNotFound(name.clone()))?;
                debug!("Adding {} to {}", path.display(), doc_dir.display());
                let base = self.ctx.package(&name)?.base();
                pkgref_element(base, self.mode, path)?.write(&doc_dir.join(format!("{}.xml", name)))?;
                self.package_contents(path, keep_temp)?
                    .write(&doc_dir.join(format!("{}-contents.xml", name)))?;
            }
        }
        self.index_element(output_dir)?.write(&doc_dir.join("index.xml"))?;
        Ok(doc_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOM_DIRS: &str = ".\n./lib\n./lib/gstreamer-1.0\n";
    const BOM_FILES: &str = ".\t40755\n./lib\t40755\n./lib/gstreamer-1.0\t40755\n./lib/libglib.dylib\t100644\n./lib/gstreamer-1.0/libgstcore.so\t100755\n";

    #[test]
    fn test_parse_bom_files() {
        let modes = parse_bom_files(BOM_FILES).unwrap();
        assert_eq!(modes.len(), 4);
        assert_eq!(modes["./lib"], "16877");
        assert_eq!(modes["./lib/libglib.dylib"], "33188");
        assert!(parse_bom_files(".\t40755\nbroken line\n").is_err());
    }

    #[test]
    fn test_contents_tree() {
        let dirs: Vec<String> = BOM_DIRS.lines().map(String::from).collect();
        let modes = parse_bom_files(BOM_FILES).unwrap();
        let contents = contents_element(&dirs, &modes).unwrap();

        let root = contents.find("f").unwrap();
        assert_eq!(root.attribute("n"), Some("PackageRoot"));
        let lib = root.children().iter().find(|c| c.attribute("n") == Some("lib")).unwrap();
        assert_eq!(lib.attribute("p"), Some("16877"));
        let names: Vec<&str> = lib.children().iter().filter_map(|c| c.attribute("n")).collect();
        assert_eq!(names, vec!["gstreamer-1.0", "libglib.dylib"]);
        let plugin = &lib.children()[0].children()[0];
        assert_eq!(plugin.attribute("n"), Some("libgstcore.so"));
        assert_eq!(plugin.attribute("p"), Some("33261"));
    }

    #[test]
    fn test_pkgref_requires_uuid() {
        let mut base = PackageBase::new("core", "1.0", "Core");
        assert!(pkgref_element(&base, PackageType::Runtime, Path::new("/out/core.pkg")).is_err());

        base.uuid = Some("d9626750-e8e5-4f8a-b5b0-9b8ff4e4a4c4".to_string());
        let pkgref = pkgref_element(&base, PackageType::Runtime, Path::new("/out/core.pkg")).unwrap();
        assert_eq!(pkgref.attribute("uuid"), Some("d9626750-e8e5-4f8a-b5b0-9b8ff4e4a4c4"));
        let identifier = pkgref.find("config").unwrap().find("identifier").unwrap();
        assert_eq!(identifier.get_text(), Some("org.distpack.core"));
        let list = pkgref.find("contents").unwrap().find("file-list").unwrap();
        assert_eq!(list.get_text(), Some("core-contents.xml"));
    }
}
