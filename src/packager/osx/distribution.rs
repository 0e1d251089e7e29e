// src/packager/osx/distribution.rs

//! `Distribution.xml` for `productbuild`
//!
//! One choice per member of the product, each referencing the component
//! packages of the member and its dependencies. Empty packages have no
//! component package and are left out entirely.

use crate::error::{Error, Result};
use crate::package::{PackageBase, PackageRef, PackageType, Resource};
use crate::packager::PackContext;
use crate::packager::xml::Element;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

pub struct DistributionXml<'a> {
    ctx: &'a PackContext,
    base: &'a PackageBase,
    members: Vec<PackageRef>,
    mode: PackageType,
    /// Component package file of every non-empty package, by package name
    package_files: &'a BTreeMap<String, String>,
    empty: &'a BTreeSet<String>,
    home_folder: bool,
    bundles: Vec<BundleChoice>,
}

/// A required component package with no store entry, such as a framework
/// bundle skeleton
#[derive(Debug, Clone)]
pub struct BundleChoice {
    pub identifier: String,
    pub title: String,
    pub version: String,
    pub file: String,
}

impl<'a> DistributionXml<'a> {
    pub fn new(
        ctx: &'a PackContext,
        base: &'a PackageBase,
        members: Vec<PackageRef>,
        mode: PackageType,
        package_files: &'a BTreeMap<String, String>,
        empty: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            ctx,
            base,
            members,
            mode,
            package_files,
            empty,
            home_folder: false,
            bundles: Vec::new(),
        }
    }

    /// Install into the user's home instead of the local system
    pub fn with_home_folder(mut self, home_folder: bool) -> Self {
        self.home_folder = home_folder;
        self
    }

    pub fn with_bundle(mut self, bundle: BundleChoice) -> Self {
        self.bundles.push(bundle);
        self
    }

    pub fn to_element(&self) -> Result<Element> {
        let mut root = Element::new("installer-gui-script").attr("minSpecVersion", "1");
        root.push(Element::new("options").attr("require-scripts", "false"));
        if let Some(background) = self.base.existing_resource(Resource::Background) {
            root.push(
                Element::new("background")
                    .attr("align", "left")
                    .attr("scale", "none")
                    .attr("file", background.display().to_string()),
            );
        }
        if let Some(license) = self.base.existing_resource(Resource::License) {
            root.push(Element::new("license").attr("file", license.display().to_string()));
        }
        root.push(
            Element::new("domains")
                .attr("enable_anywhere", "false")
                .attr("enable_currentUserHome", bool_str(self.home_folder))
                .attr("enable_localSystem", bool_str(!self.home_folder)),
        );
        root.push(Element::new("title").text(self.base.shortdesc.as_str()));

        let mut outline = Element::new("choices-outline");
        let mut choices = Vec::new();
        let mut refs = Vec::new();
        let mut referenced = BTreeSet::new();
        for member in &self.members {
            if self.empty.contains(&member.name) {
                continue;
            }
            let base = self.ctx.package(&member.name)?.base();
            let id = base.identifier(self.mode);
            outline.push(Element::new("line").attr("choice", id.as_str()));

            let mut choice = Element::new("choice")
                .attr("id", id.as_str())
                .attr("title", base.shortdesc.as_str())
                .attr("description", base.description());
            if !member.selected {
                choice.set("start_selected", "false");
            }
            if member.required {
                choice.set("start_enabled", "false");
            }

            let mut closure = vec![member.name.clone()];
            closure.extend(self.ctx.store.deps_names(&member.name, true)?);
            for name in closure {
                if self.empty.contains(&name) {
                    continue;
                }
                let pkg = self.ctx.package(&name)?.base();
                let pkg_id = pkg.identifier(self.mode);
                choice.push(Element::new("pkg-ref").attr("id", pkg_id.as_str()));
                if referenced.insert(name.clone()) {
                    let file = self
                        .package_files
                        .get(&name)
                        .ok_or_else(|| Error::PackageNotFound(name.clone()))?;
                    refs.push(
                        Element::new("pkg-ref")
                            .attr("id", pkg_id)
                            .attr("version", pkg.version.as_str())
                            .text(file.as_str()),
                    );
                }
            }
            choices.push(choice);
        }
        for bundle in &self.bundles {
            outline.push(Element::new("line").attr("choice", bundle.identifier.as_str()));
            choices.push(
                Element::new("choice")
                    .attr("id", bundle.identifier.as_str())
                    .attr("title", bundle.title.as_str())
                    .attr("start_enabled", "false")
                    .child(Element::new("pkg-ref").attr("id", bundle.identifier.as_str())),
            );
            refs.push(
                Element::new("pkg-ref")
                    .attr("id", bundle.identifier.as_str())
                    .attr("version", bundle.version.as_str())
                    .text(bundle.file.as_str()),
            );
        }

        root.push(outline);
        for choice in choices {
            root.push(choice);
        }
        for r in refs {
            root.push(r);
        }
        Ok(root)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        self.to_element()?.write(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Architecture, Distro, PackagingConfig, Platform};
    use crate::manifest::RecipeManifest;
    use crate::package::{MetaPackage, Package};
    use crate::packager::{ToolCommand, ToolRunner};
    use crate::store::PackagesStore;
    use std::sync::Arc;

    struct NoTools;

    impl ToolRunner for NoTools {
        fn output(&self, _command: &ToolCommand) -> Result<String> {
            Ok(String::new())
        }

        fn is_available(&self, _program: &str) -> bool {
            false
        }
    }

    fn context() -> PackContext {
        let mut store = PackagesStore::new(Platform::Darwin, Arc::new(RecipeManifest::new()));
        let leaf = |name: &str, deps: &[&str]| {
            Package::new(
                PackageBase::new(name, "1.0", &format!("{} files", name)),
                deps.iter().map(|d| d.to_string()).collect(),
                &[],
                &[],
            )
        };
        store.add_package(leaf("core", &[])).unwrap();
        store.add_package(leaf("empty", &[])).unwrap();
        store.add_package(leaf("base", &["core", "empty"])).unwrap();
        store.add_package(leaf("plugins", &["base"])).unwrap();
        let config = PackagingConfig::new("/opt/sdk", Platform::Darwin, Architecture::X86_64, Distro::Osx);
        PackContext::new(Arc::new(config), Arc::new(store), Arc::new(NoTools))
    }

    fn members() -> Vec<PackageRef> {
        vec![
            PackageRef::new("base", true, true),
            PackageRef::new("plugins", false, false),
            PackageRef::new("empty", false, true),
        ]
    }

    #[test]
    fn test_choices_and_refs() {
        let ctx = context();
        let meta = MetaPackage::new(PackageBase::new("sdk", "1.0", "SDK"), members(), BTreeMap::new());
        let files: BTreeMap<String, String> = ["core", "base", "plugins"]
            .iter()
            .map(|n| (n.to_string(), format!("{}-1.0-x86_64.pkg", n)))
            .collect();
        let empty: BTreeSet<String> = ["empty".to_string()].into();
        let doc = DistributionXml::new(&ctx, &meta.base, meta.packages(Platform::Darwin), PackageType::Runtime, &files, &empty)
            .to_element()
            .unwrap();

        assert_eq!(doc.name(), "installer-gui-script");
        assert_eq!(doc.find("title").unwrap().get_text(), Some("SDK"));
        let lines = doc.find("choices-outline").unwrap().children();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].attribute("choice"), Some("org.distpack.base"));

        let choices: Vec<&Element> = doc.children().iter().filter(|c| c.name() == "choice").collect();
        assert_eq!(choices[0].attribute("start_enabled"), Some("false"));
        assert_eq!(choices[0].attribute("start_selected"), None);
        assert_eq!(choices[1].attribute("start_selected"), Some("false"));
        let base_refs: Vec<Option<&str>> = choices[0].children().iter().map(|r| r.attribute("id")).collect();
        assert_eq!(base_refs, vec![Some("org.distpack.base"), Some("org.distpack.core")]);

        let refs: Vec<&Element> = doc.children().iter().filter(|c| c.name() == "pkg-ref").collect();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].get_text(), Some("base-1.0-x86_64.pkg"));
    }

    #[test]
    fn test_bundle_choice() {
        let ctx = context();
        let base = PackageBase::new("sdk", "1.0", "SDK");
        let files = BTreeMap::new();
        let empty = BTreeSet::new();
        let doc = DistributionXml::new(&ctx, &base, Vec::new(), PackageType::Runtime, &files, &empty)
            .with_bundle(BundleChoice {
                identifier: "org.distpack.sdk-framework".to_string(),
                title: "Framework Bundle".to_string(),
                version: "1.0".to_string(),
                file: "sdk-framework-1.0-x86_64.pkg".to_string(),
            })
            .to_element()
            .unwrap();
        let choice = doc.find("choice").unwrap();
        assert_eq!(choice.attribute("start_enabled"), Some("false"));
        let reference = doc.children().iter().find(|c| c.name() == "pkg-ref").unwrap();
        assert_eq!(reference.get_text(), Some("sdk-framework-1.0-x86_64.pkg"));
    }

    #[test]
    fn test_home_folder_domains() {
        let ctx = context();
        let base = PackageBase::new("sdk", "1.0", "SDK");
        let files = BTreeMap::new();
        let empty = BTreeSet::new();
        let doc = DistributionXml::new(&ctx, &base, Vec::new(), PackageType::Devel, &files, &empty)
            .with_home_folder(true)
            .to_element()
            .unwrap();
        let domains = doc.find("domains").unwrap();
        assert!(doc.find("choice").is_none());
        assert_eq!(domains.attribute("enable_currentUserHome"), Some("true"));
        assert_eq!(domains.attribute("enable_localSystem"), Some("false"));
    }
}
