// src/packager/wix/merge_module.rs

//! Merge module and fragment sources for one package

use super::{IdAllocator, WIX_NAMESPACE, format_id, new_guid, tool_path};
use crate::config::PackagingConfig;
use crate::error::Result;
use crate::package::{PackageBase, PackageType, display_description, display_name, upgrade_uuid};
use crate::packager::xml::Element;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory tree of a flat file list
#[derive(Debug, Default)]
struct DirNode {
    dirs: BTreeMap<String, DirNode>,
    files: Vec<String>,
}

impl DirNode {
    fn from_files(files: &[String]) -> Self {
        let mut root = DirNode::default();
        for file in files {
            let mut node = &mut root;
            let mut parts: Vec<&str> = file.split('/').filter(|p| !p.is_empty()).collect();
            if parts.pop().is_none() {
                continue;
            }
            for part in parts {
                node = node.dirs.entry(part.to_string()).or_default();
            }
            node.files.push(file.clone());
        }
        root
    }
}

/// WiX source packaging one package's files
///
/// Every path component becomes a `Directory`, every file a `Component`
/// holding one `File`. Identifiers derive from the relative path, so two
/// builds of the same file list produce the same ids.
pub struct MergeModule<'a> {
    config: &'a PackagingConfig,
    base: &'a PackageBase,
    mode: PackageType,
    files: &'a [String],
    source_root: PathBuf,
    fragment: bool,
}

impl<'a> MergeModule<'a> {
    pub fn new(
        config: &'a PackagingConfig,
        base: &'a PackageBase,
        mode: PackageType,
        files: &'a [String],
    ) -> Self {
        Self {
            config,
            base,
            mode,
            files,
            source_root: config.prefix.clone(),
            fragment: base.wix_use_fragment,
        }
    }

    /// Read file contents from `root` instead of the install prefix
    pub fn with_source_root(mut self, root: &Path) -> Self {
        self.source_root = root.to_path_buf();
        self
    }

    pub fn with_fragment(mut self, fragment: bool) -> Self {
        self.fragment = fragment;
        self
    }

    /// Identifier of the module, also used by `Merge`/`MergeRef`
    pub fn id(&self) -> String {
        format_id(&display_name(self.base, self.mode), false)
    }

    /// Identifier of the component group a fragment exposes
    pub fn component_group_id(&self) -> String {
        format!("CG_{}", format_id(&display_name(self.base, self.mode), true))
    }

    pub fn is_fragment(&self) -> bool {
        self.fragment
    }

    pub fn to_element(&self) -> Element {
        let mut ids = IdAllocator::new();
        let mut components = Vec::new();
        let tree = DirNode::from_files(self.files);

        let mut wix = Element::new("Wix").attr("xmlns", WIX_NAMESPACE);
        if self.fragment {
            let mut dir_ref = Element::new("DirectoryRef").attr("Id", "INSTALLDIR");
            self.fill_dir(&mut dir_ref, &tree, "", &mut ids, &mut components);
            wix.push(Element::new("Fragment")).push(dir_ref);

            let mut group = Element::new("ComponentGroup").attr("Id", self.component_group_id());
            for id in components {
                group.push(Element::new("ComponentRef").attr("Id", id));
            }
            wix.push(Element::new("Fragment")).push(group);
        } else {
            let package_id = upgrade_uuid(self.base, self.mode)
                .map(|u| u.to_uppercase())
                .unwrap_or_else(new_guid);
            let module = wix.push(
                Element::new("Module")
                    .attr("Id", self.id())
                    .attr("Version", self.base.version.clone())
                    .attr("Language", "1033"),
            );
            module.push(
                Element::new("Package")
                    .attr("Id", package_id)
                    .attr("Description", display_description(self.base, self.mode))
                    .attr("Comments", self.base.description())
                    .attr("Manufacturer", self.base.vendor())
                    .attr("InstallerVersion", "200"),
            );
            let mut target = Element::new("Directory")
                .attr("Id", "TARGETDIR")
                .attr("Name", "SourceDir");
            self.fill_dir(&mut target, &tree, "", &mut ids, &mut components);
            module.push(target);
        }
        wix
    }

    fn fill_dir(
        &self,
        parent: &mut Element,
        node: &DirNode,
        path: &str,
        ids: &mut IdAllocator,
        components: &mut Vec<String>,
    ) {
        for file in &node.files {
            let name = file.rsplit('/').next().unwrap_or(file);
            let component_id = ids.id(file, false);
            let source = tool_path(self.config, &self.source_root.join(file));
            let file_id = ids.id(&format!("file/{}", file), true);
            parent.push(
                Element::new("Component")
                    .attr("Id", component_id.clone())
                    .attr("Guid", new_guid())
                    .child(
                        Element::new("File")
                            .attr("Id", file_id)
                            .attr("Name", name)
                            .attr("Source", source),
                    ),
            );
            components.push(component_id);
        }
        for (name, child) in &node.dirs {
            let dir_path = if path.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", path, name)
            };
            let mut dir = Element::new("Directory")
                .attr("Id", ids.id(&format!("dir/{}", dir_path), false))
                .attr("Name", name.clone());
            self.fill_dir(&mut dir, child, &dir_path, ids, components);
            parent.push(dir);
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        self.to_element().write(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Architecture, Distro, Platform};

    fn config() -> PackagingConfig {
        let mut c = PackagingConfig::new("/opt/sdk", Platform::Windows, Architecture::X86_64, Distro::Windows);
        c.platform = Platform::Linux;
        c
    }

    fn files() -> Vec<String> {
        vec![
            "bin/libglib-2.0-0.dll".to_string(),
            "bin/gst-launch-1.0.exe".to_string(),
            "lib/gstreamer-1.0/libgstcoreelements.dll".to_string(),
        ]
    }

    #[test]
    fn test_module_tree() {
        let config = config();
        let mut base = PackageBase::new("gstreamer-core", "1.22.0", "GStreamer core");
        base.vendor = Some("GStreamer Project".to_string());
        let files = files();
        let module = MergeModule::new(&config, &base, PackageType::Runtime, &files).to_element();

        let m = module.find("Module").unwrap();
        assert_eq!(m.attribute("Id"), Some("gstreamer_core"));
        assert_eq!(m.find("Package").unwrap().attribute("Manufacturer"), Some("GStreamer Project"));

        let target = m.find("Directory").unwrap();
        assert_eq!(target.attribute("Id"), Some("TARGETDIR"));
        let dirs: Vec<_> = target.children().iter().filter_map(|d| d.attribute("Name")).collect();
        assert_eq!(dirs, vec!["bin", "lib"]);

        let files = module.descendants("File");
        assert_eq!(files.len(), 3);
        let plugin = files
            .iter()
            .find(|f| f.attribute("Name") == Some("libgstcoreelements.dll"))
            .unwrap();
        assert_eq!(
            plugin.attribute("Source"),
            Some("z:\\opt\\sdk\\lib\\gstreamer-1.0\\libgstcoreelements.dll")
        );
        assert_eq!(module.descendants("Component").len(), 3);
    }

    #[test]
    fn test_ids_are_unique() {
        let config = config();
        let base = PackageBase::new("p", "1.0", "P");
        let files = vec!["a/b-c".to_string(), "a/b_c".to_string(), "a_b/c".to_string()];
        let module = MergeModule::new(&config, &base, PackageType::Runtime, &files).to_element();
        let components = module.descendants("Component");
        let dirs = module.descendants("Directory");
        let mut ids: Vec<&str> = components
            .iter()
            .chain(dirs.iter())
            .filter_map(|e| e.attribute("Id"))
            .collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_fragment_variant() {
        let config = config();
        let mut base = PackageBase::new("gstreamer-core", "1.22.0", "GStreamer core");
        base.wix_use_fragment = true;
        let files = files();
        let module = MergeModule::new(&config, &base, PackageType::Devel, &files)
            .with_source_root(Path::new("/tmp/stripped"));
        assert!(module.is_fragment());
        assert_eq!(module.component_group_id(), "CG_gstreamer_core_devel");

        let doc = module.to_element();
        assert!(doc.find("Module").is_none());
        assert_eq!(doc.descendants("DirectoryRef")[0].attribute("Id"), Some("INSTALLDIR"));
        assert_eq!(doc.descendants("ComponentRef").len(), 3);
        assert!(
            doc.descendants("File")
                .iter()
                .all(|f| f.attribute("Source").unwrap().starts_with("z:\\tmp\\stripped"))
        );
    }
}
