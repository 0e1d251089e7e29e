// src/packager/xml.rs

//! Minimal XML element tree for installer documents
//!
//! WiX sources, `Distribution.xml` and PackageMaker documents are built as
//! [`Element`] trees and serialized with quick-xml. Attribute values and
//! text are escaped on output.

use crate::error::{Error, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Builder form of [`set`](Self::set)
    pub fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an attribute, replacing any previous value
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(existing) => existing.1 = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Append a child and return it for further filling
    pub fn push(&mut self, child: Element) -> &mut Element {
        let idx = self.children.len();
        self.children.push(child);
        &mut self.children[idx]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First direct child with the given tag
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Every descendant (depth-first) with the given tag
    pub fn descendants<'a>(&'a self, name: &'a str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            found.extend(child.descendants(name));
        }
        found
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attributes {
            start.push_attribute((k.as_str(), v.as_str()));
        }

        if self.children.is_empty() && self.text.is_none() {
            writer.write_event(Event::Empty(start)).map_err(xml_error)?;
            return Ok(());
        }

        writer.write_event(Event::Start(start)).map_err(xml_error)?;
        if let Some(text) = &self.text {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(xml_error)?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(xml_error)?;
        Ok(())
    }

    /// Serialize as an indented UTF-8 document with an XML declaration
    pub fn render(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_error)?;
        self.write_to(&mut writer)?;
        let mut out = String::from_utf8(writer.into_inner()).map_err(|e| Error::Xml(e.to_string()))?;
        out.push('\n');
        Ok(out)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render()?)?;
        Ok(())
    }
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::Xml(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_nested() {
        let mut root = Element::new("Wix").attr("xmlns", "http://schemas.microsoft.com/wix/2006/wi");
        let module = root.push(Element::new("Module").attr("Id", "foo"));
        module.push(Element::new("Directory").attr("Id", "TARGETDIR"));
        let xml = root.render().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<Module Id=\"foo\">"));
        assert!(xml.contains("<Directory Id=\"TARGETDIR\"/>"));
    }

    #[test]
    fn test_escaping() {
        let root = Element::new("title").attr("a", "x < y & \"z\"").text("Tom & Jerry");
        let xml = root.render().unwrap();
        assert!(xml.contains("Tom &amp; Jerry"));
        assert!(xml.contains("x &lt; y &amp; &quot;z&quot;"));
    }

    #[test]
    fn test_set_replaces() {
        let mut e = Element::new("choice").attr("id", "a");
        e.set("id", "b");
        e.set("start_selected", "false");
        assert_eq!(e.attribute("id"), Some("b"));
        assert_eq!(e.attribute("start_selected"), Some("false"));
    }

    #[test]
    fn test_descendants() {
        let root = Element::new("a")
            .child(Element::new("b").child(Element::new("c")))
            .child(Element::new("c"));
        assert_eq!(root.descendants("c").len(), 2);
        assert!(root.find("b").is_some());
    }
}
