//! Mutable XML element tree for editing package parts.
//!
//! Slide editing needs to remove shapes, rewrite text bodies and graft new
//! table frames into the shape tree, which is awkward to do on a pure event
//! stream. This module builds a small owned tree from quick-xml events and
//! writes it back out. Element and attribute names keep their namespace
//! prefixes verbatim (`p:sp`, `r:id`) so documents round-trip unchanged.

use crate::error::{Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// A node in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An element with its attributes and children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    /// Qualified name, e.g. `a:p`
    pub name: String,
    /// Attributes in document order, values unescaped
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

/// Strip a namespace prefix from a qualified name.
pub fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

impl XmlElement {
    /// Create an element with no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder: add an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder: add a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Builder: add a text node.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Local part of the element name.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Check the element's local name.
    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    /// Attribute by exact qualified name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute by local name, ignoring any prefix.
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| local_name(k) == local)
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace an attribute.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Append a child element.
    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Iterate over child elements.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Iterate mutably over child elements.
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element with the given local name.
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(local))
    }

    /// First child element with the given local name, mutably.
    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.is(local))
    }

    /// Depth-first search for the first descendant with the given local name.
    pub fn find(&self, local: &str) -> Option<&XmlElement> {
        for child in self.elements() {
            if child.is(local) {
                return Some(child);
            }
            if let Some(found) = child.find(local) {
                return Some(found);
            }
        }
        None
    }

    /// Depth-first search, mutably.
    pub fn find_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        for child in self.elements_mut() {
            if child.is(local) {
                return Some(child);
            }
            if let Some(found) = child.find_mut(local) {
                return Some(found);
            }
        }
        None
    }

    /// Collect every descendant with the given local name.
    pub fn find_all<'a>(&'a self, local: &str, out: &mut Vec<&'a XmlElement>) {
        for child in self.elements() {
            if child.is(local) {
                out.push(child);
            }
            child.find_all(local, out);
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Keep only the child elements matching the predicate; text nodes are kept.
    pub fn retain_elements(&mut self, mut keep: impl FnMut(&XmlElement) -> bool) {
        self.children.retain(|n| match n {
            XmlNode::Element(e) => keep(e),
            XmlNode::Text(_) => true,
        });
    }

    /// Remove and return the child element at the given element index.
    pub fn remove_element(&mut self, element_index: usize) -> Option<XmlElement> {
        let pos = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n, XmlNode::Element(_)))
            .nth(element_index)
            .map(|(i, _)| i)?;
        match self.children.remove(pos) {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        }
    }

    /// Insert a child element before the first child with the given local name,
    /// or append when there is none.
    pub fn insert_before(&mut self, local: &str, child: XmlElement) {
        let pos = self
            .children
            .iter()
            .position(|n| matches!(n, XmlNode::Element(e) if e.is(local)));
        match pos {
            Some(pos) => self.children.insert(pos, XmlNode::Element(child)),
            None => self.push(child),
        }
    }
}

/// A parsed XML part.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: XmlElement,
    declaration: bool,
}

impl XmlDocument {
    /// Wrap a root element, emitting an XML declaration on output.
    pub fn new(root: XmlElement) -> Self {
        Self {
            root,
            declaration: true,
        }
    }

    /// Parse XML text into a tree.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut declaration = false;

        loop {
            match reader.read_event() {
                Ok(Event::Decl(_)) => declaration = true,
                Ok(Event::Start(ref e)) => stack.push(element_from_start(e)?),
                Ok(Event::Empty(ref e)) => {
                    let element = element_from_start(e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::XmlParse("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = e.unescape().map_err(|e| Error::XmlParse(e.to_string()))?;
                        if !text.is_empty() {
                            parent.children.push(XmlNode::Text(text.into_owned()));
                        }
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        parent.children.push(XmlNode::Text(text));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::XmlParse(e.to_string())),
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::XmlParse("unexpected end of document".to_string()));
        }
        let root = root.ok_or_else(|| Error::XmlParse("document has no root".to_string()))?;
        Ok(Self { root, declaration })
    }

    /// Serialize the tree back to XML text.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        if self.declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
                .map_err(|e| Error::XmlWrite(e.to_string()))?;
            writer.get_mut().extend_from_slice(b"\r\n");
        }
        write_element(&mut writer, &self.root)?;
        String::from_utf8(writer.into_inner()).map_err(|e| Error::XmlWrite(e.to_string()))
    }
}

fn element_from_start(e: &BytesStart<'_>) -> Result<XmlElement> {
    let mut element = XmlElement::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::XmlParse(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.push(element),
        None => {
            if root.is_some() {
                return Err(Error::XmlParse("multiple root elements".to_string()));
            }
            *root = Some(element);
        }
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| Error::XmlWrite(e.to_string()));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| Error::XmlWrite(e.to_string()))?;
    for child in &element.children {
        match child {
            XmlNode::Element(e) => write_element(writer, e)?,
            XmlNode::Text(t) => writer
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(|e| Error::XmlWrite(e.to_string()))?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| Error::XmlWrite(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://a" xmlns:p="http://p"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>Tom &amp; Jerry</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#;

    #[test]
    fn test_parse_and_navigate() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.root.name, "p:sld");
        assert_eq!(doc.root.attr("xmlns:a"), Some("http://a"));
        let sp = doc.root.find("sp").unwrap();
        assert_eq!(sp.text(), "Tom & Jerry");
        assert!(doc.root.find("graphicFrame").is_none());
    }

    #[test]
    fn test_serialization_escapes_text() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let out = doc.to_xml().unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        assert!(out.contains("<a:t>Tom &amp; Jerry</a:t>"));
        let reparsed = XmlDocument::parse(&out).unwrap();
        assert_eq!(reparsed.root, doc.root);
    }

    #[test]
    fn test_empty_elements_stay_self_closing() {
        let root = XmlElement::new("a:bodyPr").with_child(XmlElement::new("a:normAutofit"));
        let out = XmlDocument::new(root).to_xml().unwrap();
        assert!(out.ends_with("<a:bodyPr><a:normAutofit/></a:bodyPr>"));
    }

    #[test]
    fn test_insert_and_remove() {
        let mut tree = XmlElement::new("p:spTree")
            .with_child(XmlElement::new("p:nvGrpSpPr"))
            .with_child(XmlElement::new("p:extLst"));
        tree.insert_before("extLst", XmlElement::new("p:sp"));
        let names: Vec<_> = tree.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["p:nvGrpSpPr", "p:sp", "p:extLst"]);

        let removed = tree.remove_element(1).unwrap();
        assert_eq!(removed.name, "p:sp");
        assert_eq!(tree.elements().count(), 2);
    }

    #[test]
    fn test_rejects_unbalanced_markup() {
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(XmlDocument::parse("").is_err());
    }
}
