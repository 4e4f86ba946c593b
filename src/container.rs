//! ZIP package abstraction for OOXML documents.
//!
//! A [`Package`] holds every part of the archive in memory so parts can be
//! read, rewritten and added before the whole package is written back out.

use crate::error::{Error, Result};
use crate::xml::{XmlDocument, XmlElement};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;

/// Relationship type for external hyperlinks.
pub const REL_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

/// Relationship type for slides.
pub const REL_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";

/// Relationship type for notes slides.
pub const REL_NOTES_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";

/// Content type of the presentation main part.
pub const PRESENTATION_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";

/// Content type of a slide part.
pub const SLIDE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

const RELS_NAMESPACE: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// A relationship entry from a .rels file.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative or absolute) or URL
    pub target: String,
    /// Whether the target is external
    pub external: bool,
}

/// Ordered collection of relationships parsed from a .rels file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Relationships {
    entries: Vec<Relationship>,
}

impl Relationships {
    /// Create a new empty relationships collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a relationship by ID.
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.id == id)
    }

    /// Get relationships by type.
    pub fn get_by_type(&self, rel_type: &str) -> Vec<&Relationship> {
        self.entries.iter().filter(|r| r.rel_type == rel_type).collect()
    }

    /// Iterate in file order.
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.entries.iter()
    }

    /// Number of relationships.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a relationship, replacing any entry with the same ID.
    pub fn add(&mut self, rel: Relationship) {
        self.entries.retain(|r| r.id != rel.id);
        self.entries.push(rel);
    }

    /// Remove every relationship of the given type.
    pub fn remove_type(&mut self, rel_type: &str) {
        self.entries.retain(|r| r.rel_type != rel_type);
    }

    /// Next unused `rIdN` identifier.
    pub fn next_id(&self) -> String {
        let max = self
            .entries
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }

    /// Register an internal relationship and return its ID.
    pub fn add_internal(&mut self, rel_type: &str, target: &str) -> String {
        let id = self.next_id();
        self.add(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external: false,
        });
        id
    }

    /// Return the ID of an external hyperlink to `url`, creating it when needed.
    pub fn add_external_hyperlink(&mut self, url: &str) -> String {
        if let Some(existing) = self
            .entries
            .iter()
            .find(|r| r.rel_type == REL_HYPERLINK && r.external && r.target == url)
        {
            return existing.id.clone();
        }
        let id = self.next_id();
        self.add(Relationship {
            id: id.clone(),
            rel_type: REL_HYPERLINK.to_string(),
            target: url.to_string(),
            external: true,
        });
        id
    }

    /// Parse a .rels part.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut rels = Relationships::new();
        if xml.trim().is_empty() {
            return Ok(rels);
        }

        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Empty(e))
                | Ok(quick_xml::events::Event::Start(e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let mut id = String::new();
                    let mut rel_type = String::new();
                    let mut target = String::new();
                    let mut external = false;

                    for attr in e.attributes().flatten() {
                        let value = attr
                            .unescape_value()
                            .map(|v| v.into_owned())
                            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
                        match attr.key.as_ref() {
                            b"Id" => id = value,
                            b"Type" => rel_type = value,
                            b"Target" => target = value,
                            b"TargetMode" => external = value.eq_ignore_ascii_case("external"),
                            _ => {}
                        }
                    }

                    if !id.is_empty() {
                        rels.entries.push(Relationship {
                            id,
                            rel_type,
                            target,
                            external,
                        });
                    }
                }
                Ok(quick_xml::events::Event::Eof) => break,
                Err(e) => return Err(Error::XmlParse(e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Serialize to .rels XML.
    pub fn to_xml(&self) -> Result<String> {
        let mut root = XmlElement::new("Relationships").with_attr("xmlns", RELS_NAMESPACE);
        for rel in &self.entries {
            let mut el = XmlElement::new("Relationship")
                .with_attr("Id", rel.id.as_str())
                .with_attr("Type", rel.rel_type.as_str())
                .with_attr("Target", rel.target.as_str());
            if rel.external {
                el.set_attr("TargetMode", "External");
            }
            root.push(el);
        }
        XmlDocument::new(root).to_xml()
    }
}

/// Decode XML bytes handling different encodings (UTF-8, UTF-16 LE/BE).
///
/// OOXML files are typically UTF-8 encoded, but templates saved by older
/// tools occasionally use UTF-16.
pub fn decode_xml_bytes(bytes: &[u8]) -> Result<String> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8(bytes[3..].to_vec())
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)));
    }

    if bytes.starts_with(&[0xFF, 0xFE]) {
        let content = decode_utf16(&bytes[2..], u16::from_le_bytes)?;
        return Ok(fix_xml_encoding_declaration(&content));
    }

    if bytes.starts_with(&[0xFE, 0xFF]) {
        let content = decode_utf16(&bytes[2..], u16::from_be_bytes)?;
        return Ok(fix_xml_encoding_declaration(&content));
    }

    match String::from_utf8(bytes.to_vec()) {
        Ok(s) => Ok(s),
        Err(_) => {
            // ASCII markup in UTF-16 leaves a zero in every other byte
            if bytes.len() >= 4 && bytes[1] == 0 && bytes[3] == 0 {
                decode_utf16(bytes, u16::from_le_bytes).map(|s| fix_xml_encoding_declaration(&s))
            } else if bytes.len() >= 4 && bytes[0] == 0 && bytes[2] == 0 {
                decode_utf16(bytes, u16::from_be_bytes).map(|s| fix_xml_encoding_declaration(&s))
            } else {
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Result<String> {
    let units = bytes.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Rewrite a UTF-16 encoding declaration once the text is held as UTF-8.
fn fix_xml_encoding_declaration(content: &str) -> String {
    if let Some(end) = content.find("?>") {
        let (decl, rest) = content.split_at(end);
        if decl.starts_with("<?xml") {
            let fixed = decl
                .replace("UTF-16", "UTF-8")
                .replace("utf-16", "UTF-8");
            return format!("{}{}", fixed, rest);
        }
    }
    content.to_string()
}

/// In-memory OOXML package.
pub struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    /// Open a package from a file path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use researchdeck::container::Package;
    ///
    /// let package = Package::open("template.pptx")?;
    /// assert!(package.exists("ppt/presentation.xml"));
    /// # Ok::<(), researchdeck::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Read every part of a ZIP archive held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes)?;
            parts.push((file.name().to_string(), bytes));
        }
        Ok(Self { parts })
    }

    /// Create an empty package.
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Check that the package declares a presentation main part.
    pub fn verify_presentation(&self) -> Result<()> {
        let types = self
            .read_xml(CONTENT_TYPES_PART)
            .map_err(|_| Error::UnsupportedFormat("missing [Content_Types].xml".to_string()))?;
        if types.contains(PRESENTATION_CONTENT_TYPE) {
            Ok(())
        } else {
            Err(Error::UnsupportedFormat(
                "package is not a PowerPoint presentation".to_string(),
            ))
        }
    }

    /// Read an XML part as a string.
    pub fn read_xml(&self, path: &str) -> Result<String> {
        decode_xml_bytes(self.read_binary(path)?)
    }

    /// Read and parse an XML part into a tree.
    pub fn read_tree(&self, path: &str) -> Result<XmlDocument> {
        XmlDocument::parse(&self.read_xml(path)?)
    }

    /// Read a part's raw bytes.
    pub fn read_binary(&self, path: &str) -> Result<&[u8]> {
        self.parts
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, data)| data.as_slice())
            .ok_or_else(|| Error::MissingComponent(path.to_string()))
    }

    /// Write (or add) a part.
    pub fn write_binary(&mut self, path: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|(name, _)| name == path) {
            Some(slot) => slot.1 = data,
            None => self.parts.push((path.to_string(), data)),
        }
    }

    /// Write (or add) an XML part.
    pub fn write_xml(&mut self, path: &str, xml: &str) {
        self.write_binary(path, xml.as_bytes().to_vec());
    }

    /// Serialize a tree into a part.
    pub fn write_tree(&mut self, path: &str, doc: &XmlDocument) -> Result<()> {
        let xml = doc.to_xml()?;
        self.write_xml(path, &xml);
        Ok(())
    }

    /// Check if a part exists.
    pub fn exists(&self, path: &str) -> bool {
        self.parts.iter().any(|(name, _)| name == path)
    }

    /// List all part names in archive order.
    pub fn list_parts(&self) -> Vec<&str> {
        self.parts.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// List part names matching a prefix.
    pub fn list_parts_with_prefix(&self, prefix: &str) -> Vec<&str> {
        self.parts
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|n| n.starts_with(prefix))
            .collect()
    }

    /// Path of the .rels part belonging to `part_path`.
    pub fn rels_path(part_path: &str) -> String {
        if part_path.is_empty() || part_path == "/" {
            return "_rels/.rels".to_string();
        }
        match part_path.rfind('/') {
            Some(slash) => format!(
                "{}/_rels/{}.rels",
                &part_path[..slash],
                &part_path[slash + 1..]
            ),
            None => format!("_rels/{}.rels", part_path),
        }
    }

    /// Read the relationships of a part; a missing .rels part yields an empty set.
    pub fn read_relationships(&self, part_path: &str) -> Result<Relationships> {
        match self.read_xml(&Self::rels_path(part_path)) {
            Ok(xml) => Relationships::parse(&xml),
            Err(Error::MissingComponent(_)) => Ok(Relationships::new()),
            Err(e) => Err(e),
        }
    }

    /// Write the relationships of a part.
    pub fn write_relationships(&mut self, part_path: &str, rels: &Relationships) -> Result<()> {
        let xml = rels.to_xml()?;
        self.write_xml(&Self::rels_path(part_path), &xml);
        Ok(())
    }

    /// Register a content type override for a part in `[Content_Types].xml`.
    pub fn add_content_type_override(&mut self, part_path: &str, content_type: &str) -> Result<()> {
        let mut doc = self.read_tree(CONTENT_TYPES_PART)?;
        let part_name = format!("/{}", part_path.trim_start_matches('/'));
        let known = doc
            .root
            .elements()
            .any(|e| e.is("Override") && e.attr("PartName") == Some(part_name.as_str()));
        if !known {
            doc.root.push(
                XmlElement::new("Override")
                    .with_attr("PartName", part_name)
                    .with_attr("ContentType", content_type),
            );
            self.write_tree(CONTENT_TYPES_PART, &doc)?;
        }
        Ok(())
    }

    /// Write the package as a ZIP archive.
    ///
    /// `[Content_Types].xml` is always written first, as Office expects.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let ordered = self
            .parts
            .iter()
            .filter(|(name, _)| name == CONTENT_TYPES_PART)
            .chain(self.parts.iter().filter(|(name, _)| name != CONTENT_TYPES_PART));

        for (name, data) in ordered {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(data)?;
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }

    /// Resolve a relationship target against the part that owns it.
    pub fn resolve_path(base: &str, relative: &str) -> String {
        if let Some(stripped) = relative.strip_prefix('/') {
            return stripped.to_string();
        }

        let mut segments: Vec<&str> = match base.rfind('/') {
            Some(slash) => base[..slash].split('/').collect(),
            None => Vec::new(),
        };
        for component in relative.split('/') {
            match component {
                ".." => {
                    segments.pop();
                }
                "." | "" => {}
                other => segments.push(other),
            }
        }
        segments.join("/")
    }
}

impl Default for Package {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("parts", &self.parts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        assert_eq!(
            Package::resolve_path("ppt/slides/slide1.xml", "../media/image1.png"),
            "ppt/media/image1.png"
        );
        assert_eq!(
            Package::resolve_path("ppt/presentation.xml", "slides/slide2.xml"),
            "ppt/slides/slide2.xml"
        );
        assert_eq!(
            Package::resolve_path("ppt/slides/slide1.xml", "/ppt/media/image1.png"),
            "ppt/media/image1.png"
        );
    }

    #[test]
    fn test_rels_path() {
        assert_eq!(
            Package::rels_path("ppt/slides/slide1.xml"),
            "ppt/slides/_rels/slide1.xml.rels"
        );
        assert_eq!(Package::rels_path(""), "_rels/.rels");
    }

    #[test]
    fn test_relationships_roundtrip() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://x/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/></Relationships>"#;
        let rels = Relationships::parse(xml).unwrap();
        assert_eq!(rels.len(), 2);
        let link = rels.get("rId3").unwrap();
        assert!(link.external);
        assert_eq!(link.target, "https://example.com/?a=1&b=2");

        let reparsed = Relationships::parse(&rels.to_xml().unwrap()).unwrap();
        assert_eq!(reparsed, rels);
    }

    #[test]
    fn test_hyperlinks_are_deduplicated() {
        let mut rels = Relationships::new();
        rels.add_internal("http://x/slideLayout", "../slideLayouts/slideLayout1.xml");
        let first = rels.add_external_hyperlink("https://sec.gov/filing");
        let again = rels.add_external_hyperlink("https://sec.gov/filing");
        let other = rels.add_external_hyperlink("https://example.com");
        assert_eq!(first, "rId2");
        assert_eq!(first, again);
        assert_eq!(other, "rId3");
        assert_eq!(rels.get_by_type(REL_HYPERLINK).len(), 2);
    }

    #[test]
    fn test_package_roundtrip() {
        let mut package = Package::new();
        package.write_xml(
            "[Content_Types].xml",
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
        );
        package.write_xml("ppt/slides/slide1.xml", "<p:sld/>");
        package
            .add_content_type_override("ppt/slides/slide1.xml", SLIDE_CONTENT_TYPE)
            .unwrap();
        package
            .add_content_type_override("ppt/slides/slide1.xml", SLIDE_CONTENT_TYPE)
            .unwrap();

        let bytes = package.to_bytes().unwrap();
        let reopened = Package::from_bytes(&bytes).unwrap();
        assert_eq!(reopened.list_parts()[0], "[Content_Types].xml");
        assert_eq!(reopened.read_xml("ppt/slides/slide1.xml").unwrap(), "<p:sld/>");
        let types = reopened.read_xml("[Content_Types].xml").unwrap();
        assert_eq!(types.matches("/ppt/slides/slide1.xml").count(), 1);
        assert!(reopened.verify_presentation().is_err());
    }

    #[test]
    fn test_missing_part_reports_component() {
        let package = Package::new();
        assert!(matches!(
            package.read_xml("ppt/presentation.xml"),
            Err(Error::MissingComponent(_))
        ));
        assert!(package.read_relationships("ppt/presentation.xml").unwrap().is_empty());
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            Package::from_bytes(b"plain text"),
            Err(Error::ZipArchive(_))
        ));
    }

    #[test]
    fn test_utf16_decoding() {
        let utf16_le = b"\xFF\xFE<\0?\0x\0m\0l\0>\0";
        assert_eq!(decode_xml_bytes(utf16_le).unwrap(), "<?xml>");

        let utf16_be = b"\xFE\xFF\0<\0?\0x\0m\0l\0>";
        assert_eq!(decode_xml_bytes(utf16_be).unwrap(), "<?xml>");

        let utf8_bom = b"\xEF\xBB\xBF<?xml>";
        assert_eq!(decode_xml_bytes(utf8_bom).unwrap(), "<?xml>");
    }
}
