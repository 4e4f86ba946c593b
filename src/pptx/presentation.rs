//! Presentation editing: slides, token shapes, text frames and tables.

use super::{table, text, Bbox, DEFAULT_SLIDE_HEIGHT, DEFAULT_SLIDE_WIDTH, EMU_PER_INCH};
use crate::container::{
    Package, Relationships, REL_NOTES_SLIDE, REL_SLIDE, SLIDE_CONTENT_TYPE,
};
use crate::error::{Error, Result};
use crate::model::TextBlock;
use crate::xml::{XmlDocument, XmlElement};
use std::path::Path;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const REL_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Location of a text shape: slide index plus element indices from `p:spTree`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeRef {
    pub slide: usize,
    path: Vec<usize>,
}

#[derive(Debug, Clone)]
struct Slide {
    part: String,
    id: u32,
    rel_id: String,
    doc: XmlDocument,
    rels: Relationships,
}

impl Slide {
    fn sp_tree(&self) -> Option<&XmlElement> {
        self.doc.root.child("cSld")?.child("spTree")
    }

    fn sp_tree_mut(&mut self) -> Result<&mut XmlElement> {
        let part = self.part.clone();
        self.doc
            .root
            .child_mut("cSld")
            .and_then(|c| c.child_mut("spTree"))
            .ok_or_else(|| Error::Template(format!("{} has no shape tree", part)))
    }

    fn next_shape_id(&self) -> u32 {
        let mut props = Vec::new();
        self.doc.root.find_all("cNvPr", &mut props);
        props
            .iter()
            .filter_map(|e| e.attr("id"))
            .filter_map(|id| id.parse::<u32>().ok())
            .max()
            .unwrap_or(1)
            + 1
    }
}

/// Walk a shape tree collecting every `p:sp` that has a text body.
fn collect_text_shapes(tree: &XmlElement, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    for (i, child) in tree.elements().enumerate() {
        prefix.push(i);
        if child.is("sp") && child.child("txBody").is_some() {
            out.push(prefix.clone());
        } else if child.is("grpSp") {
            collect_text_shapes(child, prefix, out);
        }
        prefix.pop();
    }
}

fn element_at<'a>(root: &'a XmlElement, path: &[usize]) -> Option<&'a XmlElement> {
    path.iter()
        .try_fold(root, |node, &i| node.elements().nth(i))
}

fn element_at_mut<'a>(root: &'a mut XmlElement, path: &[usize]) -> Option<&'a mut XmlElement> {
    let mut node = root;
    for &i in path {
        node = node.elements_mut().nth(i)?;
    }
    Some(node)
}

fn parse_emu(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.parse::<i64>().ok())
}

fn element_bbox(sp: &XmlElement) -> Option<Bbox> {
    let xfrm = sp.child("spPr")?.child("xfrm")?;
    let off = xfrm.child("off")?;
    let ext = xfrm.child("ext")?;
    Some(Bbox {
        left: parse_emu(off.attr("x"))?,
        top: parse_emu(off.attr("y"))?,
        width: parse_emu(ext.attr("cx"))?,
        height: parse_emu(ext.attr("cy"))?,
    })
}

/// An editable PowerPoint presentation.
pub struct Presentation {
    package: Package,
    doc: XmlDocument,
    rels: Relationships,
    slides: Vec<Slide>,
    slide_width: i64,
    slide_height: i64,
}

impl Presentation {
    /// Open a presentation file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_package(Package::open(path)?)
    }

    /// Load a presentation from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_package(Package::from_bytes(data)?)
    }

    /// Load a presentation from a package.
    pub fn from_package(package: Package) -> Result<Self> {
        package.verify_presentation()?;
        let doc = package.read_tree(PRESENTATION_PART)?;
        let rels = package.read_relationships(PRESENTATION_PART)?;

        let size = doc.root.child("sldSz");
        let slide_width = parse_emu(size.and_then(|s| s.attr("cx"))).unwrap_or(DEFAULT_SLIDE_WIDTH);
        let slide_height =
            parse_emu(size.and_then(|s| s.attr("cy"))).unwrap_or(DEFAULT_SLIDE_HEIGHT);

        let mut slides = Vec::new();
        if let Some(list) = doc.root.child("sldIdLst") {
            for entry in list.elements().filter(|e| e.is("sldId")) {
                let id = entry
                    .attr("id")
                    .and_then(|v| v.parse::<u32>().ok())
                    .ok_or_else(|| Error::Template("slide entry without id".to_string()))?;
                // r:id, whatever the relationship namespace prefix is
                let rel_id = entry
                    .attributes
                    .iter()
                    .find(|(k, _)| k.as_str() != "id" && crate::xml::local_name(k) == "id")
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| Error::Template(format!("slide {} has no relationship", id)))?;
                let target = rels
                    .get(&rel_id)
                    .ok_or_else(|| Error::MissingComponent(format!("relationship {}", rel_id)))?;
                let part = Package::resolve_path(PRESENTATION_PART, &target.target);
                let slide_doc = package.read_tree(&part)?;
                let slide_rels = package.read_relationships(&part)?;
                slides.push(Slide {
                    part,
                    id,
                    rel_id,
                    doc: slide_doc,
                    rels: slide_rels,
                });
            }
        }

        tracing::debug!(slides = slides.len(), "loaded presentation");

        Ok(Self {
            package,
            doc,
            rels,
            slides,
            slide_width,
            slide_height,
        })
    }

    /// Number of slides.
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Slide size in EMU (width, height).
    pub fn slide_size(&self) -> (i64, i64) {
        (self.slide_width, self.slide_height)
    }

    /// Package part of a slide.
    pub fn slide_part(&self, index: usize) -> Option<&str> {
        self.slides.get(index).map(|s| s.part.as_str())
    }

    /// Texts of every text shape on a slide, in shape tree order.
    pub fn slide_texts(&self, index: usize) -> Vec<String> {
        let Some(slide) = self.slides.get(index) else {
            return Vec::new();
        };
        let Some(tree) = slide.sp_tree() else {
            return Vec::new();
        };
        let mut paths = Vec::new();
        collect_text_shapes(tree, &mut Vec::new(), &mut paths);
        paths
            .iter()
            .filter_map(|p| element_at(tree, p))
            .filter_map(|sp| sp.child("txBody"))
            .map(text::text_body_text)
            .collect()
    }

    /// Number of table frames on a slide.
    pub fn slide_table_count(&self, index: usize) -> usize {
        self.slides
            .get(index)
            .map(|slide| {
                let mut tables = Vec::new();
                slide.doc.root.find_all("tbl", &mut tables);
                tables.len()
            })
            .unwrap_or(0)
    }

    /// Hyperlink targets registered on a slide.
    pub fn slide_hyperlinks(&self, index: usize) -> Vec<String> {
        self.slides
            .get(index)
            .map(|s| {
                s.rels
                    .get_by_type(crate::container::REL_HYPERLINK)
                    .into_iter()
                    .map(|r| r.target.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rows of every table on a slide, as cell texts.
    pub fn slide_tables(&self, index: usize) -> Vec<Vec<Vec<String>>> {
        let Some(slide) = self.slides.get(index) else {
            return Vec::new();
        };
        let mut tables = Vec::new();
        slide.doc.root.find_all("tbl", &mut tables);
        tables
            .iter()
            .map(|tbl| {
                tbl.elements()
                    .filter(|e| e.is("tr"))
                    .map(|tr| {
                        tr.elements()
                            .filter(|e| e.is("tc"))
                            .map(|tc| tc.child("txBody").map(text::text_body_text).unwrap_or_default())
                            .collect()
                    })
                    .collect()
            })
            .collect()
    }

    fn text_shapes(&self, slide: usize) -> Vec<ShapeRef> {
        let Some(tree) = self.slides.get(slide).and_then(|s| s.sp_tree()) else {
            return Vec::new();
        };
        let mut paths = Vec::new();
        collect_text_shapes(tree, &mut Vec::new(), &mut paths);
        paths
            .into_iter()
            .map(|path| ShapeRef { slide, path })
            .collect()
    }

    /// First text shape, in slide order, whose text contains `token`.
    pub fn find_shape_with_token(&self, token: &str) -> Option<ShapeRef> {
        (0..self.slides.len()).find_map(|slide| self.find_shape_on_slide(slide, token))
    }

    /// First text shape on one slide whose text contains `token`.
    pub fn find_shape_on_slide(&self, slide: usize, token: &str) -> Option<ShapeRef> {
        self.text_shapes(slide)
            .into_iter()
            .find(|shape| self.shape_text(shape).is_some_and(|t| t.contains(token)))
    }

    /// Text of a shape's text frame.
    pub fn shape_text(&self, shape: &ShapeRef) -> Option<String> {
        let tree = self.slides.get(shape.slide)?.sp_tree()?;
        let sp = element_at(tree, &shape.path)?;
        sp.child("txBody").map(text::text_body_text)
    }

    /// Replace any of `tokens` with `value` in every text shape of the deck.
    ///
    /// Returns the number of paragraphs changed.
    pub fn replace_token_everywhere(&mut self, tokens: &[&str], value: &str) -> Result<usize> {
        let mut changed = 0;
        for slide in 0..self.slides.len() {
            changed += self.replace_tokens_on_slide(slide, tokens, value)?;
        }
        Ok(changed)
    }

    /// Replace any of `tokens` with `value` in the text shapes of one slide.
    pub fn replace_tokens_on_slide(
        &mut self,
        slide: usize,
        tokens: &[&str],
        value: &str,
    ) -> Result<usize> {
        let mut changed = 0;
        for shape in self.text_shapes(slide) {
            let tx_body = self.text_body_mut(&shape)?;
            for p in tx_body.elements_mut().filter(|e| e.is("p")) {
                for token in tokens {
                    if text::replace_in_paragraph(p, token, value) {
                        changed += 1;
                    }
                }
            }
        }
        Ok(changed)
    }

    fn text_body_mut(&mut self, shape: &ShapeRef) -> Result<&mut XmlElement> {
        let slide = self
            .slides
            .get_mut(shape.slide)
            .ok_or_else(|| Error::Template(format!("no slide {}", shape.slide)))?;
        let tree = slide.sp_tree_mut()?;
        element_at_mut(tree, &shape.path)
            .and_then(|sp| sp.child_mut("txBody"))
            .ok_or_else(|| Error::Template("shape has no text frame".to_string()))
    }

    /// Replace a shape's text with the given block.
    pub fn fill_text_frame(&mut self, shape: &ShapeRef, block: &TextBlock) -> Result<()> {
        let slide = self
            .slides
            .get_mut(shape.slide)
            .ok_or_else(|| Error::Template(format!("no slide {}", shape.slide)))?;
        if !block.links().is_empty() && slide.doc.root.attr("xmlns:r").is_none() {
            slide.doc.root.set_attr("xmlns:r", REL_NAMESPACE);
        }

        let Slide { doc, rels, .. } = slide;
        let tx_body = doc
            .root
            .child_mut("cSld")
            .and_then(|c| c.child_mut("spTree"))
            .and_then(|tree| element_at_mut(tree, &shape.path))
            .and_then(|sp| sp.child_mut("txBody"))
            .ok_or_else(|| Error::Template("shape has no text frame".to_string()))?;
        text::fill_text_body(tx_body, block, rels);
        Ok(())
    }

    /// Default table area: half-inch margins below a title band.
    pub fn default_content_bbox(&self) -> Bbox {
        let margin = EMU_PER_INCH / 2;
        let top = EMU_PER_INCH * 5 / 4;
        Bbox {
            left: margin,
            top,
            width: self.slide_width - 2 * margin,
            height: self.slide_height - top - margin,
        }
    }

    /// Bounding box of a shape from its `a:xfrm`.
    ///
    /// Shapes that inherit their position from a layout have no explicit
    /// transform; those give `None`.
    pub fn shape_bbox(&self, shape: &ShapeRef) -> Option<Bbox> {
        let tree = self.slides.get(shape.slide)?.sp_tree()?;
        element_bbox(element_at(tree, &shape.path)?)
    }

    /// Remove a shape and return its bounding box.
    ///
    /// Shapes without an explicit transform report the default content area.
    pub fn remove_shape(&mut self, shape: &ShapeRef) -> Result<Bbox> {
        let fallback = self.default_content_bbox();
        let slide = self
            .slides
            .get_mut(shape.slide)
            .ok_or_else(|| Error::Template(format!("no slide {}", shape.slide)))?;
        let tree = slide.sp_tree_mut()?;
        let (last, parent_path) = shape
            .path
            .split_last()
            .ok_or_else(|| Error::Template("empty shape path".to_string()))?;
        let parent = element_at_mut(tree, parent_path)
            .ok_or_else(|| Error::Template("shape no longer exists".to_string()))?;
        let removed = parent
            .remove_element(*last)
            .ok_or_else(|| Error::Template("shape no longer exists".to_string()))?;

        Ok(element_bbox(&removed).unwrap_or(fallback))
    }

    /// Copy a slide and insert the copy right after it. Returns the new index.
    ///
    /// Notes are not copied.
    pub fn duplicate_slide(&mut self, index: usize) -> Result<usize> {
        let source = self
            .slides
            .get(index)
            .ok_or_else(|| Error::Template(format!("no slide {}", index)))?
            .clone();

        let number = self.next_slide_number();
        let part = format!("ppt/slides/slide{}.xml", number);
        let rel_id = self
            .rels
            .add_internal(REL_SLIDE, &format!("slides/slide{}.xml", number));
        let id = self.slides.iter().map(|s| s.id).max().unwrap_or(255).max(255) + 1;

        let mut rels = source.rels.clone();
        rels.remove_type(REL_NOTES_SLIDE);

        self.package
            .add_content_type_override(&part, SLIDE_CONTENT_TYPE)?;
        self.slides.insert(
            index + 1,
            Slide {
                part,
                id,
                rel_id,
                doc: source.doc,
                rels,
            },
        );
        tracing::debug!(source = index, copy = index + 1, "duplicated slide");
        Ok(index + 1)
    }

    fn next_slide_number(&self) -> u32 {
        let from_parts = self
            .package
            .list_parts_with_prefix("ppt/slides/slide")
            .into_iter()
            .filter_map(|p| p.strip_prefix("ppt/slides/slide")?.strip_suffix(".xml"))
            .filter_map(|n| n.parse::<u32>().ok());
        let from_slides = self
            .slides
            .iter()
            .filter_map(|s| s.part.strip_prefix("ppt/slides/slide")?.strip_suffix(".xml"))
            .filter_map(|n| n.parse::<u32>().ok());
        from_parts.chain(from_slides).max().unwrap_or(0) + 1
    }

    /// Add a table frame to a slide.
    pub fn insert_table(
        &mut self,
        slide: usize,
        bbox: Bbox,
        headers: &[String],
        rows: &[Vec<String>],
    ) -> Result<()> {
        let target = self
            .slides
            .get_mut(slide)
            .ok_or_else(|| Error::Template(format!("no slide {}", slide)))?;
        let shape_id = target.next_shape_id();
        let frame = table::graphic_frame(shape_id, bbox, headers, rows);
        target.sp_tree_mut()?.insert_before("extLst", frame);
        Ok(())
    }

    /// Write edited parts back into the package.
    fn flush(&mut self) -> Result<()> {
        if let Some(list) = self.doc.root.child_mut("sldIdLst") {
            list.children.clear();
            for slide in &self.slides {
                list.push(
                    XmlElement::new("p:sldId")
                        .with_attr("id", slide.id.to_string())
                        .with_attr("r:id", slide.rel_id.as_str()),
                );
            }
        }
        if self.doc.root.attr("xmlns:r").is_none() {
            self.doc.root.set_attr("xmlns:r", REL_NAMESPACE);
        }

        self.package.write_tree(PRESENTATION_PART, &self.doc)?;
        self.package
            .write_relationships(PRESENTATION_PART, &self.rels)?;
        for slide in &self.slides {
            self.package.write_tree(&slide.part, &slide.doc)?;
            if !slide.rels.is_empty() {
                self.package.write_relationships(&slide.part, &slide.rels)?;
            }
        }
        Ok(())
    }

    /// Serialize the presentation to PPTX bytes.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.flush()?;
        self.package.to_bytes()
    }

    /// Save the presentation to a file.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl std::fmt::Debug for Presentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presentation")
            .field("slides", &self.slides.len())
            .field("size", &(self.slide_width, self.slide_height))
            .finish()
    }
}
