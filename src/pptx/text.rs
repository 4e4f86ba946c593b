//! DrawingML text body editing.

use std::borrow::Cow;

use crate::container::Relationships;
use crate::model::{Paragraph, TextBlock, TextRun};
use crate::xml::{XmlElement, XmlNode};

/// Line breaks (`a:br`) are represented by a vertical tab in paragraph text.
pub const LINE_BREAK: char = '\u{b}';

/// Autofit elements that may appear in `a:bodyPr`.
const AUTOFIT: [&str; 3] = ["noAutofit", "normAutofit", "spAutoFit"];

/// `a:bodyPr` children that must come after the autofit element.
const AFTER_AUTOFIT: [&str; 4] = ["scene3d", "sp3d", "flatTx", "extLst"];

/// Text of one `a:p`, with `a:br` as [`LINE_BREAK`].
pub fn paragraph_text(p: &XmlElement) -> String {
    let mut out = String::new();
    for child in p.elements() {
        match child.local_name() {
            "r" | "fld" => {
                if let Some(t) = child.child("t") {
                    out.push_str(&t.text());
                }
            }
            "br" => out.push(LINE_BREAK),
            _ => {}
        }
    }
    out
}

/// Whether XML 1.0 text content may carry `c`.
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

/// `text` without the characters XML 1.0 cannot carry.
pub fn xml_safe(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|c| is_xml_char(*c)).collect())
    }
}

/// Runs for `text`, with `\n` and [`LINE_BREAK`] written as `a:br`.
///
/// Empty segments get no run. Each run carries a copy of `props`.
pub fn text_runs(text: &str, props: Option<&XmlElement>) -> Vec<XmlElement> {
    let mut out = Vec::new();
    for (i, segment) in text.split(['\n', LINE_BREAK]).enumerate() {
        if i > 0 {
            out.push(XmlElement::new("a:br"));
        }
        let segment = xml_safe(segment.trim_end_matches('\r'));
        if segment.is_empty() {
            continue;
        }
        let mut run = XmlElement::new("a:r");
        if let Some(props) = props {
            run.push(props.clone());
        }
        run.push(XmlElement::new("a:t").with_text(segment));
        out.push(run);
    }
    out
}

/// Text of a text body: paragraphs joined by newlines.
pub fn text_body_text(tx_body: &XmlElement) -> String {
    tx_body
        .elements()
        .filter(|e| e.is("p"))
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace `token` in a paragraph, keeping the first run's properties.
///
/// Runs, fields and breaks are collapsed into a single run carrying the new
/// text; paragraph properties and `a:endParaRPr` are untouched. Returns
/// whether the paragraph changed.
pub fn replace_in_paragraph(p: &mut XmlElement, token: &str, value: &str) -> bool {
    let text = paragraph_text(p);
    if !text.contains(token) {
        return false;
    }
    let replaced = text.replace(token, value);

    let run_props = p
        .elements()
        .find(|e| e.is("r"))
        .and_then(|r| r.child("rPr"))
        .cloned();
    p.retain_elements(|e| !matches!(e.local_name(), "r" | "fld" | "br"));

    for node in text_runs(&replaced, run_props.as_ref()) {
        p.insert_before("endParaRPr", node);
    }
    true
}

/// Switch a `a:bodyPr` to shrink-text-on-overflow.
pub fn set_shrink_on_overflow(body_pr: &mut XmlElement) {
    body_pr.retain_elements(|e| !AUTOFIT.contains(&e.local_name()));
    let autofit = XmlElement::new("a:normAutofit");
    let pos = body_pr
        .children
        .iter()
        .position(|n| matches!(n, XmlNode::Element(e) if AFTER_AUTOFIT.contains(&e.local_name())));
    match pos {
        Some(pos) => body_pr.children.insert(pos, XmlNode::Element(autofit)),
        None => body_pr.push(autofit),
    }
}

/// Run properties for a generated run.
fn run_properties(run: &TextRun, rels: &mut Relationships) -> XmlElement {
    let mut props = XmlElement::new("a:rPr").with_attr("lang", "en-US");
    if let Some(size) = run.style.size_pt {
        props.set_attr("sz", (size * 100).to_string());
    }
    props.set_attr("b", if run.style.bold { "1" } else { "0" });
    props.set_attr("dirty", "0");
    if let Some(ref url) = run.hyperlink {
        let rel_id = rels.add_external_hyperlink(url);
        props.push(XmlElement::new("a:hlinkClick").with_attr("r:id", rel_id));
    }
    props
}

/// Build an `a:p` for a generated paragraph, registering hyperlinks in `rels`.
pub fn paragraph_element(paragraph: &Paragraph, rels: &mut Relationships) -> XmlElement {
    let mut p_pr = XmlElement::new("a:pPr");
    if paragraph.level > 0 {
        p_pr.set_attr("lvl", paragraph.level.to_string());
    }
    p_pr.set_attr("algn", paragraph.alignment.as_drawingml());

    let mut p = XmlElement::new("a:p").with_child(p_pr);
    for run in paragraph.runs.iter().filter(|r| !r.text.is_empty()) {
        let props = run_properties(run, rels);
        for node in text_runs(&run.text, Some(&props)) {
            p.push(node);
        }
    }
    p
}

/// Replace every paragraph of a text body with the block's paragraphs.
///
/// The body keeps its `a:bodyPr` and `a:lstStyle`; auto-size becomes
/// shrink-on-overflow. An empty block leaves a single empty paragraph, since
/// a text body needs at least one.
pub fn fill_text_body(tx_body: &mut XmlElement, block: &TextBlock, rels: &mut Relationships) {
    match tx_body.child_mut("bodyPr") {
        Some(body_pr) => set_shrink_on_overflow(body_pr),
        None => {
            let mut body_pr = XmlElement::new("a:bodyPr");
            set_shrink_on_overflow(&mut body_pr);
            tx_body.children.insert(0, XmlNode::Element(body_pr));
        }
    }

    tx_body.retain_elements(|e| !e.is("p"));
    for paragraph in &block.paragraphs {
        tx_body.push(paragraph_element(paragraph, rels));
    }
    if block.is_empty() {
        tx_body.push(XmlElement::new("a:p"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::REL_HYPERLINK;
    use crate::xml::XmlDocument;

    fn parse(xml: &str) -> XmlElement {
        XmlDocument::parse(xml).unwrap().root
    }

    #[test]
    fn test_paragraph_text_with_break() {
        let p = parse(r#"<a:p xmlns:a="a"><a:r><a:t>Hello</a:t></a:r><a:br/><a:r><a:t>World</a:t></a:r></a:p>"#);
        assert_eq!(paragraph_text(&p), "Hello\u{b}World");
    }

    #[test]
    fn test_replace_token_split_across_runs() {
        let mut p = parse(
            r#"<a:p xmlns:a="a"><a:pPr algn="ctr"/><a:r><a:rPr sz="2400" b="1"/><a:t>About {{Company</a:t></a:r><a:r><a:t>Name}}</a:t></a:r><a:endParaRPr sz="2400"/></a:p>"#,
        );
        assert!(replace_in_paragraph(&mut p, "{{CompanyName}}", "Contoso"));
        assert_eq!(paragraph_text(&p), "About Contoso");

        let names: Vec<_> = p.elements().map(|e| e.local_name().to_string()).collect();
        assert_eq!(names, vec!["pPr", "r", "endParaRPr"]);
        let run = p.child("r").unwrap();
        assert_eq!(run.child("rPr").unwrap().attr("sz"), Some("2400"));
    }

    #[test]
    fn test_replace_keeps_line_breaks() {
        let mut p = parse(r#"<a:p xmlns:a="a"><a:r><a:t>{{X}}</a:t></a:r><a:br/><a:r><a:t>tail</a:t></a:r></a:p>"#);
        assert!(replace_in_paragraph(&mut p, "{{X}}", "head"));
        assert_eq!(paragraph_text(&p), "head\u{b}tail");
        assert!(p.child("br").is_some());
    }

    #[test]
    fn test_replace_without_token_is_noop() {
        let mut p = parse(r#"<a:p xmlns:a="a"><a:r><a:t>Plain</a:t></a:r></a:p>"#);
        let before = p.clone();
        assert!(!replace_in_paragraph(&mut p, "{{X}}", "y"));
        assert_eq!(p, before);
    }

    #[test]
    fn test_replace_with_control_characters() {
        let mut p = parse(r#"<a:p xmlns:a="a"><a:r><a:t>{{X}}</a:t></a:r><a:endParaRPr/></a:p>"#);
        assert!(replace_in_paragraph(&mut p, "{{X}}", "a\u{1}b\nc"));
        assert_eq!(paragraph_text(&p), "ab\u{b}c");
        let names: Vec<_> = p.elements().map(|e| e.local_name().to_string()).collect();
        assert_eq!(names, vec!["r", "br", "r", "endParaRPr"]);
    }

    #[test]
    fn test_generated_text_breaks_and_control_characters() {
        let mut block = TextBlock::new();
        block.bullet_runs(vec![TextRun::plain("line one\nline two\u{1}\u{b}three\u{fffe}")], 0, 14);
        let mut rels = Relationships::new();
        let p = paragraph_element(&block.paragraphs[0], &mut rels);

        let names: Vec<_> = p.elements().map(|e| e.local_name().to_string()).collect();
        assert_eq!(names, vec!["pPr", "r", "br", "r", "br", "r"]);
        for run in p.elements().filter(|e| e.is("r")) {
            assert_eq!(run.child("rPr").unwrap().attr("sz"), Some("1400"));
        }

        let xml = XmlDocument::new(p).to_xml().unwrap();
        assert!(!xml.contains('\u{1}'));
        assert!(!xml.contains('\u{fffe}'));
        let reparsed = XmlDocument::parse(&xml).unwrap().root;
        assert!(paragraph_text(&reparsed).ends_with("line two\u{b}three"));
    }

    #[test]
    fn test_xml_safe_borrows_clean_text() {
        assert!(matches!(xml_safe("tab\there"), Cow::Borrowed(_)));
        assert_eq!(xml_safe("a\u{0}b\u{1f}c"), "abc");
    }

    #[test]
    fn test_autofit_position() {
        let mut body_pr = parse(r#"<a:bodyPr xmlns:a="a"><a:spAutoFit/><a:scene3d/></a:bodyPr>"#);
        set_shrink_on_overflow(&mut body_pr);
        let names: Vec<_> = body_pr.elements().map(|e| e.local_name().to_string()).collect();
        assert_eq!(names, vec!["normAutofit", "scene3d"]);
    }

    #[test]
    fn test_fill_text_body() {
        let mut tx_body = parse(
            r#"<p:txBody xmlns:a="a" xmlns:p="p"><a:bodyPr/><a:lstStyle/><a:p><a:r><a:t>{{CompanyResearch2}}</a:t></a:r></a:p></p:txBody>"#,
        );
        let mut block = TextBlock::new();
        block.header("Revenue:");
        block.bullet_runs(
            vec![
                TextRun::plain("Filed at "),
                TextRun::link("https://sec.gov/x", "https://sec.gov/x"),
            ],
            1,
            12,
        );
        let mut rels = Relationships::new();
        fill_text_body(&mut tx_body, &block, &mut rels);

        assert_eq!(text_body_text(&tx_body), "Revenue:\nFiled at https://sec.gov/x");
        assert!(tx_body.child("bodyPr").unwrap().child("normAutofit").is_some());
        assert!(tx_body.child("lstStyle").is_some());

        let links = rels.get_by_type(REL_HYPERLINK);
        assert_eq!(links.len(), 1);
        let mut clicks = Vec::new();
        tx_body.find_all("hlinkClick", &mut clicks);
        assert_eq!(clicks[0].attr("r:id"), Some(links[0].id.as_str()));

        let second = tx_body.elements().filter(|e| e.is("p")).nth(1).unwrap();
        assert_eq!(second.child("pPr").unwrap().attr("lvl"), Some("1"));
        let first_run = second.child("r").unwrap();
        assert_eq!(first_run.child("rPr").unwrap().attr("sz"), Some("1200"));
    }

    #[test]
    fn test_fill_empty_block_leaves_one_paragraph() {
        let mut tx_body = parse(r#"<p:txBody xmlns:a="a" xmlns:p="p"><a:p/><a:p/></p:txBody>"#);
        fill_text_body(&mut tx_body, &TextBlock::new(), &mut Relationships::new());
        assert_eq!(tx_body.elements().filter(|e| e.is("p")).count(), 1);
        assert_eq!(tx_body.elements().next().unwrap().local_name(), "bodyPr");
    }
}
