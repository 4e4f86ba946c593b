//! Starter template carrying every placeholder token.
//!
//! Produces a small but complete 16:9 deck (master, blank layout, theme and
//! four slides) so a deployment can start from a working template and tests
//! have a real package to edit.

use crate::container::{Package, SLIDE_CONTENT_TYPE};
use crate::error::Result;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n";
const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const OFFICE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const GROUP_PROPS: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#;

/// Title and body text of each starter slide.
const SLIDES: [(&str, &str); 4] = [
    ("{{CompanyName}} Research Briefing", "{{CompanyResearch1}}"),
    ("{{CompanyName}} Key Metrics", "{{CompanyResearch2}}"),
    ("{{CompanyName}} Highlights", "{{CompanyResearch3}}"),
    ("{{IndustryTitle}}", "{{IndustryResearch}}"),
];

fn text_box(id: u32, name: &str, geometry: (i64, i64, i64, i64), size: u32, bold: bool, text: &str) -> String {
    let (x, y, cx, cy) = geometry;
    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
            r#"<p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr>"#,
            r#"<p:txBody><a:bodyPr wrap="square" rtlCol="0"/><a:lstStyle/><a:p><a:r><a:rPr lang="en-US" sz="{sz}" b="{b}" dirty="0"/><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"#
        ),
        id = id,
        name = name,
        x = x,
        y = y,
        cx = cx,
        cy = cy,
        sz = size * 100,
        b = if bold { 1 } else { 0 },
        text = text,
    )
}

fn slide_xml(title: &str, body: &str) -> String {
    format!(
        "{DECL}<p:sld {NS}><p:cSld><p:spTree>{GROUP_PROPS}{}{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>",
        text_box(2, "Title", (457200, 274638, 11277600, 914400), 28, true, title),
        text_box(3, "Content", (457200, 1371600, 11277600, 5029200), 14, false, body),
    )
}

fn rels_xml(entries: &[(&str, &str, &str)]) -> String {
    let body: String = entries
        .iter()
        .map(|(id, kind, target)| {
            format!(r#"<Relationship Id="{id}" Type="{OFFICE_REL}/{kind}" Target="{target}"/>"#)
        })
        .collect();
    format!("{DECL}<Relationships xmlns=\"{RELS_NS}\">{body}</Relationships>")
}

fn content_types() -> String {
    format!(
        concat!(
            "{decl}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
            r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
            r#"<Default Extension="xml" ContentType="application/xml"/>"#,
            r#"<Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>"#,
            r#"<Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/>"#,
            r#"<Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/>"#,
            r#"<Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#,
            r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#,
            "</Types>"
        ),
        decl = DECL
    )
}

fn presentation_xml() -> String {
    let slide_ids: String = (0..SLIDES.len())
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 2))
        .collect();
    format!(
        concat!(
            "{decl}<p:presentation {ns} saveSubsetFonts=\"1\">",
            r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#,
            "<p:sldIdLst>{ids}</p:sldIdLst>",
            r#"<p:sldSz cx="12192000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/>"#,
            "</p:presentation>"
        ),
        decl = DECL,
        ns = NS,
        ids = slide_ids
    )
}

fn master_xml() -> String {
    format!(
        concat!(
            "{decl}<p:sldMaster {ns}><p:cSld><p:bg><p:bgRef idx=\"1001\"><a:schemeClr val=\"bg1\"/></p:bgRef></p:bg>",
            "<p:spTree>{group}</p:spTree></p:cSld>",
            r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#,
            r#"<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>"#,
            "</p:sldMaster>"
        ),
        decl = DECL,
        ns = NS,
        group = GROUP_PROPS
    )
}

fn layout_xml() -> String {
    format!(
        "{DECL}<p:sldLayout {NS} type=\"blank\" preserve=\"1\"><p:cSld name=\"Blank\"><p:spTree>{GROUP_PROPS}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"
    )
}

fn theme_xml() -> String {
    let accents = ["4472C4", "ED7D31", "A5A5A5", "FFC000", "5B9BD5", "70AD47"];
    let accent_xml: String = accents
        .iter()
        .enumerate()
        .map(|(i, c)| format!(r#"<a:accent{n}><a:srgbClr val="{c}"/></a:accent{n}>"#, n = i + 1))
        .collect();
    let fill = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let lines: String = [6350, 12700, 19050]
        .iter()
        .map(|w| format!(r#"<a:ln w="{w}">{fill}</a:ln>"#))
        .collect();
    format!(
        concat!(
            "{decl}<a:theme xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" name=\"Office Theme\"><a:themeElements>",
            "<a:clrScheme name=\"Office\">",
            r#"<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>"#,
            r#"<a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2>"#,
            "{accents}",
            r#"<a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink>"#,
            "</a:clrScheme>",
            "<a:fontScheme name=\"Office\">",
            r#"<a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>"#,
            r#"<a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>"#,
            "</a:fontScheme>",
            "<a:fmtScheme name=\"Office\">",
            "<a:fillStyleLst>{fill}{fill}{fill}</a:fillStyleLst>",
            "<a:lnStyleLst>{lines}</a:lnStyleLst>",
            "<a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst>",
            "<a:bgFillStyleLst>{fill}{fill}{fill}</a:bgFillStyleLst>",
            "</a:fmtScheme></a:themeElements></a:theme>"
        ),
        decl = DECL,
        accents = accent_xml,
        fill = fill,
        lines = lines
    )
}

fn core_xml() -> String {
    format!(
        concat!(
            "{decl}<cp:coreProperties xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" ",
            "xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:dcterms=\"http://purl.org/dc/terms/\" ",
            "xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">",
            "<dc:title>Research Briefing</dc:title><dc:creator>researchdeck</dc:creator></cp:coreProperties>"
        ),
        decl = DECL
    )
}

/// Build the starter template as PPTX bytes.
pub fn starter_template() -> Result<Vec<u8>> {
    let mut package = Package::new();
    package.write_xml("[Content_Types].xml", &content_types());
    package.write_xml(
        "_rels/.rels",
        &format!(
            "{DECL}<Relationships xmlns=\"{RELS_NS}\"><Relationship Id=\"rId1\" Type=\"{OFFICE_REL}/officeDocument\" Target=\"ppt/presentation.xml\"/><Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties\" Target=\"docProps/core.xml\"/></Relationships>"
        ),
    );
    package.write_xml("docProps/core.xml", &core_xml());
    package.write_xml("ppt/presentation.xml", &presentation_xml());

    let mut presentation_rels = vec![("rId1".to_string(), "slideMaster", "slideMasters/slideMaster1.xml".to_string())];
    for i in 0..SLIDES.len() {
        presentation_rels.push((format!("rId{}", i + 2), "slide", format!("slides/slide{}.xml", i + 1)));
    }
    presentation_rels.push((format!("rId{}", SLIDES.len() + 2), "theme", "theme/theme1.xml".to_string()));
    let entries: Vec<(&str, &str, &str)> = presentation_rels
        .iter()
        .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
        .collect();
    package.write_xml("ppt/_rels/presentation.xml.rels", &rels_xml(&entries));

    package.write_xml("ppt/slideMasters/slideMaster1.xml", &master_xml());
    package.write_xml(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        &rels_xml(&[
            ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
            ("rId2", "theme", "../theme/theme1.xml"),
        ]),
    );
    package.write_xml("ppt/slideLayouts/slideLayout1.xml", &layout_xml());
    package.write_xml(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        &rels_xml(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
    );
    package.write_xml("ppt/theme/theme1.xml", &theme_xml());

    for (i, (title, body)) in SLIDES.iter().enumerate() {
        let part = format!("ppt/slides/slide{}.xml", i + 1);
        package.write_xml(&part, &slide_xml(title, body));
        package.write_xml(
            &format!("ppt/slides/_rels/slide{}.xml.rels", i + 1),
            &rels_xml(&[("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml")]),
        );
        package.add_content_type_override(&part, SLIDE_CONTENT_TYPE)?;
    }

    package.to_bytes()
}
