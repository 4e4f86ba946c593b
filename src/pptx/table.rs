//! DrawingML table frames.

use super::text::text_runs;
use super::{Bbox, EMU_PER_PT};
use crate::model::estimate_row_height;
use crate::xml::XmlElement;

const TABLE_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/table";

/// Font size of table body cells in points.
pub const TABLE_FONT_PT: u32 = 10;

/// Font size of the header row in points.
pub const TABLE_HEADER_FONT_PT: u32 = 11;

/// Line height used for row height estimates in points.
pub const TABLE_LINE_HEIGHT_PT: f64 = 12.0;

/// Split `total` EMU into `columns` widths; the last column takes the remainder.
pub fn column_widths(total: i64, columns: usize) -> Vec<i64> {
    if columns == 0 {
        return Vec::new();
    }
    let base = total / columns as i64;
    let mut widths = vec![base; columns];
    widths[columns - 1] = total - base * (columns as i64 - 1);
    widths
}

/// A table cell; `\n` starts a new paragraph and [`LINE_BREAK`](super::text::LINE_BREAK) a line break.
fn cell(text: &str, size_pt: u32, bold: bool) -> XmlElement {
    let props = XmlElement::new("a:rPr")
        .with_attr("lang", "en-US")
        .with_attr("sz", (size_pt * 100).to_string())
        .with_attr("b", if bold { "1" } else { "0" })
        .with_attr("dirty", "0");
    let mut tx_body = XmlElement::new("a:txBody")
        .with_child(XmlElement::new("a:bodyPr"))
        .with_child(XmlElement::new("a:lstStyle"));

    for line in text.split('\n') {
        let mut p = XmlElement::new("a:p");
        let runs = text_runs(line, Some(&props));
        if runs.is_empty() {
            p.push(
                XmlElement::new("a:endParaRPr")
                    .with_attr("lang", "en-US")
                    .with_attr("sz", (size_pt * 100).to_string())
                    .with_attr("dirty", "0"),
            );
        } else {
            for node in runs {
                p.push(node);
            }
        }
        tx_body.push(p);
    }

    XmlElement::new("a:tc")
        .with_child(tx_body)
        .with_child(XmlElement::new("a:tcPr"))
}

fn row(cells: &[String], height_emu: i64, size_pt: u32, bold: bool) -> XmlElement {
    let mut tr = XmlElement::new("a:tr").with_attr("h", height_emu.to_string());
    for text in cells {
        tr.push(cell(text, size_pt, bold));
    }
    tr
}

/// Build a `p:graphicFrame` holding a table with a bold header row.
///
/// Row heights come from [`estimate_row_height`]; PowerPoint grows rows to
/// fit on open, so the estimate only needs to be close.
pub fn graphic_frame(
    shape_id: u32,
    bbox: Bbox,
    headers: &[String],
    rows: &[Vec<String>],
) -> XmlElement {
    let widths = column_widths(bbox.width, headers.len());
    let col_width_pt = widths.first().copied().unwrap_or(bbox.width) as f64 / EMU_PER_PT as f64;
    let height_emu =
        |cells: &[String]| (estimate_row_height(cells, TABLE_LINE_HEIGHT_PT, col_width_pt) * EMU_PER_PT as f64) as i64;

    let mut grid = XmlElement::new("a:tblGrid");
    for w in &widths {
        grid.push(XmlElement::new("a:gridCol").with_attr("w", w.to_string()));
    }

    let mut tbl = XmlElement::new("a:tbl")
        .with_child(
            XmlElement::new("a:tblPr")
                .with_attr("firstRow", "1")
                .with_attr("bandRow", "1"),
        )
        .with_child(grid)
        .with_child(row(headers, height_emu(headers), TABLE_HEADER_FONT_PT, true));
    for cells in rows {
        tbl.push(row(cells, height_emu(cells), TABLE_FONT_PT, false));
    }

    XmlElement::new("p:graphicFrame")
        .with_child(
            XmlElement::new("p:nvGraphicFramePr")
                .with_child(
                    XmlElement::new("p:cNvPr")
                        .with_attr("id", shape_id.to_string())
                        .with_attr("name", format!("Table {}", shape_id)),
                )
                .with_child(
                    XmlElement::new("p:cNvGraphicFramePr").with_child(
                        XmlElement::new("a:graphicFrameLocks").with_attr("noGrp", "1"),
                    ),
                )
                .with_child(XmlElement::new("p:nvPr")),
        )
        .with_child(
            XmlElement::new("p:xfrm")
                .with_child(
                    XmlElement::new("a:off")
                        .with_attr("x", bbox.left.to_string())
                        .with_attr("y", bbox.top.to_string()),
                )
                .with_child(
                    XmlElement::new("a:ext")
                        .with_attr("cx", bbox.width.to_string())
                        .with_attr("cy", bbox.height.to_string()),
                ),
        )
        .with_child(
            XmlElement::new("a:graphic").with_child(
                XmlElement::new("a:graphicData")
                    .with_attr("uri", TABLE_URI)
                    .with_child(tbl),
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pptx::text::{paragraph_text, LINE_BREAK};
    use crate::xml::XmlDocument;

    fn bbox() -> Bbox {
        Bbox {
            left: 457200,
            top: 1371600,
            width: 9144000,
            height: 4572000,
        }
    }

    #[test]
    fn test_column_widths_sum_to_total() {
        let widths = column_widths(1000, 3);
        assert_eq!(widths, vec![333, 333, 334]);
        assert_eq!(widths.iter().sum::<i64>(), 1000);
        assert!(column_widths(1000, 0).is_empty());
    }

    #[test]
    fn test_graphic_frame_structure() {
        let headers = vec!["Challenge".to_string(), "KPI".to_string()];
        let rows = vec![
            vec!["Slow onboarding".to_string(), "Days to productivity".to_string()],
            vec!["Line one\nLine two".to_string(), String::new()],
        ];
        let frame = graphic_frame(7, bbox(), &headers, &rows);

        assert_eq!(frame.find("cNvPr").unwrap().attr("id"), Some("7"));
        assert_eq!(frame.find("off").unwrap().attr("x"), Some("457200"));

        let tbl = frame.find("tbl").unwrap();
        assert_eq!(tbl.child("tblGrid").unwrap().elements().count(), 2);
        let trs: Vec<_> = tbl.elements().filter(|e| e.is("tr")).collect();
        assert_eq!(trs.len(), 3);

        let header_run = trs[0].find("rPr").unwrap();
        assert_eq!(header_run.attr("b"), Some("1"));
        assert_eq!(header_run.attr("sz"), Some("1100"));

        let multi_line = trs[2].elements().next().unwrap();
        assert_eq!(multi_line.find("txBody").unwrap().elements().filter(|e| e.is("p")).count(), 2);
        assert!(trs[2].elements().nth(1).unwrap().find("endParaRPr").is_some());

        let h_single: i64 = trs[1].attr("h").unwrap().parse().unwrap();
        let h_double: i64 = trs[2].attr("h").unwrap().parse().unwrap();
        assert_eq!(h_double, 2 * h_single);
    }

    #[test]
    fn test_cell_breaks_and_control_characters() {
        let tc = cell("Owner\u{b}Deputy\u{7}\nSecond", TABLE_FONT_PT, false);
        let paragraphs: Vec<_> = tc.find("txBody").unwrap().elements().filter(|e| e.is("p")).collect();
        assert_eq!(paragraphs.len(), 2);

        let names: Vec<_> = paragraphs[0].elements().map(|e| e.local_name().to_string()).collect();
        assert_eq!(names, vec!["r", "br", "r"]);
        assert_eq!(paragraph_text(paragraphs[0]), format!("Owner{}Deputy", LINE_BREAK));

        let xml = XmlDocument::new(tc.clone()).to_xml().unwrap();
        assert!(!xml.contains('\u{7}'));
        assert!(XmlDocument::parse(&xml).is_ok());
    }

    #[test]
    fn test_cell_of_only_control_characters_is_empty() {
        let tc = cell("\u{1}\u{2}", TABLE_FONT_PT, true);
        let p = tc.find("p").unwrap();
        assert!(p.child("r").is_none());
        assert_eq!(p.child("endParaRPr").unwrap().attr("sz"), Some("1000"));
    }
}
