//! Industry research: a paginated table, or narrative bullets.
//!
//! Tabular payloads (`{title, headers, rows}` or a ValueMap) become a table
//! on the industry slide. Rows that do not fit are carried onto copies of
//! that slide, inserted right after it. Anything else is written as
//! bullets into the `{{IndustryResearch}}` text frame.

use super::company::inline_item;
use super::valuemap;
use super::values::{fmt_billions_usd, fmt_currency, fmt_thousands, parse_number, parse_percent, value_text};
use super::{fill_token, INDUSTRY_TITLE_TOKEN, INDUSTRY_TOKEN};
use crate::error::Result;
use crate::model::{estimate_row_height, Table, TextBlock, BULLET_SIZE_PT, SUB_BULLET_SIZE_PT};
use crate::pptx::table::{column_widths, TABLE_LINE_HEIGHT_PT};
use crate::pptx::{Bbox, Presentation, EMU_PER_PT};
use serde_json::{Map, Value};

const INDUSTRY_NAME_FIELD: &str = "Industry Name";
const DEFAULT_TITLE: &str = "Industry Research";
const CONTINUED_SUFFIX: &str = " (cont.)";

const MONEY_TERMS: [&str; 6] = ["revenue", "income", "profit", "value", "market size", "cap"];
const PERCENT_TERMS: [&str; 5] = ["percent", "rate", "growth", "margin", "share"];
const HEADCOUNT_TERMS: [&str; 3] = ["employees", "workforce", "staff"];

/// Money above this is shown in billions.
const BILLIONS_THRESHOLD: f64 = 1_000_000.0;

/// How the industry payload was rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndustryOutcome {
    /// A table spread over this many slides.
    Table { pages: usize },
    /// Narrative bullets in the text frame.
    Bullets,
    /// Neither a table nor a token to write into.
    Skipped,
}

/// Tabular reading of an industry payload.
pub struct IndustryTable;

impl IndustryTable {
    /// Read `{title, headers, rows}` directly, else a ValueMap.
    ///
    /// Returns `None` when the payload is not tabular or the table has no
    /// columns.
    pub fn from_payload(payload: &Value, company_name: &str) -> Result<Option<Table>> {
        if let Some(table) = direct_table(payload) {
            return Ok((!table.is_empty()).then_some(table));
        }
        if valuemap::is_valuemap_format(payload) {
            let table = valuemap::transform(payload, company_name)?;
            return Ok((!table.is_empty()).then_some(table));
        }
        Ok(None)
    }
}

fn direct_table(payload: &Value) -> Option<Table> {
    let map = payload.as_object()?;
    let headers: Vec<String> = map
        .get("headers")?
        .as_array()?
        .iter()
        .map(value_text)
        .collect();
    let rows = map.get("rows")?.as_array()?;
    let title = map
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(DEFAULT_TITLE);

    let mut table = Table::new(title, headers);
    for row in rows {
        let cells = match row {
            Value::Object(cells) => table
                .headers
                .iter()
                .map(|h| cells.get(h).map(valuemap::flatten_value).unwrap_or_default())
                .collect(),
            Value::Array(cells) => cells.iter().map(valuemap::flatten_value).collect(),
            other => vec![valuemap::flatten_value(other)],
        };
        table.add_row(cells);
    }
    Some(table)
}

/// Split rows into pages that fit `bbox`, each page repeating the header.
///
/// A row taller than the whole area still gets a page of its own.
pub fn paginate(table: &Table, bbox: Bbox) -> Vec<Vec<Vec<String>>> {
    let widths = column_widths(bbox.width, table.column_count());
    let col_width_pt = widths.first().copied().unwrap_or(bbox.width) as f64 / EMU_PER_PT as f64;
    let height = |cells: &[String]| estimate_row_height(cells, TABLE_LINE_HEIGHT_PT, col_width_pt);

    let available = bbox.height_pt();
    let header_height = height(&table.headers);

    let mut pages = Vec::new();
    let mut page: Vec<Vec<String>> = Vec::new();
    let mut used = header_height;
    for row in &table.rows {
        let h = height(row);
        if !page.is_empty() && used + h > available {
            pages.push(std::mem::take(&mut page));
            used = header_height;
        }
        used += h;
        page.push(row.clone());
    }
    if !page.is_empty() || pages.is_empty() {
        pages.push(page);
    }
    pages
}

/// Slide that receives the table: the one holding the token, else the last.
fn target_slide(prs: &Presentation) -> Option<usize> {
    prs.find_shape_with_token(INDUSTRY_TOKEN)
        .map(|shape| shape.slide)
        .or_else(|| prs.slide_count().checked_sub(1))
}

/// Lay the table out over the target slide and as many copies as needed.
///
/// Returns the number of slides used.
pub fn fill_industry_slides(prs: &mut Presentation, table: &Table) -> Result<usize> {
    let Some(target) = target_slide(prs) else {
        tracing::warn!("template has no slides for the industry table");
        return Ok(0);
    };
    let area = prs
        .find_shape_on_slide(target, INDUSTRY_TOKEN)
        .and_then(|shape| prs.shape_bbox(&shape))
        .unwrap_or_else(|| prs.default_content_bbox());
    let pages = paginate(table, area);

    // Copies are made before the target is edited so each starts untouched.
    for _ in 1..pages.len() {
        prs.duplicate_slide(target)?;
    }

    for (i, rows) in pages.iter().enumerate() {
        let slide = target + i;
        let bbox = match prs.find_shape_on_slide(slide, INDUSTRY_TOKEN) {
            Some(shape) => prs.remove_shape(&shape)?,
            None => prs.default_content_bbox(),
        };
        prs.insert_table(slide, bbox, &table.headers, rows)?;

        let title = if i == 0 {
            table.title.clone()
        } else {
            format!("{}{}", table.title, CONTINUED_SUFFIX)
        };
        prs.replace_tokens_on_slide(slide, &[INDUSTRY_TITLE_TOKEN], &title)?;
    }

    tracing::info!(
        rows = table.row_count(),
        pages = pages.len(),
        "industry table laid out"
    );
    Ok(pages.len())
}

/// Format a value according to what its key says it measures.
pub fn format_industry_value(key: &str, value: &Value) -> String {
    let key = key.to_lowercase();
    let has = |terms: &[&str]| terms.iter().any(|t| key.contains(t));

    if has(&MONEY_TERMS) {
        if let Some(n) = parse_number(value) {
            return if n > BILLIONS_THRESHOLD {
                fmt_billions_usd(n)
            } else {
                fmt_currency(n)
            };
        }
    }
    if has(&PERCENT_TERMS) {
        if let Some(p) = parse_percent(value) {
            return format!("{:.2}%", p);
        }
    }
    if has(&HEADCOUNT_TERMS) {
        if let Some(n) = parse_number(value) {
            return format!("{} employees", fmt_thousands(n.trunc() as i64));
        }
    }
    value_text(value)
}

fn formatted_item(item: &Value) -> String {
    match item {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, format_industry_value(k, v)))
            .collect::<Vec<_>>()
            .join("; "),
        other => inline_item(other),
    }
}

/// Narrative bullets for a non-tabular industry payload.
pub fn industry_block(payload: &Map<String, Value>) -> TextBlock {
    let mut block = TextBlock::new();

    for (key, val) in payload {
        if key == INDUSTRY_NAME_FIELD {
            continue;
        }
        match val {
            Value::Object(children) => {
                block.header(format!("{}:", key));
                for (k2, v2) in children {
                    match v2 {
                        Value::Array(items) => {
                            block.bullet(format!("{}:", k2), 0, BULLET_SIZE_PT);
                            for item in items {
                                block.bullet(formatted_item(item), 1, SUB_BULLET_SIZE_PT);
                            }
                        }
                        Value::Object(grandchildren) => {
                            block.bullet(format!("{}:", k2), 0, BULLET_SIZE_PT);
                            for (kk, vv) in grandchildren {
                                block.bullet(
                                    format!("{}: {}", kk, format_industry_value(kk, vv)),
                                    1,
                                    SUB_BULLET_SIZE_PT,
                                );
                            }
                        }
                        scalar => block.bullet(
                            format!("{}: {}", k2, format_industry_value(k2, scalar)),
                            0,
                            BULLET_SIZE_PT,
                        ),
                    }
                }
            }
            Value::Array(items) => {
                block.header(format!("{}:", key));
                for item in items {
                    block.bullet(formatted_item(item), 1, SUB_BULLET_SIZE_PT);
                }
            }
            scalar => block.bullet(
                format!("🏭 {}: {}", key, format_industry_value(key, scalar)),
                0,
                BULLET_SIZE_PT,
            ),
        }
    }
    block
}

/// Render the industry payload: as a table when tabular, else as bullets.
pub fn fill_industry(
    prs: &mut Presentation,
    payload: &Map<String, Value>,
    company_name: &str,
) -> Result<IndustryOutcome> {
    let value = Value::Object(payload.clone());
    if let Some(table) = IndustryTable::from_payload(&value, company_name)? {
        let pages = fill_industry_slides(prs, &table)?;
        return Ok(IndustryOutcome::Table { pages });
    }

    let title = payload
        .get(INDUSTRY_NAME_FIELD)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_TITLE);
    prs.replace_token_everywhere(&[INDUSTRY_TITLE_TOKEN], title)?;

    if fill_token(prs, INDUSTRY_TOKEN, &industry_block(payload))? {
        Ok(IndustryOutcome::Bullets)
    } else {
        Ok(IndustryOutcome::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pptx::starter_template;
    use serde_json::json;

    fn starter() -> Presentation {
        Presentation::from_bytes(&starter_template().unwrap()).unwrap()
    }

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn rows(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"Challenge": format!("Challenge {}", i), "KPI": "Hours"}))
            .collect()
    }

    #[test]
    fn test_direct_table() {
        let payload = json!({
            "title": "Market Map",
            "headers": ["Segment", "Share"],
            "rows": [{"Segment": "Cloud", "Share": "40%"}, ["Edge", 12], "odd"]
        });
        let table = IndustryTable::from_payload(&payload, "X").unwrap().unwrap();
        assert_eq!(table.title, "Market Map");
        assert_eq!(
            table.rows,
            vec![vec!["Cloud", "40%"], vec!["Edge", "12"], vec!["odd", ""]]
        );
    }

    #[test]
    fn test_non_tabular_payload() {
        let payload = json!({"Industry Name": "Retail", "Growth Rate": "3.5"});
        assert!(IndustryTable::from_payload(&payload, "X").unwrap().is_none());
        let empty = json!({"headers": [], "rows": []});
        assert!(IndustryTable::from_payload(&empty, "X").unwrap().is_none());
    }

    #[test]
    fn test_paginate() {
        let mut table = Table::new("T", vec!["A".to_string(), "B".to_string()]);
        for i in 0..10 {
            table.add_row(vec![format!("r{}", i), String::new()]);
        }
        // 12pt lines: header plus four rows fit in 60pt
        let bbox = Bbox {
            left: 0,
            top: 0,
            width: 200 * EMU_PER_PT,
            height: 60 * EMU_PER_PT,
        };
        let pages = paginate(&table, bbox);
        assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(pages[1][0][0], "r4");

        let empty = Table::new("T", vec!["A".to_string()]);
        assert_eq!(paginate(&empty, bbox), vec![Vec::<Vec<String>>::new()]);
    }

    #[test]
    fn test_oversized_row_gets_own_page() {
        let mut table = Table::new("T", vec!["A".to_string()]);
        table.add_row(vec!["x\n".repeat(20)]);
        table.add_row(vec!["y".to_string()]);
        let bbox = Bbox {
            left: 0,
            top: 0,
            width: 100 * EMU_PER_PT,
            height: 48 * EMU_PER_PT,
        };
        let pages = paginate(&table, bbox);
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn test_fill_industry_slides_paginates() {
        let mut prs = starter();
        let payload = obj(json!({"BenefitTable": rows(60)}));
        let outcome = fill_industry(&mut prs, &payload, "Contoso").unwrap();
        let IndustryOutcome::Table { pages } = outcome else {
            panic!("expected a table, got {:?}", outcome);
        };
        assert!(pages > 1);
        assert_eq!(prs.slide_count(), 3 + pages);

        for i in 0..pages {
            let slide = 3 + i;
            assert_eq!(prs.slide_table_count(slide), 1);
            let texts = prs.slide_texts(slide);
            assert!(!texts.iter().any(|t| t.contains(INDUSTRY_TOKEN)));
            let expected = if i == 0 {
                "Contoso Value Map Benefit Table".to_string()
            } else {
                "Contoso Value Map Benefit Table (cont.)".to_string()
            };
            assert!(texts.contains(&expected), "slide {}: {:?}", slide, texts);
        }

        let total_rows: usize = (0..pages)
            .map(|i| prs.slide_tables(3 + i)[0].len() - 1)
            .sum();
        assert_eq!(total_rows, 60);
        assert_eq!(prs.slide_tables(3)[0][0], vec!["Challenge", "KPI"]);
    }

    #[test]
    fn test_fill_industry_bullets() {
        let mut prs = starter();
        let payload = obj(json!({
            "Industry Name": "Semiconductors",
            "Market Size": "574 billion",
            "Growth Rate": "6,5",
            "Overview": {"Workforce": 2000000, "Leaders": [{"Name": "A", "Market Share": 30}]}
        }));
        let outcome = fill_industry(&mut prs, &payload, "Contoso").unwrap();
        assert_eq!(outcome, IndustryOutcome::Bullets);

        let block = industry_block(&payload);
        assert_eq!(
            block.plain_text(),
            [
                "• 🏭 Market Size: $574.00 billion USD",
                "• 🏭 Growth Rate: 6.50%",
                "Overview:",
                "• Workforce: 2,000,000 employees",
                "• Leaders:",
                "• Name: A; Market Share: 30.00%",
            ]
            .join("\n")
        );
        let texts = prs.slide_texts(3);
        assert!(texts.contains(&"Semiconductors".to_string()));
        assert_eq!(prs.slide_count(), 4);
    }

    #[test]
    fn test_format_industry_value() {
        assert_eq!(format_industry_value("Revenue", &json!(1500)), "$1.500");
        assert_eq!(format_industry_value("Net Income", &json!("2.5 million")), "$0.00 billion USD");
        assert_eq!(format_industry_value("Headline", &json!("n/a")), "n/a");
        assert_eq!(format_industry_value("Staff", &json!("1200")), "1,200 employees");
        assert_eq!(format_industry_value("Margin", &json!("low")), "low");
    }
}
