//! Key financial metrics as narrative bullets.
//!
//! Payload layouts vary between research runs, so every metric is located
//! by key synonyms anywhere in the document. A metric whose object is
//! absent is left out; a metric with missing details degrades its wording.

use super::values::{
    choose_link, deep_find, deep_find_excluding, first_str_in_order, fmt_billions_usd,
    fmt_thousands, norm, parse_date, parse_number, parse_percent_str, value_text,
};
use super::{fill_token, KEY_METRICS_TOKEN};
use crate::error::Result;
use crate::model::{TextBlock, TextRun, BULLET_SIZE_PT, SUB_BULLET_SIZE_PT};
use crate::pptx::Presentation;
use serde_json::{Map, Value};

const REVENUE_KEYS: [&str; 5] = ["revenue", "sales", "total revenue", "latest revenue", "annual revenue"];
const AMOUNT_KEYS: [&str; 4] = ["amount", "value", "revenue", "sales"];
const FISCAL_DATE_KEYS: [&str; 4] = ["fiscal year close date", "fiscal year", "as of", "date"];
const INDUSTRY_MARGIN_KEYS: [&str; 3] = ["industry average gross margin", "industry gross margin", "industry avg"];
const INDUSTRY_NAME_KEYS: [&str; 2] = ["industry", "sector"];
const AVERAGE_MARGIN_KEYS: [&str; 4] = ["average gross margin", "gross margin", "avg", "average"];
const COMPANY_MARGIN_KEYS: [&str; 2] = ["company gross margin", "gross margin"];
const MARGIN_KEYS: [&str; 2] = ["gross margin", "margin"];
const EMPLOYEE_KEYS: [&str; 3] = ["employee count", "headcount", "employees"];
const HEADCOUNT_KEYS: [&str; 6] = ["headcount", "employees", "employee count", "count", "total", "value"];
const AS_OF_KEYS: [&str; 4] = ["as of", "date", "fiscal year close date", "fiscal year"];

/// Revenue amounts below this are not taken as a fallback amount.
const MIN_FALLBACK_AMOUNT: f64 = 1e6;

/// Name used in the revenue sentence.
///
/// Looks for `Company Name`, `Name` or `Company` in the payload, then the
/// profile name, then a generic subject.
pub fn resolve_company_name(payload: &Map<String, Value>, profile_name: Option<&str>) -> String {
    ["Company Name", "Name", "Company"]
        .iter()
        .filter_map(|k| payload.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .or(profile_name.map(str::trim).filter(|s| !s.is_empty()))
        .unwrap_or("The company")
        .to_string()
}

/// Runs for a sentence followed by `(link).` or `.`.
fn sentence(text: String, link: Option<String>) -> Vec<TextRun> {
    let mut runs = vec![TextRun::plain(text)];
    match link {
        Some(url) => {
            runs.push(TextRun::plain("("));
            runs.push(TextRun::link(url.clone(), url));
            runs.push(TextRun::plain(")."));
        }
        None => runs.push(TextRun::plain(".")),
    }
    runs
}

fn source_link(obj: &Map<String, Value>) -> Option<String> {
    let whole = Value::Object(obj.clone());
    choose_link(&[obj.get("Source"), obj.get("URL"), Some(&whole)])
}

fn percent_text(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", v))
        .unwrap_or_else(|| "an unspecified value".to_string())
}

fn fiscal_year_text(obj: &Map<String, Value>, keys: &[&str], fallback: &str) -> String {
    first_str_in_order(obj, keys)
        .map(parse_date)
        .unwrap_or_else(|| fallback.to_string())
}

/// The revenue amount: a known amount key, else the first large number.
fn revenue_amount(revenue: &Map<String, Value>) -> Option<f64> {
    let by_key = AMOUNT_KEYS.iter().find_map(|wanted| {
        revenue
            .iter()
            .find(|(k, _)| norm(k) == *wanted)
            .and_then(|(_, v)| parse_number(v))
    });
    by_key.or_else(|| {
        revenue
            .values()
            .filter_map(parse_number)
            .find(|n| *n > MIN_FALLBACK_AMOUNT)
    })
}

fn revenue_bullets(block: &mut TextBlock, revenue: &Map<String, Value>, company_name: &str) {
    let amount_txt = revenue_amount(revenue)
        .filter(|n| *n != 0.0)
        .map(fmt_billions_usd)
        .unwrap_or_else(|| "an undisclosed amount".to_string());
    let fy_txt = fiscal_year_text(revenue, &FISCAL_DATE_KEYS, "the latest fiscal year");

    let text = format!(
        "{} reported an annual revenue of {} for the fiscal year ending {} ",
        company_name, amount_txt, fy_txt
    );
    block.bullet_runs(sentence(text, source_link(revenue)), 0, BULLET_SIZE_PT);

    if let Some(sec) = choose_link(&[revenue.get("SEC Source"), revenue.get("SEC URL")]) {
        block.bullet_runs(
            vec![TextRun::plain("Additional filing: "), TextRun::link(sec.clone(), sec)],
            1,
            SUB_BULLET_SIZE_PT,
        );
    }
}

fn industry_average(industry: &Map<String, Value>) -> Option<f64> {
    first_str_in_order(industry, &AVERAGE_MARGIN_KEYS).and_then(parse_percent_str)
}

fn industry_margin_bullet(block: &mut TextBlock, industry: &Map<String, Value>) {
    let name = first_str_in_order(industry, &INDUSTRY_NAME_KEYS).unwrap_or("industry");
    let text = format!(
        "The industry average gross margin for the \"{}\" industry is approximately {} ",
        name,
        percent_text(industry_average(industry))
    );
    block.bullet_runs(sentence(text, source_link(industry)), 0, BULLET_SIZE_PT);
}

fn company_margin_bullet(
    block: &mut TextBlock,
    company: &Map<String, Value>,
    industry: Option<&Map<String, Value>>,
) {
    let margin = first_str_in_order(company, &MARGIN_KEYS).and_then(parse_percent_str);
    let fy_txt = fiscal_year_text(company, &FISCAL_DATE_KEYS, "the latest fiscal year");

    let matches_industry = match (margin, industry.and_then(industry_average)) {
        (Some(m), Some(avg)) => (m - avg).abs() < 1e-6,
        _ => false,
    };
    let tail = if matches_industry {
        ", matching the industry average"
    } else {
        ""
    };

    let text = format!(
        "The company's gross margin for the fiscal year ending {} was {}{} ",
        fy_txt,
        percent_text(margin),
        tail
    );
    block.bullet_runs(sentence(text, source_link(company)), 0, BULLET_SIZE_PT);
}

fn headcount_text(employees: &Map<String, Value>) -> String {
    let headcount = employees
        .iter()
        .find(|(k, _)| {
            let nk = norm(k);
            HEADCOUNT_KEYS.iter().any(|s| nk.contains(s))
        })
        .map(|(_, v)| v);

    match headcount {
        Some(Value::Number(n)) => fmt_thousands(n.as_f64().unwrap_or_default().trunc() as i64),
        Some(other) => match parse_number(other).filter(|n| *n != 0.0) {
            Some(n) => fmt_thousands(n.trunc() as i64),
            None if other.is_null() => "an unspecified number".to_string(),
            None => value_text(other),
        },
        None => "an unspecified number".to_string(),
    }
}

fn employee_bullet(block: &mut TextBlock, employees: &Map<String, Value>) {
    let as_of = fiscal_year_text(employees, &AS_OF_KEYS, "the stated date");
    let text = format!(
        "The company had {} employees as of {} ",
        headcount_text(employees),
        as_of
    );
    block.bullet_runs(sentence(text, source_link(employees)), 0, BULLET_SIZE_PT);
}

/// Narrative bullets for revenue, gross margins and headcount.
pub fn key_metrics_block(payload: &Map<String, Value>, profile_name: Option<&str>) -> TextBlock {
    let company_name = resolve_company_name(payload, profile_name);
    let mut block = TextBlock::new();

    if let Some(revenue) = deep_find(payload, &REVENUE_KEYS) {
        revenue_bullets(&mut block, &revenue, &company_name);
    }

    let industry = deep_find(payload, &INDUSTRY_MARGIN_KEYS);
    if let Some(ref industry) = industry {
        industry_margin_bullet(&mut block, industry);
    }

    if let Some(company) = deep_find_excluding(payload, &COMPANY_MARGIN_KEYS, &["industry"]) {
        company_margin_bullet(&mut block, &company, industry.as_ref());
    }

    if let Some(employees) = deep_find(payload, &EMPLOYEE_KEYS) {
        employee_bullet(&mut block, &employees);
    }

    if block.is_empty() {
        tracing::warn!("no key metrics recognised in payload");
    }
    block
}

/// Fill `{{CompanyResearch2}}` with the key metrics.
pub fn fill_key_metrics(
    prs: &mut Presentation,
    payload: &Map<String, Value>,
    profile_name: Option<&str>,
) -> Result<bool> {
    fill_token(prs, KEY_METRICS_TOKEN, &key_metrics_block(payload, profile_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn lines(block: &TextBlock) -> Vec<String> {
        block.paragraphs.iter().map(|p| p.plain_text()).collect()
    }

    #[test]
    fn test_full_metrics() {
        let payload = obj(json!({
            "Financials": {
                "Latest Revenue": {
                    "Amount": "97.69 billion",
                    "Fiscal Year Close Date": "2023-12-31",
                    "Source": "https://ir.example.com/annual",
                    "SEC URL": "https://www.sec.gov/10k"
                },
                "Industry Average Gross Margin": {
                    "Industry": "Automotive",
                    "Average Gross Margin": "18.25%",
                    "URL": "https://stats.example.com"
                },
                "Gross Margin": {
                    "Gross Margin": "18.25",
                    "Fiscal Year": "2023"
                }
            },
            "Employee Count": {"Headcount": 140473, "As Of": "2023-12-31"}
        }));
        let block = key_metrics_block(&payload, Some("Tesla"));
        let text = lines(&block);

        // choose_link prefers the SEC filing found inside the revenue object
        assert_eq!(
            text[0],
            "Tesla reported an annual revenue of $97.69 billion USD for the fiscal year ending December 31, 2023 (https://www.sec.gov/10k)."
        );
        assert_eq!(text[1], "Additional filing: https://www.sec.gov/10k");
        assert_eq!(block.paragraphs[1].level, 1);
        assert_eq!(
            text[2],
            "The industry average gross margin for the \"Automotive\" industry is approximately 18.25% (https://stats.example.com)."
        );
        assert_eq!(
            text[3],
            "The company's gross margin for the fiscal year ending December 31, 2023 was 18.25%, matching the industry average ."
        );
        assert_eq!(
            text[4],
            "The company had 140,473 employees as of December 31, 2023 ."
        );
        assert_eq!(block.links().len(), 3);
    }

    #[test]
    fn test_degraded_wording() {
        let payload = obj(json!({
            "Company": "Fabrikam",
            "Revenue": {"Notes": "not disclosed"},
            "Employees": "about 500"
        }));
        let text = lines(&key_metrics_block(&payload, Some("Ignored")));
        assert_eq!(
            text,
            vec![
                "Fabrikam reported an annual revenue of an undisclosed amount for the fiscal year ending the latest fiscal year .",
                "The company had 500 employees as of the stated date .",
            ]
        );
    }

    #[test]
    fn test_fallback_amount_and_name() {
        let payload = obj(json!({"Sales": {"FY2023": "$4,500,000", "Count": 3}}));
        let text = lines(&key_metrics_block(&payload, None));
        assert!(text[0].starts_with("The company reported an annual revenue of $0.00 billion USD"));
    }

    #[test]
    fn test_resolve_company_name() {
        assert_eq!(resolve_company_name(&obj(json!({"Name": " Acme "})), Some("P")), "Acme");
        assert_eq!(resolve_company_name(&obj(json!({"Name": ""})), Some("Profile")), "Profile");
        assert_eq!(resolve_company_name(&Map::new(), None), "The company");
    }

    #[test]
    fn test_empty_payload() {
        assert!(key_metrics_block(&Map::new(), None).is_empty());
    }
}
