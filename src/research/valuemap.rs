//! ValueMap benefit tables.
//!
//! A ValueMap describes business benefits as a list of row objects, either
//! bare, under `BenefitTable`, or under some other key. This module turns
//! such a list into the industry [`Table`].

use super::values::value_text;
use crate::error::{Error, Result};
use crate::model::Table;
use serde_json::{Map, Value};

/// Column order used when the columns are present; others follow
/// alphabetically.
pub const PREFERRED_HEADER_ORDER: [&str; 11] = [
    "Challenge",
    "Description",
    "ScenarioRecordID",
    "KPI",
    "Workload",
    "BenefitFormula",
    "Inputs",
    "CalculatedBenefit",
    "CalculatedBenefitUSD",
    "BenefitCurrency",
    "Notes",
];

const BENEFIT_TABLE_KEY: &str = "BenefitTable";

fn is_object_list(value: &Value) -> bool {
    value
        .as_array()
        .and_then(|items| items.first())
        .is_some_and(Value::is_object)
}

/// Whether the data holds a benefit table in any supported layout.
pub fn is_valuemap_format(data: &Value) -> bool {
    match data {
        Value::Array(_) => is_object_list(data),
        Value::Object(map) => {
            map.get(BENEFIT_TABLE_KEY).is_some_and(Value::is_array) || map.values().any(is_object_list)
        }
        _ => false,
    }
}

/// The benefit rows: a bare list of objects, a non-empty `BenefitTable`,
/// or the first list of objects under any key.
pub fn extract_benefit_table(data: &Value) -> Option<&[Value]> {
    match data {
        Value::Array(items) => is_object_list(data).then_some(items.as_slice()),
        Value::Object(map) => {
            if let Some(Value::Array(rows)) = map.get(BENEFIT_TABLE_KEY) {
                if !rows.is_empty() {
                    return Some(rows.as_slice());
                }
            }
            map.values()
                .find(|v| is_object_list(v))
                .and_then(Value::as_array)
                .map(Vec::as_slice)
        }
        _ => None,
    }
}

/// Lists of objects do not flatten into a readable cell.
fn is_complex(value: &Value) -> bool {
    is_object_list(value)
}

/// Cell text: objects as `k: v; k: v`, lists as `a, b`, null as empty.
pub fn flatten_value(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, value_text(v)))
            .collect::<Vec<_>>()
            .join("; "),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        other => value_text(other),
    }
}

/// Headers from the first row, preferred columns first.
fn extract_headers(first_row: &Map<String, Value>) -> Vec<String> {
    let mut remaining: Vec<&str> = first_row
        .iter()
        .filter(|(_, v)| !is_complex(v))
        .map(|(k, _)| k.as_str())
        .collect();

    let mut headers: Vec<String> = Vec::with_capacity(remaining.len());
    for preferred in PREFERRED_HEADER_ORDER {
        if let Some(pos) = remaining.iter().position(|k| *k == preferred) {
            remaining.remove(pos);
            headers.push(preferred.to_string());
        }
    }
    remaining.sort_unstable();
    headers.extend(remaining.into_iter().map(str::to_string));
    headers
}

/// Table title for a company.
pub fn table_title(company_name: &str) -> String {
    let name = company_name.trim();
    if name.is_empty() {
        "Value Map Benefit Table".to_string()
    } else {
        format!("{} Value Map Benefit Table", name)
    }
}

/// Build the benefit table.
///
/// Without benefit rows the table has a title but no columns. Rows that
/// are not objects are skipped.
pub fn transform(valuemap: &Value, company_name: &str) -> Result<Table> {
    let title = table_title(company_name);
    let Some(rows) = extract_benefit_table(valuemap) else {
        tracing::warn!("no benefit table found in ValueMap");
        return Ok(Table::new(title, Vec::new()));
    };

    let first = rows
        .first()
        .and_then(Value::as_object)
        .ok_or_else(|| Error::Validation("BenefitTable rows must be objects".to_string()))?;
    let headers = extract_headers(first);

    let mut table = Table::new(title, headers);
    for row in rows {
        let Some(row) = row.as_object() else {
            tracing::warn!("skipping non-object row in BenefitTable");
            continue;
        };
        let cells = table
            .headers
            .iter()
            .map(|h| row.get(h).map(flatten_value).unwrap_or_default())
            .collect();
        table.add_row(cells);
    }

    tracing::info!(
        headers = table.column_count(),
        rows = table.row_count(),
        "transformed ValueMap benefit table"
    );
    Ok(table)
}
