//! Value helpers shared by the research renderers.
//!
//! Research payloads come from different tools and rarely agree on key
//! names, number formats or date formats. These helpers normalize keys,
//! look values up by synonyms and format numbers for slides.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use unicode_normalization::UnicodeNormalization;

/// Normalize a key for matching: NFKC, collapse whitespace, trim, lowercase.
pub fn norm(s: &str) -> String {
    let normalized: String = s.nfkc().collect();
    normalized
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether a string is an http(s) URL.
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Text shown for a JSON value on a slide.
///
/// Strings are shown as-is and `null` as nothing; everything else uses its
/// compact JSON form.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether a value is a string, number or boolean.
pub fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Every URL string found anywhere inside a value, in document order.
pub fn extract_urls(value: &Value) -> Vec<String> {
    let mut urls = Vec::new();
    collect_urls(value, &mut urls);
    urls
}

fn collect_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if is_url(s) => out.push(s.clone()),
        Value::Object(map) => map.values().for_each(|v| collect_urls(v, out)),
        Value::Array(items) => items.iter().for_each(|v| collect_urls(v, out)),
        _ => {}
    }
}

/// Human readable date (`January 31, 2024`).
///
/// Accepts ISO dates and date-times, `YYYY-MM` (first of the month) and
/// `YYYY` (December 31). Anything else is returned trimmed but otherwise
/// unchanged; blank input gives an empty string.
pub fn parse_date(s: &str) -> String {
    let t = s.trim();
    if t.is_empty() {
        return String::new();
    }
    const FORMAT: &str = "%B %d, %Y";

    if let Ok(date) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        return date.format(FORMAT).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, pattern) {
            return dt.format(FORMAT).to_string();
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return dt.format(FORMAT).to_string();
    }

    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if t.is_ascii() && t.len() == 7 && t.as_bytes()[4] == b'-' && digits(&t[..4]) && digits(&t[5..]) {
        return NaiveDate::parse_from_str(&format!("{}-01", t), "%Y-%m-%d")
            .map(|d| d.format(FORMAT).to_string())
            .unwrap_or_else(|_| t.to_string());
    }
    if t.is_ascii() && t.len() == 4 && digits(t) {
        return t
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 12, 31))
            .map(|d| d.format(FORMAT).to_string())
            .unwrap_or_else(|| t.to_string());
    }
    t.to_string()
}

/// Parse a number out of a JSON value.
///
/// Handles plain numbers, `"97.69 billion"`, `"$3 million"` and
/// `"$97,690,000,000"`. Objects, arrays, booleans and `null` give `None`.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number_str(s),
        _ => None,
    }
}

/// Parse a number out of text; see [`parse_number`].
pub fn parse_number_str(s: &str) -> Option<f64> {
    if let Some(n) = parse_scaled(s) {
        return Some(n);
    }
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// `[$] <digits> billion|million` at the start of the text.
fn parse_scaled(s: &str) -> Option<f64> {
    let rest = s.trim_start();
    let rest = rest.strip_prefix('$').unwrap_or(rest).trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(rest.len());
    let (number, tail) = rest.split_at(end);
    if number.is_empty() {
        return None;
    }

    let tail = tail.trim_start().to_lowercase();
    let multiplier = if tail.starts_with("billion") {
        1e9
    } else if tail.starts_with("million") {
        1e6
    } else {
        return None;
    };
    let word_end = tail["billion".len()..].chars().next();
    if word_end.is_some_and(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }

    // A comma is a decimal separator only when there is no dot.
    let base = if number.contains('.') {
        number.replace(',', "")
    } else {
        number.replace(',', ".")
    };
    base.parse::<f64>().ok().map(|n| n * multiplier)
}

/// Parse a percentage (`45.2%`, `"45,2"`, `45`) as a 0-100 number.
pub fn parse_percent(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_percent_str(s),
        _ => None,
    }
}

/// Parse a percentage out of text; see [`parse_percent`].
pub fn parse_percent_str(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', ".");
    let s = s.strip_suffix('%').unwrap_or(&s).trim_end();

    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    let all_digits = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || frac_part.is_some_and(|f| !all_digits(f)) {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Group the digits of an integer with `sep` every three places.
fn group_digits(n: i64, sep: char) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}

/// Currency with dot thousands separators: `$1.234.567`.
///
/// The fractional part is truncated.
pub fn fmt_currency(n: f64) -> String {
    format!("${}", group_digits(n.trunc() as i64, '.'))
}

/// `$97.69 billion USD`.
pub fn fmt_billions_usd(n: f64) -> String {
    format!("${:.2} billion USD", n / 1e9)
}

/// Integer with comma thousands separators: `161,000`.
pub fn fmt_thousands(n: i64) -> String {
    group_digits(n, ',')
}

/// Pick a link from the candidates, preferring SEC filings.
///
/// String candidates count when they are URLs; objects and arrays
/// contribute every URL inside them.
pub fn choose_link(candidates: &[Option<&Value>]) -> Option<String> {
    let urls: Vec<String> = candidates
        .iter()
        .flatten()
        .flat_map(|candidate| match candidate {
            Value::String(s) if is_url(s) => vec![s.clone()],
            Value::Object(_) | Value::Array(_) => extract_urls(candidate),
            _ => Vec::new(),
        })
        .collect();

    urls.iter()
        .find(|u| u.contains("sec.gov"))
        .or_else(|| urls.first())
        .cloned()
}

fn key_matches(key: &str, synonyms: &[&str], excluded: &[&str]) -> bool {
    let nk = norm(key);
    synonyms.iter().any(|s| nk.contains(s)) && !excluded.iter().any(|x| nk.contains(x))
}

fn as_object(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other.clone());
            map
        }
    }
}

/// First value on this level whose normalized key contains a synonym.
///
/// Object hits are returned as-is; anything else is wrapped as
/// `{"value": v}`.
pub fn find_in_object(obj: &Map<String, Value>, synonyms: &[&str]) -> Option<Map<String, Value>> {
    find_excluding(obj, synonyms, &[])
}

fn find_excluding(
    obj: &Map<String, Value>,
    synonyms: &[&str],
    excluded: &[&str],
) -> Option<Map<String, Value>> {
    obj.iter()
        .find(|(k, _)| key_matches(k, synonyms, excluded))
        .map(|(_, v)| as_object(v))
}

/// Like [`find_in_object`], descending into nested objects and arrays.
pub fn deep_find(obj: &Map<String, Value>, synonyms: &[&str]) -> Option<Map<String, Value>> {
    deep_find_excluding(obj, synonyms, &[])
}

/// [`deep_find`] that ignores keys containing any of `excluded`.
pub fn deep_find_excluding(
    obj: &Map<String, Value>,
    synonyms: &[&str],
    excluded: &[&str],
) -> Option<Map<String, Value>> {
    if let Some(hit) = find_excluding(obj, synonyms, excluded) {
        return Some(hit);
    }
    obj.values().find_map(|v| match v {
        Value::Object(inner) => deep_find_excluding(inner, synonyms, excluded),
        Value::Array(items) => items.iter().find_map(|item| match item {
            Value::Object(inner) => deep_find_excluding(inner, synonyms, excluded),
            _ => None,
        }),
        _ => None,
    })
}

/// First non-empty string on this level whose key contains a synonym.
pub fn first_str<'a>(obj: &'a Map<String, Value>, synonyms: &[&str]) -> Option<&'a str> {
    obj.iter()
        .filter(|(k, _)| key_matches(k, synonyms, &[]))
        .find_map(|(_, v)| v.as_str().filter(|s| !s.is_empty()))
}

/// Try each synonym in turn and return the first string found.
pub fn first_str_in_order<'a>(obj: &'a Map<String, Value>, synonyms: &[&str]) -> Option<&'a str> {
    synonyms.iter().find_map(|s| first_str(obj, &[s]))
}
