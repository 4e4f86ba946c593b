//! Highlights section: hierarchical bullets from free-form research.
//!
//! Nothing here depends on fixed key names. Each top-level key is a
//! section; its items are found by looking for a natural list, the main
//! line of each item is picked by scoring its fields, and the remaining
//! fields follow as sub-bullets ordered summary, dates, values, links.

use super::values::{extract_urls, is_scalar, is_url, norm, parse_date, value_text};
use super::{fill_token, HIGHLIGHTS_TOKEN};
use crate::error::Result;
use crate::model::{TextBlock, TextRun, BULLET_SIZE_PT, SUB_BULLET_SIZE_PT};
use crate::pptx::Presentation;
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Font size of link lines nested under list entries.
const LINK_SIZE_PT: u32 = 11;

const LIST_WORDS: [&str; 6] = ["list", "items", "entries", "highlights", "data", "points"];
const TITLE_WORDS: [&str; 6] = ["title", "name", "headline", "subject", "summary", "objective"];
const SUMMARY_WORDS: [&str; 4] = ["summary", "description", "details", "overview"];
const DATE_WORDS: [&str; 4] = ["date", "as of", "fiscal year", "fy"];
const LINK_WORDS: [&str; 4] = ["url", "link", "source", "reference"];

fn contains_any(haystack: &str, words: &[&str]) -> bool {
    words.iter().any(|w| haystack.contains(w))
}

/// Items of a section and the object holding its metadata, if any.
fn section_items(value: &Value) -> (Cow<'_, [Value]>, Option<&Map<String, Value>>) {
    match value {
        Value::Object(map) => {
            let natural = map
                .iter()
                .find(|(k, v)| v.is_array() && contains_any(&norm(k), &LIST_WORDS))
                .map(|(_, v)| v);
            let list = natural.or_else(|| map.values().find(|v| v.is_array()));
            match list.and_then(Value::as_array) {
                Some(items) => (Cow::Borrowed(items.as_slice()), Some(map)),
                None => (Cow::Owned(vec![value.clone()]), Some(map)),
            }
        }
        Value::Array(items) => (Cow::Borrowed(items.as_slice()), None),
        scalar => {
            let mut item = Map::new();
            item.insert("Value".to_string(), scalar.clone());
            (Cow::Owned(vec![Value::Object(item)]), None)
        }
    }
}

/// Score of a bare URL: what a ten-character string gets, so any longer
/// text or a title-like key wins the headline over a link.
const URL_SCORE: f64 = 0.05;

/// How well a field works as the headline of its item.
fn main_score(key: &str, value: &Value) -> f64 {
    let base = match value {
        Value::String(s) if is_url(s) => return URL_SCORE,
        Value::String(s) => s.trim().chars().count().min(200) as f64 / 200.0,
        Value::Number(_) | Value::Bool(_) => 0.4,
        Value::Object(_) => 0.3,
        Value::Array(_) => 0.35,
        Value::Null => 0.2,
    };
    if contains_any(&norm(key), &TITLE_WORDS) {
        base + 0.3
    } else {
        base
    }
}

/// Pick the headline of an item: `(key used, text)`.
fn choose_main_text(item: &Map<String, Value>) -> (Option<&str>, String) {
    let mut best: Option<(&str, &Value, f64)> = None;
    for (k, v) in item {
        let score = main_score(k, v);
        if best.is_none_or(|(_, _, s)| score > s) {
            best = Some((k, v, score));
        }
    }

    if let Some((k, Value::String(s), _)) = best {
        if !s.trim().is_empty() {
            return (Some(k), s.trim().to_string());
        }
    }
    if let Some((k, s)) = item
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k, s.trim())))
        .find(|(_, s)| !s.is_empty() && !is_url(s))
    {
        return (Some(k.as_str()), s.to_string());
    }

    let compact = item
        .iter()
        .filter(|(_, v)| !v.is_null() && v.as_str() != Some(""))
        .map(|(k, v)| format!("{}: {}", k, value_text(v)))
        .collect::<Vec<_>>()
        .join("; ");
    (best.map(|(k, _, _)| k), compact)
}

fn key_priority(key: &str, value: &Value) -> u8 {
    let nk = norm(key);
    if contains_any(&nk, &SUMMARY_WORDS) {
        0
    } else if contains_any(&nk, &DATE_WORDS) {
        1
    } else if value.as_str().is_some_and(is_url) || contains_any(&nk, &LINK_WORDS) {
        3
    } else {
        2
    }
}

/// Remaining keys of an item, ordered by priority then normalized name.
fn ordered_subkeys<'a>(item: &'a Map<String, Value>, main_key: Option<&str>) -> Vec<&'a str> {
    let mut keys: Vec<&str> = item
        .keys()
        .map(String::as_str)
        .filter(|k| Some(*k) != main_key)
        .collect();
    keys.sort_by_cached_key(|k| (key_priority(k, &item[*k]), norm(k)));
    keys
}

/// ` (FY <date>)` or ` (<date>)` from the first date-like metadata field.
fn section_suffix(meta: Option<&Map<String, Value>>) -> String {
    let Some(meta) = meta else {
        return String::new();
    };
    let found = meta.iter().find_map(|(k, v)| {
        let nk = norm(k);
        let s = v.as_str()?;
        contains_any(&nk, &["fiscal year", "as of", "date"]).then_some((nk, s))
    });
    match found {
        Some((nk, s)) => {
            let nice = parse_date(s);
            if nice.is_empty() {
                String::new()
            } else if nk.contains("fiscal year") {
                format!(" (FY {})", nice)
            } else {
                format!(" ({})", nice)
            }
        }
        None => String::new(),
    }
}

/// Render one field as bullets at `level`, recursing into objects.
fn emit_value(block: &mut TextBlock, label: &str, value: &Value, level: u8) {
    match value {
        Value::Null => {}
        Value::String(s) if s.is_empty() => {}
        Value::String(s) if is_url(s) => block.bullet_runs(
            vec![TextRun::plain(format!("{}: ", label)), TextRun::link(s.clone(), s.clone())],
            level,
            SUB_BULLET_SIZE_PT,
        ),
        Value::Array(items) if items.iter().all(is_scalar) => {
            for x in items {
                block.bullet(format!("{}: {}", label, value_text(x)), level, SUB_BULLET_SIZE_PT);
            }
        }
        Value::Array(items) => {
            for x in items {
                match x {
                    Value::Object(entry) => {
                        let (_, main) = choose_main_text(entry);
                        block.bullet(format!("{}: {}", label, main), level, SUB_BULLET_SIZE_PT);
                        for url in extract_urls(x) {
                            block.bullet_runs(
                                vec![TextRun::plain("link: "), TextRun::link(url.clone(), url)],
                                level + 1,
                                LINK_SIZE_PT,
                            );
                        }
                    }
                    other => block.bullet(
                        format!("{}: {}", label, value_text(other)),
                        level,
                        SUB_BULLET_SIZE_PT,
                    ),
                }
            }
        }
        Value::Object(entry) => {
            let (main_key, main) = choose_main_text(entry);
            block.bullet(format!("{}: {}", label, main), level, SUB_BULLET_SIZE_PT);
            for key in ordered_subkeys(entry, main_key) {
                emit_value(block, key, &entry[key], level + 1);
            }
        }
        Value::String(s) if contains_any(&norm(label), &DATE_WORDS) => {
            block.bullet(format!("{}: {}", label, parse_date(s)), level, SUB_BULLET_SIZE_PT)
        }
        scalar => block.bullet(
            format!("{}: {}", label, value_text(scalar)),
            level,
            SUB_BULLET_SIZE_PT,
        ),
    }
}

/// Hierarchical bullets for every section of the payload.
pub fn highlights_block(payload: &Map<String, Value>) -> TextBlock {
    let mut block = TextBlock::new();

    for (section, value) in payload {
        let (items, meta) = section_items(value);
        block.header(format!("{}{}:", section, section_suffix(meta)));

        for item in items.iter() {
            match item {
                Value::Object(entry) => {
                    let (main_key, main) = choose_main_text(entry);
                    block.bullet(main, 0, BULLET_SIZE_PT);
                    for key in ordered_subkeys(entry, main_key) {
                        emit_value(&mut block, key, &entry[key], 1);
                    }
                }
                Value::Array(inner) => {
                    for x in inner {
                        block.bullet(value_text(x), 0, BULLET_SIZE_PT);
                    }
                }
                other => block.bullet(value_text(other), 0, BULLET_SIZE_PT),
            }
        }
    }
    block
}

/// Fill `{{CompanyResearch3}}` with the highlights.
pub fn fill_highlights(prs: &mut Presentation, payload: &Map<String, Value>) -> Result<bool> {
    fill_token(prs, HIGHLIGHTS_TOKEN, &highlights_block(payload))
}
