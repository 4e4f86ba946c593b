//! Company name and profile section.

use super::values::value_text;
use super::{fill_token, PROFILE_TOKEN};
use crate::error::{Error, Result};
use crate::model::{TextBlock, BULLET_SIZE_PT, SUB_BULLET_SIZE_PT};
use crate::pptx::Presentation;
use serde_json::{Map, Value};

const COMPANY_NAME_FIELD: &str = "Company Name";

/// Company name from a profile document shaped `{"data": [{"Company Name": ..}]}`.
///
/// The `data[0]` record must exist; a record without the field yields an
/// empty name, which leaves `{{CompanyName}}` blank.
pub fn company_name_from_profile(profile: &Map<String, Value>) -> Result<String> {
    let record = profile
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(Value::as_object)
        .ok_or_else(|| {
            Error::Validation("Company JSON missing expected 'data[0]' record".to_string())
        })?;
    match record.get(COMPANY_NAME_FIELD) {
        None | Some(Value::Null) => {
            tracing::warn!("company profile record has no 'Company Name'");
            Ok(String::new())
        }
        Some(Value::String(name)) => Ok(name.trim().to_string()),
        Some(_) => Err(Error::Validation(
            "Company JSON missing expected 'data[0]['Company Name']' field".to_string(),
        )),
    }
}

/// `k: v; k: v` for an object, the plain text for anything else.
pub(crate) fn inline_item(item: &Value) -> String {
    match item {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, value_text(v)))
            .collect::<Vec<_>>()
            .join("; "),
        other => value_text(other),
    }
}

/// Bullets for the profile text frame.
///
/// Top-level objects and arrays get a section header; their children
/// become bullets one level deep. A top-level `Company Name` is skipped
/// since it fills its own token.
pub fn profile_block(profile: &Map<String, Value>) -> TextBlock {
    let mut block = TextBlock::new();

    for (key, val) in profile {
        if key == COMPANY_NAME_FIELD {
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
                                block.bullet(inline_item(item), 1, SUB_BULLET_SIZE_PT);
                            }
                        }
                        Value::Object(grandchildren) => {
                            block.bullet(format!("{}:", k2), 0, BULLET_SIZE_PT);
                            for (kk, vv) in grandchildren {
                                block.bullet(
                                    format!("{}: {}", kk, value_text(vv)),
                                    1,
                                    SUB_BULLET_SIZE_PT,
                                );
                            }
                        }
                        scalar => {
                            block.bullet(format!("{}: {}", k2, value_text(scalar)), 0, BULLET_SIZE_PT)
                        }
                    }
                }
            }
            Value::Array(items) => {
                block.header(format!("{}:", key));
                for item in items {
                    block.bullet(inline_item(item), 1, SUB_BULLET_SIZE_PT);
                }
            }
            scalar => block.bullet(format!("{}: {}", key, value_text(scalar)), 0, BULLET_SIZE_PT),
        }
    }
    block
}

/// Fill `{{CompanyResearch1}}` with the profile.
pub fn fill_profile(prs: &mut Presentation, profile: &Map<String, Value>) -> Result<bool> {
    fill_token(prs, PROFILE_TOKEN, &profile_block(profile))
}
