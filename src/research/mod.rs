//! Research payload interpretation.
//!
//! Each submodule turns one research document into slide content:
//!
//! | Payload               | Token                    | Module          |
//! |-----------------------|--------------------------|-----------------|
//! | `CompanyReseachData1` | `{{CompanyName}}`, `{{CompanyResearch1}}` | [`company`] |
//! | `CompanyReseachData2` | `{{CompanyResearch2}}`   | [`key_metrics`] |
//! | `CompanyReseachData3` | `{{CompanyResearch3}}`   | [`highlights`]  |
//! | `IndustryResearch`    | `{{IndustryResearch}}`, `{{IndustryTitle}}` | [`industry`] |
//!
//! The request keys keep the `Reseach` spelling used by the callers.

pub mod company;
pub mod highlights;
pub mod industry;
pub mod key_metrics;
pub mod valuemap;
pub mod values;

use crate::error::{Error, Result};
use crate::model::TextBlock;
use crate::pptx::Presentation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const COMPANY_PROFILE_KEY: &str = "CompanyReseachData1";
pub const KEY_METRICS_KEY: &str = "CompanyReseachData2";
pub const HIGHLIGHTS_KEY: &str = "CompanyReseachData3";
pub const INDUSTRY_KEY: &str = "IndustryResearch";

/// Request keys in the order they are reported when missing.
pub const REQUIRED_KEYS: [&str; 4] = [COMPANY_PROFILE_KEY, KEY_METRICS_KEY, HIGHLIGHTS_KEY, INDUSTRY_KEY];

/// Both spellings of the company name placeholder.
pub const COMPANY_NAME_TOKENS: [&str; 2] = ["{{CompanyName}}", "{{ CompanyName }}"];
pub const PROFILE_TOKEN: &str = "{{CompanyResearch1}}";
pub const KEY_METRICS_TOKEN: &str = "{{CompanyResearch2}}";
pub const HIGHLIGHTS_TOKEN: &str = "{{CompanyResearch3}}";
pub const INDUSTRY_TOKEN: &str = "{{IndustryResearch}}";
pub const INDUSTRY_TITLE_TOKEN: &str = "{{IndustryTitle}}";

/// The four research documents behind one briefing deck.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchBundle {
    #[serde(rename = "CompanyReseachData1")]
    pub company_profile: Map<String, Value>,

    #[serde(rename = "CompanyReseachData2")]
    pub key_metrics: Map<String, Value>,

    #[serde(rename = "CompanyReseachData3")]
    pub highlights: Map<String, Value>,

    #[serde(rename = "IndustryResearch")]
    pub industry: Map<String, Value>,
}

impl ResearchBundle {
    /// Validate a request body and split it into the four documents.
    ///
    /// A body that is not an object is missing every key.
    pub fn from_value(body: Value) -> Result<Self> {
        let mut body = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|k| !body.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Validation(format!(
                "Missing required files: {}",
                missing.join(", ")
            )));
        }

        let mut take = |key: &str| match body.remove(key) {
            Some(Value::Object(map)) => Ok(map),
            _ => Err(Error::Validation(
                "All files must contain valid JSON objects".to_string(),
            )),
        };
        Ok(Self {
            company_profile: take(COMPANY_PROFILE_KEY)?,
            key_metrics: take(KEY_METRICS_KEY)?,
            highlights: take(HIGHLIGHTS_KEY)?,
            industry: take(INDUSTRY_KEY)?,
        })
    }

    /// Documents paired with their request keys, in request order.
    pub fn documents(&self) -> [(&'static str, &Map<String, Value>); 4] {
        [
            (COMPANY_PROFILE_KEY, &self.company_profile),
            (KEY_METRICS_KEY, &self.key_metrics),
            (HIGHLIGHTS_KEY, &self.highlights),
            (INDUSTRY_KEY, &self.industry),
        ]
    }

    /// Top-level field count over all four documents.
    pub fn total_fields(&self) -> usize {
        self.documents().iter().map(|(_, doc)| doc.len()).sum()
    }
}

/// Write a block into the shape holding `token`.
///
/// Returns `false` when no shape carries the token; templates may leave a
/// section out.
pub(crate) fn fill_token(prs: &mut Presentation, token: &str, block: &TextBlock) -> Result<bool> {
    let Some(shape) = prs.find_shape_with_token(token) else {
        tracing::warn!(token, "placeholder not found in template");
        return Ok(false);
    };
    prs.fill_text_frame(&shape, block)?;
    tracing::debug!(token, paragraphs = block.len(), "filled placeholder");
    Ok(true)
}
