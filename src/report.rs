//! Report generation: template plus research in, PPTX bytes out.

use crate::error::{Error, Result};
use crate::pptx::Presentation;
use crate::research::company::{company_name_from_profile, fill_profile};
use crate::research::highlights::fill_highlights;
use crate::research::industry::{fill_industry, IndustryOutcome};
use crate::research::key_metrics::fill_key_metrics;
use crate::research::{ResearchBundle, COMPANY_NAME_TOKENS};
use chrono::{DateTime, Utc};
use std::path::Path;

/// A generated briefing deck.
#[derive(Debug, Clone)]
pub struct Report {
    /// PPTX file contents.
    pub bytes: Vec<u8>,
    pub company_name: String,
    pub slide_count: usize,
    pub industry: IndustryOutcome,
}

/// Builds reports from a template held in memory.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    template: Vec<u8>,
}

impl ReportBuilder {
    /// Use template bytes.
    pub fn new(template: Vec<u8>) -> Self {
        Self { template }
    }

    /// Read the template from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let template = std::fs::read(path).map_err(|e| {
            Error::Template(format!("cannot read template {}: {}", path.display(), e))
        })?;
        Ok(Self::new(template))
    }

    /// Fill the template with one research bundle.
    ///
    /// The company name comes from the profile and is required; every other
    /// section is written when its placeholder exists.
    pub fn build(&self, bundle: &ResearchBundle) -> Result<Report> {
        let mut prs = Presentation::from_bytes(&self.template)?;

        let company_name = company_name_from_profile(&bundle.company_profile)?;
        let replaced = prs.replace_token_everywhere(&COMPANY_NAME_TOKENS, &company_name)?;
        tracing::debug!(company = %company_name, replaced, "company name placed");

        fill_profile(&mut prs, &bundle.company_profile)?;
        fill_key_metrics(&mut prs, &bundle.key_metrics, Some(&company_name))?;
        fill_highlights(&mut prs, &bundle.highlights)?;
        let industry = fill_industry(&mut prs, &bundle.industry, &company_name)?;

        let bytes = prs.to_bytes()?;
        tracing::info!(
            company = %company_name,
            slides = prs.slide_count(),
            size = bytes.len(),
            "report generated"
        );
        Ok(Report {
            bytes,
            company_name,
            slide_count: prs.slide_count(),
            industry,
        })
    }
}

/// Blob name for a report generated at `now`: `POC_YYYYMMDD_HHMMSS_mmm.pptx`.
pub fn output_file_name(now: DateTime<Utc>) -> String {
    format!("POC_{}.pptx", now.format("%Y%m%d_%H%M%S_%3f"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pptx::starter_template;
    use chrono::TimeZone;
    use serde_json::json;

    fn bundle() -> ResearchBundle {
        ResearchBundle::from_value(json!({
            "CompanyReseachData1": {"data": [{"Company Name": "Contoso", "Founded": 1975}]},
            "CompanyReseachData2": {"Employees": 1200},
            "CompanyReseachData3": {"News": ["Opened a new office"]},
            "IndustryResearch": {"Industry Name": "Software", "Growth Rate": "4%"}
        }))
        .unwrap()
    }

    #[test]
    fn test_output_file_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(output_file_name(now), "POC_20240309_070502_042.pptx");
    }

    #[test]
    fn test_build_fills_every_token() {
        let report = ReportBuilder::new(starter_template().unwrap())
            .build(&bundle())
            .unwrap();
        assert_eq!(report.company_name, "Contoso");
        assert_eq!(report.slide_count, 4);
        assert_eq!(report.industry, IndustryOutcome::Bullets);

        let prs = Presentation::from_bytes(&report.bytes).unwrap();
        let all: Vec<String> = (0..prs.slide_count()).flat_map(|i| prs.slide_texts(i)).collect();
        assert!(all.iter().all(|t| !t.contains("{{")), "{:?}", all);
        assert!(all.contains(&"Contoso Research Briefing".to_string()));
        assert!(all.iter().any(|t| t.contains("• Company Name: Contoso; Founded: 1975")));
        assert!(all.iter().any(|t| t.contains("1,200 employees")));
        assert!(all.iter().any(|t| t.contains("• Opened a new office")));
        assert!(all.iter().any(|t| t.contains("4.00%")));
    }

    #[test]
    fn test_build_requires_company_name() {
        let mut bundle = bundle();
        bundle.company_profile = serde_json::Map::new();
        let err = ReportBuilder::new(starter_template().unwrap())
            .build(&bundle)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_build_with_unnamed_record() {
        let mut bundle = bundle();
        bundle.company_profile = json!({"data": [{"Name": "Contoso"}]})
            .as_object()
            .cloned()
            .unwrap();
        let report = ReportBuilder::new(starter_template().unwrap())
            .build(&bundle)
            .unwrap();
        assert_eq!(report.company_name, "");

        let prs = Presentation::from_bytes(&report.bytes).unwrap();
        assert!(prs.slide_texts(0).contains(&" Research Briefing".to_string()));
        assert!(prs.slide_texts(1).iter().any(|t| t.contains("The company had 1,200 employees")));
    }

    #[test]
    fn test_missing_template() {
        let err = ReportBuilder::from_path("/nonexistent/template.pptx").unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }
}
