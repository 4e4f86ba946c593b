//! # researchdeck
//!
//! Fill PowerPoint research briefing templates from structured JSON.
//!
//! A request carries four research documents: a company profile, key
//! metrics, highlights and industry research. Each one lands on the
//! template slide holding its `{{Token}}` placeholder; industry data that
//! forms a table is paginated over as many slides as it needs.
//!
//! ## Quick Start
//!
//! ```no_run
//! use researchdeck::{ReportBuilder, ResearchBundle};
//!
//! let body: serde_json::Value = serde_json::from_str(&std::fs::read_to_string("request.json")?)?;
//! let bundle = ResearchBundle::from_value(body)?;
//!
//! let report = ReportBuilder::from_path("template.pptx")?.build(&bundle)?;
//! std::fs::write("briefing.pptx", &report.bytes)?;
//! println!("{}: {} slides", report.company_name, report.slide_count);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Serving requests
//!
//! [`AgentService`] wraps report generation with storage: it validates the
//! request, uploads the deck to a [`storage::BlobStore`] and records the
//! request in a [`storage::ActivityLog`].
//!
//! ## Features
//!
//! - `azure` (default): Azure Blob and Table storage over SAS-signed REST

pub mod config;
pub mod container;
pub mod error;
pub mod model;
pub mod pptx;
pub mod report;
pub mod research;
pub mod service;
pub mod storage;
pub mod xml;

// Re-exports
pub use config::{Settings, Storage, StorageBackend};
pub use container::{Package, Relationship, Relationships};
pub use error::{Error, Result};
pub use model::{Table, TextBlock, TextRun};
pub use pptx::{starter_template, Presentation};
pub use report::{output_file_name, Report, ReportBuilder};
pub use research::ResearchBundle;
pub use service::{AgentResponse, AgentService};
