//! Error types for the researchdeck library.

use std::io;
use thiserror::Error;

/// Result type alias for researchdeck operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or delivering a report.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The package is not a presentation.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Error reading or writing the ZIP archive.
    #[error("ZIP archive error: {0}")]
    ZipArchive(String),

    /// Error parsing XML content.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// Error serializing XML content.
    #[error("XML write error: {0}")]
    XmlWrite(String),

    /// A required package part is missing.
    #[error("Missing component: {0}")]
    MissingComponent(String),

    /// Input data is missing or invalid.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The template lacks a placeholder or has an unexpected structure.
    #[error("Template error: {0}")]
    Template(String),

    /// Invalid JSON input.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Blob or table storage failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// HTTP status code this error maps to when surfaced to a caller.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::Json(_) => 400,
            _ => 500,
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipArchive(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlParse(err.to_string())
    }
}

#[cfg(feature = "azure")]
impl From<surf::Error> for Error {
    fn from(err: surf::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("missing company name".to_string());
        assert_eq!(err.to_string(), "Validation error: missing company name");

        let err = Error::UnsupportedFormat("word document".to_string());
        assert_eq!(err.to_string(), "Unsupported format: word document");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        assert_eq!(Error::Validation("x".into()).status_code(), 400);
        assert_eq!(Error::Template("x".into()).status_code(), 500);
        let json_err = serde_json::from_str::<serde_json::Value>("not-json").unwrap_err();
        assert_eq!(Error::from(json_err).status_code(), 400);
    }
}
