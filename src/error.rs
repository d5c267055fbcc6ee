//! Error types for ddr-checker

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while analyzing a DDR export
#[derive(Error, Debug)]
pub enum DdrError {
    #[error("Failed to read DDR file: {path}")]
    InputReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse DDR XML: {path}")]
    XmlParseError {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Invalid DDR document: {message}")]
    InvalidDocument { message: String },

    #[error("Failed to write report to {path}")]
    ReportWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {message}")]
    ReportSerializeError { message: String },
}

impl From<serde_json::Error> for DdrError {
    fn from(err: serde_json::Error) -> Self {
        DdrError::ReportSerializeError {
            message: err.to_string(),
        }
    }
}
