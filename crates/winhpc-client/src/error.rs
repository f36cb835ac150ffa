//! Error types for Windows HPC Web API client operations
//!
//! Only protocol and programming faults are errors. A request that reaches
//! the wire and fails (connection refused, non-200 status) is reported through
//! [`crate::Outcome::Failed`] instead.

use thiserror::Error;

use crate::version::ApiVersion;

/// Result type alias for HPC client operations
pub type Result<T> = std::result::Result<T, HpcClientError>;

/// Faults raised by the HPC client
#[derive(Error, Debug)]
pub enum HpcClientError {
    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client misconfiguration or misuse of the low-level request entry point
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation not available for the configured api-version
    #[error("{operation} requires api-version {required} or later (configured: {})", version_label(.configured))]
    Unsupported {
        operation: &'static str,
        required: ApiVersion,
        configured: Option<ApiVersion>,
    },

    /// Response body is not well-formed XML
    #[error("Malformed XML response: {0}")]
    Parse(#[from] roxmltree::Error),

    /// Response XML is well-formed but lacks a required element
    #[error("Unexpected response structure: {0}")]
    Structure(String),

    /// No cluster name was given and none could be discovered
    #[error("Cluster discovery failed: {0}")]
    ClusterDiscovery(String),
}

fn version_label(version: &Option<ApiVersion>) -> &'static str {
    version.as_ref().map(ApiVersion::as_str).unwrap_or("none")
}

impl HpcClientError {
    pub fn structure(message: impl Into<String>) -> Self {
        Self::Structure(message.into())
    }
}
