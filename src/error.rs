use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the remote catalog service.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl CatalogError {
    /// Rate-limit rejections and server-side errors are the only retryable kind.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            CatalogError::Http(e) => e.is_timeout() || e.is_connect(),
            CatalogError::Auth(_) => false,
        }
    }
}

/// Fatal failures of a pipeline run. Misses and key collisions are counted, not raised.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("search request failed at offset {offset}")]
    Search {
        offset: usize,
        #[source]
        source: CatalogError,
    },

    #[error("feature lookup failed for batch {batch} (ids {first}..={last})")]
    Lookup {
        batch: usize,
        first: usize,
        last: usize,
        #[source]
        source: CatalogError,
    },

    #[error("schema violation at {position}: {reason}")]
    Schema { position: String, reason: String },

    #[error("failed to write dataset to {path:?}")]
    Sink {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl PipelineError {
    pub fn schema(position: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Schema {
            position: position.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("{key} must be between 1 and {max}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: usize,
        max: usize,
    },

    #[error("{key} = {value:?} is not supported; only {expected:?} results can be projected into tracks")]
    Unsupported {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("no credentials: set CATALOG_ACCESS_TOKEN or both CATALOG_CLIENT_ID and CATALOG_CLIENT_SECRET")]
    MissingCredentials,
}
