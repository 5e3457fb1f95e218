use std::io;

use thiserror::Error;

/// Affiliate-link policy violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkViolation {
    #[error("not a valid URL: {url}")]
    InvalidUrl { url: String },
    #[error("host '{host}' is not an allow-listed affiliate domain")]
    InvalidDomain { host: String },
    #[error("missing affiliate tracking parameter")]
    MissingTracking,
    #[error(
        "multiple tracking parameters found ({}), affiliate policy violation",
        found.join(", ")
    )]
    DuplicateTracking { found: Vec<String> },
    #[error("wrong tracking ID: found '{found}', expected '{expected}'")]
    WrongTrackingId { found: String, expected: String },
}

/// Error type shared by every pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("schema error: {0}")]
    Schema(String),
    #[error("'{name}' matches more than one record: {}", matches.join(", "))]
    MatchAmbiguity { name: String, matches: Vec<String> },
    #[error("marker not found: {marker}")]
    MarkerNotFound { marker: String },
    #[error("marker occurs {count} times: {marker}")]
    DuplicateMarker { marker: String, count: usize },
    #[error("invalid fragment: {0}")]
    InvalidFragment(String),
    #[error(transparent)]
    Link(#[from] LinkViolation),
    #[error("golden data drift in {}", chunks.join(", "))]
    HashMismatch { chunks: Vec<String> },
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
