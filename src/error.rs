use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Missing files: the {what} file cannot be read: {}", path.display())]
    MissingFile {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {}: {source}", path.display())]
    InvalidFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Credential `{key}` missing for {platform}")]
    MissingCredential { platform: &'static str, key: String },

    #[error("HTTP status error: {status} {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication rejected by {platform}: {message}")]
    Auth {
        platform: &'static str,
        message: String,
    },

    #[error("Invalid API url: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid item timestamp: {0}")]
    Timestamp(String),

    #[error("Table schema mismatch in {}: expected {expected:?}, found {found:?}", path.display())]
    SchemaMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Row has {found} fields, table has {expected} columns")]
    RowWidth { expected: usize, found: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CollectError>;
