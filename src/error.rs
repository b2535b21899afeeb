use std::path::PathBuf;
use std::time::Duration;

/// A non-empty, non-placeholder cell that does not parse as a number.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("not a number: {raw:?}")]
pub struct ParseError {
    pub raw: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
    #[error("{0:?} has no worksheets")]
    NoSheet(PathBuf),
    #[error("header row {row} not found in {path:?}")]
    MissingHeader { path: PathBuf, row: usize },
    #[error("row {0:?} not found")]
    MissingRow(String),
    #[error("cell {row:?}/{column:?}: {source}")]
    Cell {
        row: String,
        column: String,
        #[source]
        source: ParseError,
    },
    #[error("region {0:?} missing from region table")]
    UnknownRegion(String),
    #[error("sheet has too few columns ({0}) for a charging-station table")]
    NarrowSheet(usize),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("timed out after {timeout:?} waiting for {marker:?} on {url}")]
    Timeout {
        url: String,
        marker: String,
        timeout: Duration,
    },
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("webdriver {op}: {message}")]
    WebDriver { op: &'static str, message: String },
    #[error("invalid selector {0:?}")]
    Selector(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("weather API returned {code}: {message}")]
    Api { code: String, message: String },
}
