//! Error types for the import pipeline, the datastore, and scraping.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("datastore is not configured: set datastore_url and datastore_key")]
    NotConfigured,
    #[error("datastore request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("datastore returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode datastore response: {0}")]
    Decode(String),
    #[error("no row with id {id} in {table}")]
    NotFound { table: String, id: String },
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("no data rows to import")]
    EmptyBatch,
    #[error("nothing has been parsed yet")]
    NothingParsed,
    #[error("reference tables are still loading")]
    ReferencesPending,
    #[error("reference tables failed to load: {0}")]
    ReferencesFailed(String),
    #[error("could not parse input: {0}")]
    Parse(String),
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("column not found in input: {0}")]
    UnknownHeader(String),
    #[error(transparent)]
    Datastore(#[from] DatastoreError),
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Parse(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("scrape endpoint is not configured")]
    NotConfigured,
    #[error("scrape request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("scraper reported an error: {0}")]
    Remote(String),
    #[error("invalid selector {0}")]
    Selector(String),
    #[error("no table found in page")]
    NoTable,
}
