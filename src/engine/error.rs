//! Scrape error taxonomy.
//!
//! Connect errors end the run, fetch and persistence errors end the current
//! category. Extraction errors never reach this level: they are counted
//! against the item they occurred on (see [`crate::extract::ExtractionError`]).

use thiserror::Error;

use crate::fetch::FetchError;
use crate::repository::DbError;

/// Run-fatal startup failure.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("database unavailable: {0}")]
    Database(#[source] DbError),

    #[error("source '{0}' is not registered")]
    UnknownSource(String),

    #[error("browser unavailable: {0:#}")]
    Browser(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] DbError),
}
