//! Repository layer for database persistence.
//!
//! All database access goes through Diesel on SQLite.

pub mod catalog;
pub mod context;
pub mod models;
pub mod pool;
pub mod run_log;
pub mod source;
pub mod util;

pub use catalog::{CatalogRepository, CatalogWriter};
pub use context::DbContext;
pub use pool::{DbError, DbPool, SqliteConn};
pub use run_log::RunLogRepository;
pub use source::SourceRepository;

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

