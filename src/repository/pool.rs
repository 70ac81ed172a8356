//! SQLite connection handling.
//!
//! SQLite connections are lightweight, so the pool opens one per request
//! instead of keeping a fixed set around. `SyncConnectionWrapper` moves each
//! call onto tokio's blocking pool.

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, SimpleAsyncConnection};

use super::util::{server_scheme, to_diesel_error};

/// Diesel error type alias.
pub type DbError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

/// Pragmas applied to every new connection.
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

/// SQLite connection factory.
#[derive(Clone, Debug)]
pub struct DbPool {
    database_url: String,
}

impl DbPool {
    /// Create a pool from a database URL.
    ///
    /// Accepts `sqlite:path/to/db.sqlite`, `sqlite://path` or a bare file path.
    pub fn from_url(url: &str) -> Result<Self, DbError> {
        if let Some(scheme) = server_scheme(url) {
            return Err(to_diesel_error(format!(
                "unsupported database scheme '{scheme}' (only SQLite is available)"
            )));
        }

        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);

        Ok(Self {
            database_url: path.to_string(),
        })
    }

    /// Open a connection with foreign keys enforced.
    pub async fn get(&self) -> Result<SqliteConn, DbError> {
        let mut conn = SqliteConn::establish(&self.database_url)
            .await
            .map_err(to_diesel_error)?;
        conn.batch_execute(CONNECTION_PRAGMAS).await?;
        Ok(conn)
    }

    /// Get the database path or URL this pool connects to.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

/// Run a block against a fresh connection from the pool.
///
/// # Example
/// ```ignore
/// with_conn!(self.pool, conn, {
///     sources::table.load::<SourceRecord>(&mut conn).await
/// })
/// ```
#[macro_export]
macro_rules! with_conn {
    ($pool:expr, $conn:ident, $body:expr) => {{
        let mut $conn = $pool.get().await?;
        $body
    }};
}
