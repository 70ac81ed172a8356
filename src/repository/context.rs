//! Database context for managing the connection pool and repository access.
//!
//! Create one context per command or service, then use it to reach the
//! repositories. The catalog writer is the exception: it owns a dedicated
//! connection for the lifetime of a scrape run.

use diesel_async::SimpleAsyncConnection;

use super::catalog::{CatalogRepository, CatalogWriter};
use super::pool::{DbError, DbPool};
use super::run_log::RunLogRepository;
use super::source::SourceRepository;
use crate::with_conn;

const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS sources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        base_url TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        brand TEXT NOT NULL DEFAULT '',
        description TEXT,
        image_url TEXT,
        category TEXT,
        sku TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (name, brand)
    );

    CREATE TABLE IF NOT EXISTS price_snapshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL REFERENCES products(id),
        source_id INTEGER NOT NULL REFERENCES sources(id),
        price REAL NOT NULL,
        stock INTEGER,
        rating REAL,
        url TEXT NOT NULL,
        observed_at TEXT NOT NULL,
        observed_on TEXT NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_price_snapshots_daily
        ON price_snapshots(product_id, source_id, observed_on);
    CREATE INDEX IF NOT EXISTS idx_price_snapshots_observed
        ON price_snapshots(product_id, observed_at);

    CREATE TABLE IF NOT EXISTS run_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_id INTEGER NOT NULL REFERENCES sources(id),
        category_id INTEGER REFERENCES categories(id),
        category TEXT NOT NULL,
        found INTEGER NOT NULL,
        created INTEGER NOT NULL,
        duplicates INTEGER NOT NULL,
        errors INTEGER NOT NULL,
        duration_seconds REAL NOT NULL,
        outcome TEXT NOT NULL,
        logged_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_run_log_source
        ON run_log(source_id, logged_at);
"#;

/// Database context that manages the connection pool and provides repository access.
///
/// # Example
/// ```ignore
/// let ctx = DbContext::from_url("sqlite:wongprime.db")?;
/// ctx.init_schema().await?;
/// let wong = ctx.sources().get_by_name("Wong").await?;
/// ```
#[derive(Clone)]
pub struct DbContext {
    pool: DbPool,
}

impl DbContext {
    /// Create a new database context from a database URL.
    pub fn from_url(database_url: &str) -> Result<Self, DbError> {
        Ok(Self {
            pool: DbPool::from_url(database_url)?,
        })
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Get a source repository.
    pub fn sources(&self) -> SourceRepository {
        SourceRepository::new(self.pool.clone())
    }

    /// Get a catalog read repository.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// Get a run-log repository.
    pub fn run_log(&self) -> RunLogRepository {
        RunLogRepository::new(self.pool.clone())
    }

    /// Open a catalog writer on a dedicated connection.
    pub async fn catalog_writer(&self) -> Result<CatalogWriter, DbError> {
        let conn = self.pool.get().await?;
        Ok(CatalogWriter::new(conn))
    }

    /// Create the tables if they don't exist.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        with_conn!(self.pool, conn, {
            conn.batch_execute(SCHEMA_SQL).await?;
            Ok(())
        })
    }

    /// Get list of all tables in the database.
    pub async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        with_conn!(self.pool, conn, {
            let rows: Vec<TableName> = diesel_async::RunQueryDsl::load(
                diesel::sql_query(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                ),
                &mut conn,
            )
            .await?;
            Ok(rows.into_iter().map(|r| r.name).collect())
        })
    }
}

#[derive(diesel::QueryableByName)]
struct TableName {
    #[diesel(sql_type = diesel::sql_types::Text)]
    name: String,
}
