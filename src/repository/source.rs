//! Source and category repository.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{CategoryRecord, NewCategory, NewSource, SourceRecord};
use super::parse_datetime;
use super::pool::{DbError, DbPool};
use crate::models::{Category, Source};
use crate::schema::{categories, sources};
use crate::with_conn;

impl From<SourceRecord> for Source {
    fn from(record: SourceRecord) -> Self {
        Source {
            id: record.id,
            name: record.name,
            base_url: record.base_url,
            created_at: parse_datetime(&record.created_at),
        }
    }
}

impl From<CategoryRecord> for Category {
    fn from(record: CategoryRecord) -> Self {
        Category {
            path: record.path,
            name: record.name,
        }
    }
}

/// Read and seed access to `sources` and `categories`.
#[derive(Clone)]
pub struct SourceRepository {
    pool: DbPool,
}

impl SourceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Look up a source by its unique name.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Source>, DbError> {
        with_conn!(self.pool, conn, {
            sources::table
                .filter(sources::name.eq(name))
                .select(SourceRecord::as_select())
                .first(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(Source::from))
        })
    }

    /// Get all sources ordered by name.
    pub async fn get_all(&self) -> Result<Vec<Source>, DbError> {
        with_conn!(self.pool, conn, {
            sources::table
                .order(sources::name.asc())
                .select(SourceRecord::as_select())
                .load(&mut conn)
                .await
                .map(|records| records.into_iter().map(Source::from).collect())
        })
    }

    /// Register a source, updating its base URL if it already exists.
    pub async fn ensure(&self, name: &str, base_url: &str) -> Result<Source, DbError> {
        let created_at = Utc::now().to_rfc3339();
        let record = NewSource {
            name,
            base_url,
            created_at: &created_at,
        };

        with_conn!(self.pool, conn, {
            diesel::insert_into(sources::table)
                .values(&record)
                .on_conflict(sources::name)
                .do_update()
                .set(sources::base_url.eq(base_url))
                .execute(&mut conn)
                .await?;

            sources::table
                .filter(sources::name.eq(name))
                .select(SourceRecord::as_select())
                .first(&mut conn)
                .await
                .map(Source::from)
        })
    }

    /// Register a category, keeping an existing label untouched.
    pub async fn ensure_category(&self, category: &Category) -> Result<i32, DbError> {
        let record = NewCategory {
            path: &category.path,
            name: &category.name,
        };

        with_conn!(self.pool, conn, {
            diesel::insert_into(categories::table)
                .values(&record)
                .on_conflict(categories::path)
                .do_nothing()
                .execute(&mut conn)
                .await?;

            categories::table
                .filter(categories::path.eq(&category.path))
                .select(categories::id)
                .first(&mut conn)
                .await
        })
    }

    /// Get all registered categories.
    pub async fn categories(&self) -> Result<Vec<Category>, DbError> {
        with_conn!(self.pool, conn, {
            categories::table
                .order(categories::id.asc())
                .select(CategoryRecord::as_select())
                .load(&mut conn)
                .await
                .map(|records| records.into_iter().map(Category::from).collect())
        })
    }
}
