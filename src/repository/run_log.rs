//! Run-log history queries.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::RunLogRecord;
use super::pool::{DbError, DbPool};
use crate::models::RunLogEntry;
use crate::schema::run_log;
use crate::with_conn;

/// Read access to persisted per-category run outcomes.
#[derive(Clone)]
pub struct RunLogRepository {
    pool: DbPool,
}

impl RunLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Most recent entries, newest first, optionally limited to one source.
    pub async fn recent(
        &self,
        source_id: Option<i32>,
        limit: i64,
    ) -> Result<Vec<RunLogEntry>, DbError> {
        with_conn!(self.pool, conn, {
            let mut query = run_log::table
                .select(RunLogRecord::as_select())
                .order((run_log::logged_at.desc(), run_log::id.desc()))
                .limit(limit)
                .into_boxed();

            if let Some(id) = source_id {
                query = query.filter(run_log::source_id.eq(id));
            }

            query
                .load(&mut conn)
                .await
                .map(|records| records.into_iter().map(RunLogEntry::from).collect())
        })
    }

    /// Total number of entries.
    pub async fn count(&self) -> Result<i64, DbError> {
        with_conn!(self.pool, conn, {
            run_log::table.count().get_result(&mut conn).await
        })
    }
}
