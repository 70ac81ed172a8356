//! Catalog writes (products, price snapshots, run log) and catalog reads.
//!
//! [`CatalogWriter`] owns one connection for the duration of a scrape run.
//! Product identity is `(name, brand)`; the upsert is a single statement so
//! concurrent writers for different products never interleave a read and a
//! write. Price snapshots are deduplicated per `(product, source, day)` by a
//! unique index, and a conflicting insert is reported as
//! [`PriceInsert::Duplicate`] rather than an error.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Bool, Integer, Nullable, Text};
use diesel_async::RunQueryDsl;

use super::models::{
    NewPriceSnapshot, NewRunLogEntry, PriceSnapshotRecord, ProductRecord, RunLogRecord,
    SourceRecord,
};
use super::parse_datetime;
use super::pool::{DbError, DbPool, SqliteConn};
use crate::models::{
    CategoryOutcome, CategoryStats, ExtractedProduct, PriceInsert, PriceSnapshot, Product,
    RunLogEntry, Source, UpsertOutcome,
};
use crate::schema::{categories, price_snapshots, products, run_log, sources};
use crate::with_conn;

const UPSERT_PRODUCT_SQL: &str = r#"
    INSERT INTO products (name, brand, description, image_url, category, sku, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (name, brand) DO UPDATE SET
        description = COALESCE(excluded.description, products.description),
        image_url = COALESCE(excluded.image_url, products.image_url),
        category = COALESCE(excluded.category, products.category),
        sku = COALESCE(excluded.sku, products.sku),
        updated_at = excluded.updated_at
    RETURNING id, created_at = ? AS created
"#;

#[derive(QueryableByName)]
struct UpsertRow {
    #[diesel(sql_type = Integer)]
    id: i32,
    #[diesel(sql_type = Bool)]
    created: bool,
}

/// Normalize the identity fields the way they are stored.
fn identity(record: &ExtractedProduct) -> (String, String) {
    let name = record.name.trim().to_string();
    let brand = record
        .brand
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    (name, brand)
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Write side of the catalog, bound to one connection.
pub struct CatalogWriter {
    conn: SqliteConn,
}

impl CatalogWriter {
    pub fn new(conn: SqliteConn) -> Self {
        Self { conn }
    }

    /// Resolve a source by name.
    pub async fn resolve_source(&mut self, name: &str) -> Result<Option<Source>, DbError> {
        sources::table
            .filter(sources::name.eq(name))
            .select(SourceRecord::as_select())
            .first(&mut self.conn)
            .await
            .optional()
            .map(|opt| opt.map(Source::from))
    }

    /// Resolve a category id by path. Unregistered categories yield `None`.
    pub async fn resolve_category(&mut self, path: &str) -> Result<Option<i32>, DbError> {
        categories::table
            .filter(categories::path.eq(path))
            .select(categories::id)
            .first(&mut self.conn)
            .await
            .optional()
    }

    /// Create or update a product keyed by `(name, brand)`.
    ///
    /// Descriptive fields are only overwritten by non-null values.
    pub async fn upsert_product(
        &mut self,
        record: &ExtractedProduct,
        category: &str,
    ) -> Result<UpsertOutcome, DbError> {
        let (name, brand) = identity(record);
        let now = timestamp(Utc::now());

        let row: UpsertRow = diesel::sql_query(UPSERT_PRODUCT_SQL)
            .bind::<Text, _>(&name)
            .bind::<Text, _>(&brand)
            .bind::<Nullable<Text>, _>(record.description.as_deref())
            .bind::<Nullable<Text>, _>(record.image_url.as_deref())
            .bind::<Nullable<Text>, _>(Some(category))
            .bind::<Nullable<Text>, _>(record.sku.as_deref())
            .bind::<Text, _>(&now)
            .bind::<Text, _>(&now)
            .bind::<Text, _>(&now)
            .get_result(&mut self.conn)
            .await?;

        Ok(UpsertOutcome {
            id: row.id,
            created: row.created,
        })
    }

    /// Append a price observation.
    ///
    /// A second observation for the same product and source on the same UTC
    /// calendar day is absorbed by the daily unique index.
    pub async fn insert_price(
        &mut self,
        source_id: i32,
        product_id: i32,
        record: &ExtractedProduct,
        observed_at: DateTime<Utc>,
    ) -> Result<PriceInsert, DbError> {
        let observed_at_str = timestamp(observed_at);
        let observed_on = observed_at.date_naive().to_string();

        let row = NewPriceSnapshot {
            product_id,
            source_id,
            price: record.price,
            stock: record.stock,
            rating: record.rating,
            url: &record.url,
            observed_at: &observed_at_str,
            observed_on: &observed_on,
        };

        let inserted = diesel::insert_into(price_snapshots::table)
            .values(&row)
            .on_conflict((
                price_snapshots::product_id,
                price_snapshots::source_id,
                price_snapshots::observed_on,
            ))
            .do_nothing()
            .execute(&mut self.conn)
            .await?;

        Ok(if inserted == 0 {
            PriceInsert::Duplicate
        } else {
            PriceInsert::Inserted
        })
    }

    /// Persist a run-log entry. The entry's `id` is ignored.
    pub async fn append_run_log(&mut self, entry: &RunLogEntry) -> Result<(), DbError> {
        let logged_at = timestamp(entry.timestamp);
        let row = NewRunLogEntry {
            source_id: entry.source_id,
            category_id: entry.category_id,
            category: &entry.category,
            found: entry.stats.found as i32,
            created: entry.stats.created as i32,
            duplicates: entry.stats.duplicate as i32,
            errors: entry.stats.errors as i32,
            duration_seconds: entry.duration_seconds,
            outcome: entry.outcome.as_str(),
            logged_at: &logged_at,
        };

        diesel::insert_into(run_log::table)
            .values(&row)
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }
}

impl From<ProductRecord> for Product {
    fn from(record: ProductRecord) -> Self {
        Product {
            id: record.id,
            name: record.name,
            description: record.description,
            image_url: record.image_url,
            brand: (!record.brand.is_empty()).then_some(record.brand),
            category: record.category,
            sku: record.sku,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

impl From<PriceSnapshotRecord> for PriceSnapshot {
    fn from(record: PriceSnapshotRecord) -> Self {
        PriceSnapshot {
            id: record.id,
            product_id: record.product_id,
            source_id: record.source_id,
            price: record.price,
            stock: record.stock,
            rating: record.rating,
            url: record.url,
            observed_at: parse_datetime(&record.observed_at),
        }
    }
}

impl From<RunLogRecord> for RunLogEntry {
    fn from(record: RunLogRecord) -> Self {
        RunLogEntry {
            id: record.id,
            source_id: record.source_id,
            category_id: record.category_id,
            category: record.category,
            stats: CategoryStats {
                found: record.found.max(0) as u32,
                created: record.created.max(0) as u32,
                duplicate: record.duplicates.max(0) as u32,
                errors: record.errors.max(0) as u32,
            },
            duration_seconds: record.duration_seconds,
            outcome: CategoryOutcome::from_str(&record.outcome)
                .unwrap_or(CategoryOutcome::Aborted),
            timestamp: parse_datetime(&record.logged_at),
        }
    }
}

/// Read side of the catalog.
#[derive(Clone)]
pub struct CatalogRepository {
    pool: DbPool,
}

impl CatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find a product by its identity.
    pub async fn find_product(
        &self,
        name: &str,
        brand: Option<&str>,
    ) -> Result<Option<Product>, DbError> {
        let brand = brand.unwrap_or_default();
        with_conn!(self.pool, conn, {
            products::table
                .filter(products::name.eq(name))
                .filter(products::brand.eq(brand))
                .select(ProductRecord::as_select())
                .first(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(Product::from))
        })
    }

    /// Count catalog products.
    pub async fn count_products(&self) -> Result<i64, DbError> {
        with_conn!(self.pool, conn, {
            products::table.count().get_result(&mut conn).await
        })
    }

    /// Price history of a product, oldest first.
    pub async fn price_history(&self, product_id: i32) -> Result<Vec<PriceSnapshot>, DbError> {
        with_conn!(self.pool, conn, {
            price_snapshots::table
                .filter(price_snapshots::product_id.eq(product_id))
                .order((price_snapshots::observed_at.asc(), price_snapshots::id.asc()))
                .select(PriceSnapshotRecord::as_select())
                .load(&mut conn)
                .await
                .map(|records| records.into_iter().map(PriceSnapshot::from).collect())
        })
    }
}
