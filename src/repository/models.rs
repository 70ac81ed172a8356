//! Diesel row types.

use diesel::prelude::*;

use crate::schema::{categories, price_snapshots, products, run_log, sources};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = sources)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SourceRecord {
    pub id: i32,
    pub name: String,
    pub base_url: String,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = sources)]
pub struct NewSource<'a> {
    pub name: &'a str,
    pub base_url: &'a str,
    pub created_at: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = categories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CategoryRecord {
    pub id: i32,
    pub path: String,
    pub name: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = categories)]
pub struct NewCategory<'a> {
    pub path: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProductRecord {
    pub id: i32,
    pub name: String,
    pub brand: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = price_snapshots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceSnapshotRecord {
    pub id: i32,
    pub product_id: i32,
    pub source_id: i32,
    pub price: f64,
    pub stock: Option<i32>,
    pub rating: Option<f64>,
    pub url: String,
    pub observed_at: String,
    pub observed_on: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = price_snapshots)]
pub struct NewPriceSnapshot<'a> {
    pub product_id: i32,
    pub source_id: i32,
    pub price: f64,
    pub stock: Option<i32>,
    pub rating: Option<f64>,
    pub url: &'a str,
    pub observed_at: &'a str,
    pub observed_on: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = run_log)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RunLogRecord {
    pub id: i32,
    pub source_id: i32,
    pub category_id: Option<i32>,
    pub category: String,
    pub found: i32,
    pub created: i32,
    pub duplicates: i32,
    pub errors: i32,
    pub duration_seconds: f64,
    pub outcome: String,
    pub logged_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = run_log)]
pub struct NewRunLogEntry<'a> {
    pub source_id: i32,
    pub category_id: Option<i32>,
    pub category: &'a str,
    pub found: i32,
    pub created: i32,
    pub duplicates: i32,
    pub errors: i32,
    pub duration_seconds: f64,
    pub outcome: &'a str,
    pub logged_at: &'a str,
}
