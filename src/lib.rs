//! wongprime - retail price scraping and catalog ingestion.
//!
//! Renders store category pages in a headless browser, extracts product
//! listings with per-store selector strategies, and records them as a product
//! catalog with one price observation per product, store, and day.

pub mod browser;
pub mod cli;
pub mod config;
pub mod engine;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod repository;
pub mod schema;

pub use engine::{RunReport, Runner, ScraperEngine};
pub use repository::DbContext;
