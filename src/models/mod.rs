//! Domain models.

mod product;
mod run_log;
mod source;

pub use product::{ExtractedProduct, PriceInsert, PriceSnapshot, Product, UpsertOutcome};
pub use run_log::{CategoryOutcome, CategoryStats, RunLogEntry};
pub use source::{Category, Source};
