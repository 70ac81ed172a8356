//! Product extraction from rendered catalog pages.

mod price;
mod selectors;
mod stores;

pub use price::{parse_price, parse_rating};
pub use selectors::{SelectorSet, SelectorStrategy};
pub use stores::StrategyKind;

use scraper::{ElementRef, Html};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fetch::RenderedDocument;
use crate::models::ExtractedProduct;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("no {0} selectors configured")]
    MissingSelectors(&'static str),

    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

/// Source-specific mapping from a rendered page to product records.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Container selectors: canonical first, then fallbacks.
    fn selectors(&self) -> &[String];

    /// Canonical container selector.
    fn selector(&self) -> &str {
        self.selectors().first().map(String::as_str).unwrap_or_default()
    }

    /// Product containers matched by the first selector with any match.
    fn select_containers<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>>;

    /// Map one container to a record.
    ///
    /// `Ok(None)` means the container lacks a name or a parseable price.
    fn extract(
        &self,
        container: ElementRef<'_>,
        base_url: &str,
    ) -> Result<Option<ExtractedProduct>, ExtractionError>;
}

/// Outcome of extracting every container on one page.
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub records: Vec<ExtractedProduct>,
    /// Containers matched on the page.
    pub found: u32,
    /// Containers without a usable name or price.
    pub skipped: u32,
    /// Containers that raised an extraction error.
    pub failed: u32,
}

/// Run a strategy over a rendered document.
///
/// Parsing is synchronous and the parsed tree is dropped before returning.
pub fn extract_page(
    strategy: &dyn ExtractionStrategy,
    document: &RenderedDocument,
    base_url: &str,
) -> PageExtraction {
    let html = document.parse();
    let containers = strategy.select_containers(&html);
    let mut page = PageExtraction {
        found: containers.len() as u32,
        ..Default::default()
    };

    for (index, container) in containers.into_iter().enumerate() {
        match strategy.extract(container, base_url) {
            Ok(Some(record)) => page.records.push(record),
            Ok(None) => {
                warn!(index, "Skipping container: missing name or unparseable price");
                page.skipped += 1;
            }
            Err(e) => {
                debug!(index, error = %e, "Container extraction failed");
                page.failed += 1;
            }
        }
    }

    page
}
