//! Per-source scrape orchestration.
//!
//! A [`ScraperEngine`] owns one browser session and one storage connection for
//! a run over a single source. Categories are processed in configured order;
//! a category that cannot be fetched or written is reported and skipped, and
//! the browser is released on every exit path.

mod error;
mod run_log;
mod runner;
mod state;

pub use error::{ConnectError, ScrapeError};
pub use run_log::RunLog;
pub use runner::{PacingGate, Runner};
pub use state::EngineState;

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::extract::{extract_page, ExtractionStrategy};
use crate::fetch::{PageFetcher, PageRenderer};
use crate::models::{Category, CategoryOutcome, CategoryStats, ExtractedProduct, PriceInsert, Source};
use crate::repository::{CatalogWriter, DbContext};

/// How one category ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryResult {
    Completed,
    /// Writing stopped early on a storage failure.
    Aborted(String),
    /// The page never loaded.
    FetchFailed(String),
}

#[derive(Debug, Clone)]
pub struct CategoryReport {
    pub category: Category,
    pub stats: CategoryStats,
    pub result: CategoryResult,
    pub duration: Duration,
    /// Whether the run-log entry reached storage.
    pub logged: bool,
}

/// Summary of one engine run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub source: String,
    pub categories: Vec<CategoryReport>,
    pub elapsed: Duration,
    /// Run-fatal error, if the run ended early.
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            categories: Vec::new(),
            elapsed: Duration::ZERO,
            error: None,
        }
    }

    /// A run that never started.
    pub fn failed(source: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(source)
        }
    }

    pub fn totals(&self) -> CategoryStats {
        let mut totals = CategoryStats::default();
        for category in &self.categories {
            totals += category.stats;
        }
        totals
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Scrapes one source across its categories.
pub struct ScraperEngine<R: PageRenderer> {
    source_name: String,
    categories: Vec<Category>,
    strategy: Box<dyn ExtractionStrategy>,
    fetcher: PageFetcher<R>,
    db: DbContext,
    state: EngineState,
}

impl<R: PageRenderer> ScraperEngine<R> {
    pub fn new(
        source_name: impl Into<String>,
        categories: Vec<Category>,
        strategy: Box<dyn ExtractionStrategy>,
        fetcher: PageFetcher<R>,
        db: DbContext,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            categories,
            strategy,
            fetcher,
            db,
            state: EngineState::Idle,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn fetcher(&self) -> &PageFetcher<R> {
        &self.fetcher
    }

    fn transition(&mut self, next: EngineState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Unexpected engine transition");
        }
        debug!(from = %self.state, to = %next, "Engine transition");
        self.state = next;
    }

    /// Run every configured category. Never fails: errors end up in the report.
    pub async fn run(&mut self) -> RunReport {
        let span = info_span!("scrape", source = %self.source_name);
        self.run_traced().instrument(span).await
    }

    async fn run_traced(&mut self) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::new(&self.source_name);
        info!(
            categories = self.categories.len(),
            strategy = self.strategy.name(),
            "Starting run"
        );

        if let Err(e) = self.run_categories(&mut report).await {
            error!(
                state = %self.state,
                elapsed = format!("{:.2}s", started.elapsed().as_secs_f64()),
                "Run aborted: {}",
                e
            );
            report.error = Some(e.to_string());
        }

        // the writer from run_categories is already dropped here
        self.fetcher.close().await;
        self.transition(EngineState::Closed);

        report.elapsed = started.elapsed();
        info!(
            elapsed = format!("{:.2}s", report.elapsed.as_secs_f64()),
            "Run finished: {}",
            report.totals()
        );
        report
    }

    async fn run_categories(&mut self, report: &mut RunReport) -> Result<(), ScrapeError> {
        let mut writer = self
            .db
            .catalog_writer()
            .await
            .map_err(ConnectError::Database)?;
        let source = writer
            .resolve_source(&self.source_name)
            .await
            .map_err(ConnectError::Database)?
            .ok_or_else(|| ConnectError::UnknownSource(self.source_name.clone()))?;
        self.transition(EngineState::Connected);

        self.fetcher.launch().await.map_err(ConnectError::Browser)?;
        self.transition(EngineState::BrowserReady);

        let categories = self.categories.clone();
        for category in &categories {
            let category_report = self.scrape_category(&mut writer, &source, category).await;
            report.categories.push(category_report);
        }

        Ok(())
    }

    async fn scrape_category(
        &mut self,
        writer: &mut CatalogWriter,
        source: &Source,
        category: &Category,
    ) -> CategoryReport {
        let started = Instant::now();
        let category_id = match writer.resolve_category(&category.path).await {
            Ok(id) => id,
            Err(e) => {
                warn!(category = %category.name, "Could not resolve category id: {}", e);
                None
            }
        };
        let mut run_log = RunLog::new(source.id, category_id, &category.name);

        self.transition(EngineState::Fetching);
        let url = category.url_on(&source.base_url);
        info!(category = %category.name, %url, "Scraping category");

        let document = match self.fetcher.load(&url).await {
            Ok(document) => document,
            Err(e) => {
                let e = ScrapeError::from(e);
                error!(
                    category = %category.name,
                    elapsed = format!("{:.2}s", started.elapsed().as_secs_f64()),
                    "Skipping category: {}",
                    e
                );
                return CategoryReport {
                    category: category.clone(),
                    stats: run_log.stats(),
                    result: CategoryResult::FetchFailed(e.to_string()),
                    duration: started.elapsed(),
                    logged: false,
                };
            }
        };

        self.transition(EngineState::Extracting);
        let page = extract_page(self.strategy.as_ref(), &document, &source.base_url);
        run_log.record_found(page.found);
        run_log.record_errors(page.skipped + page.failed);
        if page.found == 0 {
            warn!(
                category = %category.name,
                selector = self.strategy.selector(),
                "No product containers matched"
            );
        }

        self.transition(EngineState::Writing);
        let result = match write_records(writer, source, category, &page.records, &mut run_log).await
        {
            Ok(()) => CategoryResult::Completed,
            Err(e) => {
                error!(
                    category = %category.name,
                    elapsed = format!("{:.2}s", started.elapsed().as_secs_f64()),
                    "Aborting category: {}",
                    e
                );
                CategoryResult::Aborted(e.to_string())
            }
        };

        let outcome = match result {
            CategoryResult::Completed => CategoryOutcome::Completed,
            _ => CategoryOutcome::Aborted,
        };
        let logged = run_log.persist(writer, outcome).await;
        self.transition(EngineState::Logged);

        CategoryReport {
            category: category.clone(),
            stats: run_log.stats(),
            result,
            duration: started.elapsed(),
            logged,
        }
    }
}

async fn write_records(
    writer: &mut CatalogWriter,
    source: &Source,
    category: &Category,
    records: &[ExtractedProduct],
    run_log: &mut RunLog,
) -> Result<(), ScrapeError> {
    for record in records {
        let product = writer.upsert_product(record, &category.name).await?;
        match writer
            .insert_price(source.id, product.id, record, Utc::now())
            .await?
        {
            PriceInsert::Inserted => {
                debug!(product = %record.name, price = record.price, "New price");
                run_log.record_created();
            }
            PriceInsert::Duplicate => {
                debug!(product = %record.name, "Already observed today");
                run_log.record_duplicate();
            }
        }
    }
    Ok(())
}
