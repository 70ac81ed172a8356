//! Per-category counter accumulation.

use std::time::Instant;

use chrono::Utc;
use tracing::{error, info};

use crate::models::{CategoryOutcome, CategoryStats, RunLogEntry};
use crate::repository::CatalogWriter;

/// Counters for one category of one run, flushed once at the category boundary.
#[derive(Debug)]
pub struct RunLog {
    source_id: i32,
    category_id: Option<i32>,
    category: String,
    stats: CategoryStats,
    started: Instant,
}

impl RunLog {
    pub fn new(source_id: i32, category_id: Option<i32>, category: &str) -> Self {
        Self {
            source_id,
            category_id,
            category: category.to_string(),
            stats: CategoryStats::default(),
            started: Instant::now(),
        }
    }

    pub fn record_found(&mut self, n: u32) {
        self.stats.found += n;
    }

    pub fn record_created(&mut self) {
        self.stats.created += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.stats.duplicate += 1;
    }

    pub fn record_errors(&mut self, n: u32) {
        self.stats.errors += n;
    }

    pub fn stats(&self) -> CategoryStats {
        self.stats
    }

    /// Build the entry for this category.
    pub fn finish(&self, outcome: CategoryOutcome) -> RunLogEntry {
        RunLogEntry {
            id: 0,
            source_id: self.source_id,
            category_id: self.category_id,
            category: self.category.clone(),
            stats: self.stats,
            duration_seconds: self.started.elapsed().as_secs_f64(),
            outcome,
            timestamp: Utc::now(),
        }
    }

    /// Persist the entry. A storage failure is logged and reported as `false`.
    pub async fn persist(&self, writer: &mut CatalogWriter, outcome: CategoryOutcome) -> bool {
        let entry = self.finish(outcome);
        info!(
            category = %entry.category,
            outcome = entry.outcome.as_str(),
            duration = format!("{:.2}s", entry.duration_seconds),
            "{}",
            entry.stats
        );

        match writer.append_run_log(&entry).await {
            Ok(()) => true,
            Err(e) => {
                error!(category = %entry.category, "Failed to persist run log: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let mut log = RunLog::new(1, Some(2), "Salud");
        log.record_found(3);
        log.record_created();
        log.record_created();
        log.record_duplicate();
        log.record_errors(0);

        let entry = log.finish(CategoryOutcome::Completed);
        assert_eq!(
            entry.stats,
            CategoryStats {
                found: 3,
                created: 2,
                duplicate: 1,
                errors: 0
            }
        );
        assert_eq!(entry.category_id, Some(2));
        assert!(entry.duration_seconds >= 0.0);
    }
}
