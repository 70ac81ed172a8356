//! Per-category run statistics.

use std::fmt;
use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters accumulated while processing one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    /// Containers matched in the rendered page.
    pub found: u32,
    /// Price snapshots newly written.
    pub created: u32,
    /// Products already observed today at this source.
    pub duplicate: u32,
    /// Containers skipped or failed.
    pub errors: u32,
}

impl AddAssign for CategoryStats {
    fn add_assign(&mut self, rhs: Self) {
        self.found += rhs.found;
        self.created += rhs.created;
        self.duplicate += rhs.duplicate;
        self.errors += rhs.errors;
    }
}

impl fmt::Display for CategoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "found: {} | new: {} | already seen today: {} | errors: {}",
            self.found, self.created, self.duplicate, self.errors
        )
    }
}

/// How a category finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryOutcome {
    /// Every container was processed.
    Completed,
    /// A storage failure stopped the batch early.
    Aborted,
}

impl CategoryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}

/// A persisted run-log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub id: i32,
    pub source_id: i32,
    pub category_id: Option<i32>,
    pub category: String,
    pub stats: CategoryStats,
    pub duration_seconds: f64,
    pub outcome: CategoryOutcome,
    pub timestamp: DateTime<Utc>,
}
