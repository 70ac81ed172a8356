//! Store and category models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A retail site being scraped.
///
/// Resolved once from the catalog at the start of a run and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Store-assigned identifier.
    pub id: i32,
    /// Display name, unique across sources (e.g. "Plaza Vea").
    pub name: String,
    /// Base URL that category paths are appended to.
    pub base_url: String,
    /// When the source was registered.
    pub created_at: DateTime<Utc>,
}

/// One catalog section scraped as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Path relative to the source base URL.
    pub path: String,
    /// Human-readable label.
    pub name: String,
}

impl Category {
    /// Build a category whose label is derived from the last path segment.
    ///
    /// `bebes-y-ninos/alimentos-organicos` becomes `Alimentos Organicos`.
    pub fn from_path(path: &str) -> Self {
        Self {
            path: path.to_string(),
            name: label_from_path(path),
        }
    }

    /// Build a category with an explicit label.
    pub fn with_name(path: &str, name: &str) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
        }
    }

    /// Full URL of this category on a source.
    pub fn url_on(&self, base_url: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

fn label_from_path(path: &str) -> String {
    let segment = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path);

    segment
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
