//! Built-in store layouts.

use serde::{Deserialize, Serialize};

use super::selectors::{SelectorSet, SelectorStrategy};
use super::{ExtractionError, ExtractionStrategy};

/// Which extraction strategy a source uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StrategyKind {
    Wong,
    PlazaVea,
    Metro,
    /// Selector lists supplied by configuration.
    Custom(SelectorSet),
}

impl StrategyKind {
    /// Guess the built-in strategy from a source name.
    pub fn for_source_name(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "wong" => Some(Self::Wong),
            "plazavea" => Some(Self::PlazaVea),
            "metro" => Some(Self::Metro),
            _ => None,
        }
    }

    pub fn selector_set(&self) -> SelectorSet {
        match self {
            Self::Wong | Self::Metro => wong_selectors(),
            Self::PlazaVea => plaza_vea_selectors(),
            Self::Custom(set) => set.clone(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Wong => "wong",
            Self::PlazaVea => "plaza_vea",
            Self::Metro => "metro",
            Self::Custom(_) => "custom",
        }
    }

    /// Compile into a boxed strategy.
    pub fn build(&self) -> Result<Box<dyn ExtractionStrategy>, ExtractionError> {
        Ok(Box::new(SelectorStrategy::new(
            self.label(),
            self.selector_set(),
        )?))
    }
}

/// VTEX storefront layout shared by Wong and Metro.
fn wong_selectors() -> SelectorSet {
    SelectorSet::from_lists(
        &[
            "div.product-item",
            "div.ProductCard",
            "article.product",
            "div[data-test='product-card']",
        ],
        &[
            "p.product-title",
            "h3.ProductCard__name",
            "h2.product-name",
            "[data-test='product-name']",
            "a[class*='title']",
            "span[class*='name']",
        ],
        &[
            "span.product-prices__value",
            "span.ProductCard__price",
            "span[class*='price']",
            "[data-test='product-price']",
            "div.price span",
        ],
    )
    .with_link(&["a[href*='/p/']", "a.product-link", "a"])
    .with_brand(&["span.brand", "[data-test='product-brand']", "div.marca"])
    .with_rating(&["span[class*='rating']", "div.rating"])
}

fn plaza_vea_selectors() -> SelectorSet {
    SelectorSet::from_lists(
        &[
            "div.product-item",
            "div.ProductCard",
            "article.product",
            "div[data-test='product-card']",
        ],
        &["p.product-title", "h3.ProductCard__name", "h2.product-name"],
        &[
            "span.product-prices__value",
            "span.ProductCard__price",
            "span[class*='price']",
        ],
    )
    .with_image_attrs(&["src", "data-src"])
    .with_brand(&["span.brand"])
}
