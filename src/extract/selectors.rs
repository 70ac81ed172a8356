//! CSS selector driven extraction.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use super::price::{parse_price, parse_rating};
use super::{ExtractionError, ExtractionStrategy};
use crate::models::ExtractedProduct;

/// Ordered selector lists for one store layout.
///
/// Every list is tried in order; the first selector yielding a usable value
/// wins. For `containers`, the first selector matching at least one element
/// is used for the whole page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorSet {
    pub containers: Vec<String>,
    pub name: Vec<String>,
    pub price: Vec<String>,
    #[serde(default = "default_link")]
    pub link: Vec<String>,
    #[serde(default = "default_image")]
    pub image: Vec<String>,
    /// Attributes holding the image URL; lazy loaders move it off `src`.
    #[serde(default = "default_image_attrs")]
    pub image_attrs: Vec<String>,
    #[serde(default)]
    pub brand: Vec<String>,
    #[serde(default)]
    pub rating: Vec<String>,
}

fn default_link() -> Vec<String> {
    vec!["a".to_string()]
}

fn default_image() -> Vec<String> {
    vec!["img".to_string()]
}

fn default_image_attrs() -> Vec<String> {
    vec![
        "src".to_string(),
        "data-src".to_string(),
        "data-lazy-src".to_string(),
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SelectorSet {
    /// Build a set from static selector lists with default link and image handling.
    pub fn from_lists(containers: &[&str], name: &[&str], price: &[&str]) -> Self {
        Self {
            containers: strings(containers),
            name: strings(name),
            price: strings(price),
            link: default_link(),
            image: default_image(),
            image_attrs: default_image_attrs(),
            brand: Vec::new(),
            rating: Vec::new(),
        }
    }

    pub fn with_link(mut self, link: &[&str]) -> Self {
        self.link = strings(link);
        self
    }

    pub fn with_image_attrs(mut self, attrs: &[&str]) -> Self {
        self.image_attrs = strings(attrs);
        self
    }

    pub fn with_brand(mut self, brand: &[&str]) -> Self {
        self.brand = strings(brand);
        self
    }

    pub fn with_rating(mut self, rating: &[&str]) -> Self {
        self.rating = strings(rating);
        self
    }
}

struct CompiledSelectors {
    containers: Vec<Selector>,
    name: Vec<Selector>,
    price: Vec<Selector>,
    link: Vec<Selector>,
    image: Vec<Selector>,
    brand: Vec<Selector>,
    rating: Vec<Selector>,
}

fn compile(list: &[String]) -> Result<Vec<Selector>, ExtractionError> {
    list.iter()
        .map(|s| {
            Selector::parse(s).map_err(|e| ExtractionError::InvalidSelector {
                selector: s.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

impl CompiledSelectors {
    fn new(set: &SelectorSet) -> Result<Self, ExtractionError> {
        if set.containers.is_empty() {
            return Err(ExtractionError::MissingSelectors("containers"));
        }
        if set.name.is_empty() {
            return Err(ExtractionError::MissingSelectors("name"));
        }
        if set.price.is_empty() {
            return Err(ExtractionError::MissingSelectors("price"));
        }

        Ok(Self {
            containers: compile(&set.containers)?,
            name: compile(&set.name)?,
            price: compile(&set.price)?,
            link: compile(&set.link)?,
            image: compile(&set.image)?,
            brand: compile(&set.brand)?,
            rating: compile(&set.rating)?,
        })
    }
}

/// Whitespace-collapsed text of an element.
fn element_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// First non-empty text among the candidates.
fn first_text(container: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        container
            .select(selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

/// First candidate text that `parse` accepts.
fn first_parsed(
    container: ElementRef<'_>,
    selectors: &[Selector],
    parse: fn(&str) -> Option<f64>,
) -> Option<f64> {
    selectors.iter().find_map(|selector| {
        container
            .select(selector)
            .find_map(|el| parse(&element_text(el)))
    })
}

/// Resolve `href` against `base_url`, keeping only http(s) results.
fn resolve(base_url: &str, href: &str) -> Result<Option<String>, ExtractionError> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("data:") || href.starts_with('#') {
        return Ok(None);
    }

    let resolved = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base_url)
            .and_then(|base| base.join(href))
            .map_err(|e| ExtractionError::InvalidUrl {
                url: href.to_string(),
                message: e.to_string(),
            })?,
        Err(e) => {
            return Err(ExtractionError::InvalidUrl {
                url: href.to_string(),
                message: e.to_string(),
            })
        }
    };

    Ok(matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string()))
}

fn first_link(
    container: ElementRef<'_>,
    selectors: &[Selector],
    base_url: &str,
) -> Result<Option<String>, ExtractionError> {
    // the container itself may be the anchor
    let own = container.value().attr("href").into_iter();
    let nested = selectors
        .iter()
        .flat_map(|selector| container.select(selector))
        .filter_map(|el| el.value().attr("href"));

    for href in own.chain(nested) {
        if let Some(url) = resolve(base_url, href)? {
            return Ok(Some(url));
        }
    }
    Ok(None)
}

fn first_image(
    container: ElementRef<'_>,
    selectors: &[Selector],
    attrs: &[String],
    base_url: &str,
) -> Result<Option<String>, ExtractionError> {
    for selector in selectors {
        for img in container.select(selector) {
            for attr in attrs {
                if let Some(src) = img.value().attr(attr) {
                    if let Some(url) = resolve(base_url, src)? {
                        return Ok(Some(url));
                    }
                }
            }
        }
    }
    Ok(None)
}

/// An [`ExtractionStrategy`] driven entirely by a [`SelectorSet`].
pub struct SelectorStrategy {
    name: String,
    set: SelectorSet,
    compiled: CompiledSelectors,
}

impl std::fmt::Debug for SelectorStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorStrategy")
            .field("name", &self.name)
            .field("set", &self.set)
            .finish()
    }
}

impl SelectorStrategy {
    /// Compile a selector set. Fails on unparseable or missing required selectors.
    pub fn new(name: impl Into<String>, set: SelectorSet) -> Result<Self, ExtractionError> {
        let compiled = CompiledSelectors::new(&set)?;
        Ok(Self {
            name: name.into(),
            set,
            compiled,
        })
    }

    pub fn selector_set(&self) -> &SelectorSet {
        &self.set
    }
}

impl ExtractionStrategy for SelectorStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn selectors(&self) -> &[String] {
        &self.set.containers
    }

    fn select_containers<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        self.compiled
            .containers
            .iter()
            .map(|selector| document.select(selector).collect::<Vec<_>>())
            .find(|matches| !matches.is_empty())
            .unwrap_or_default()
    }

    fn extract(
        &self,
        container: ElementRef<'_>,
        base_url: &str,
    ) -> Result<Option<ExtractedProduct>, ExtractionError> {
        let Some(name) = first_text(container, &self.compiled.name) else {
            return Ok(None);
        };
        let Some(price) = first_parsed(container, &self.compiled.price, parse_price) else {
            return Ok(None);
        };

        let url = first_link(container, &self.compiled.link, base_url)?.unwrap_or_default();

        let mut record = ExtractedProduct::new(name, price, url);
        record.image_url = first_image(
            container,
            &self.compiled.image,
            &self.set.image_attrs,
            base_url,
        )?;
        record.brand = first_text(container, &self.compiled.brand);
        record.rating = first_parsed(container, &self.compiled.rating, parse_rating);
        Ok(Some(record))
    }
}
