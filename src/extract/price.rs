//! Price and rating text parsing.

use std::sync::LazyLock;

use regex::Regex;

/// Currency prefixes stripped from price labels, longest first.
const CURRENCY_PREFIXES: &[&str] = &["S/.", "S/", "$"];

/// Parse a displayed price such as `S/ 12,345.67` into a decimal.
///
/// The currency prefix and thousands separators are removed and the whole
/// remainder must be a number. Labels with extra text or several amounts,
/// and prices that are not positive, yield `None`.
pub fn parse_price(text: &str) -> Option<f64> {
    let text = text.trim();
    let amount = CURRENCY_PREFIXES
        .iter()
        .find_map(|prefix| text.strip_prefix(prefix))
        .unwrap_or(text)
        .trim()
        .replace(',', "");

    amount
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p > 0.0)
}

/// Parse a rating label such as `4.5` or `4,5 de 5`.
pub fn parse_rating(text: &str) -> Option<f64> {
    static RATING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap());

    RATING
        .find(text)?
        .as_str()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite())
}
