//! Text cleanup shared by the listing and product parsers.

use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

static PRICE_RANGE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*-\s*").unwrap());

static SIZE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(uk|eu)(\d+)$").unwrap());

/// `£<amount>` occurrences, amount captured.
static POUND_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"£\s*([\d,]+\.?\d*)").unwrap());

/// "Was £120" style original-price text, amount captured.
static WAS_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)was\s*£?\s*(\d[\d,]*\.?\d*)").unwrap());

/// Parse price text such as `"£1,299.00"` or `"£20 - £30"`.
///
/// Only the part before a range separator is used; every character other
/// than digits and `.` is dropped.
pub fn clean_price(text: &str) -> Option<f64> {
    let first = PRICE_RANGE_SEPARATOR.split(text).next()?;
    let digits: String = first
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Trim a size label and split `uk10`/`EU42` into `uk 10`/`EU 42`.
pub fn normalize_size(label: &str) -> String {
    let label = label.trim();
    SIZE_PREFIX.replace(label, "$1 $2").into_owned()
}

/// Up to two `£` amounts found in `text`: current first, then original.
pub fn pound_amounts(text: &str) -> (Option<f64>, Option<f64>) {
    let mut amounts = POUND_AMOUNT
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| clean_price(m.as_str()));
    let current = amounts.next().flatten();
    let original = amounts.next().flatten();
    (current, original)
}

/// Amount of a "was £N" phrase, if `text` contains one.
pub fn was_price(text: &str) -> Option<f64> {
    WAS_PRICE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| clean_price(m.as_str()))
}

pub fn mentions_was_price(text: &str) -> bool {
    WAS_PRICE.is_match(text)
}

/// Text content of an element with every text node trimmed and joined.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}
