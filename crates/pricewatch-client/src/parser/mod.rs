//! Storefront page parser.
//!
//! Turns listing and product markup into plain links and [`ProductPage`]s.
//! Every field is read through a [`StrategyChain`](strategy::StrategyChain):
//! the embedded schema.org payload is preferred, markup selectors come
//! next, free-text patterns last.

pub mod listing;
pub mod product;
pub mod selectors;
pub mod strategy;
pub mod text;

use pricewatch_core::error::AppError;
use pricewatch_core::models::ProductPage;
use pricewatch_core::traits::PageParser;
use scraper::Html;
use serde_json::Value;
use url::Url;

/// [`PageParser`] for the storefront's listing and product pages.
#[derive(Debug, Clone, Default)]
pub struct StorefrontParser;

impl StorefrontParser {
    pub fn new() -> Self {
        Self
    }
}

impl PageParser for StorefrontParser {
    fn parse_listing(&self, html: &str, base: &Url) -> Vec<String> {
        listing::parse_listing(html, base)
    }

    fn parse_product(&self, html: &str) -> Result<ProductPage, AppError> {
        product::parse_product(html)
    }
}

/// The first embedded schema.org payload of a page, if it is valid JSON.
pub(crate) fn structured_data(html: &Html) -> Option<Value> {
    let script = html.select(&selectors::STRUCTURED_DATA).next()?;
    let raw: String = script.text().collect();
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "Embedded structured data is not valid JSON");
            None
        }
    }
}

/// The object with `@type == kind` in `value`, looking into top-level arrays.
pub(crate) fn find_typed<'a>(value: &'a Value, kind: &str) -> Option<&'a Value> {
    let is_kind = |v: &Value| v.get("@type").and_then(Value::as_str) == Some(kind);
    match value {
        Value::Array(items) => items.iter().find(|v| is_kind(v)),
        v if is_kind(v) => Some(v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_data_reads_first_script() {
        let html = Html::parse_document(
            r#"<html><head>
            <script type="application/ld+json">{"@type": "Product", "name": "Oak Shelf"}</script>
            <script type="application/ld+json">{"@type": "BreadcrumbList"}</script>
            </head></html>"#,
        );
        let value = structured_data(&html).unwrap();
        assert_eq!(value["name"], "Oak Shelf");
    }

    #[test]
    fn test_structured_data_ignores_invalid_json() {
        let html = Html::parse_document(
            r#"<script type="application/ld+json">{not json</script>"#,
        );
        assert!(structured_data(&html).is_none());
    }

    #[test]
    fn test_find_typed() {
        let list = json!([{"@type": "BreadcrumbList"}, {"@type": "ItemList", "n": 1}]);
        assert_eq!(find_typed(&list, "ItemList").unwrap()["n"], 1);
        assert!(find_typed(&json!({"@type": "Product"}), "ItemList").is_none());
    }
}
