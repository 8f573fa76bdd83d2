use std::collections::HashSet;

use scraper::Html;
use serde_json::Value;
use url::Url;

use super::selectors::listing::PRODUCT_LINK;
use super::strategy::{FieldStrategy, StrategyChain};
use super::{find_typed, structured_data};

/// A parsed category listing page.
pub struct ListingDocument {
    html: Html,
    structured: Option<Value>,
    base: Url,
}

impl ListingDocument {
    pub fn parse(raw: &str, base: &Url) -> Self {
        let html = Html::parse_document(raw);
        let structured = structured_data(&html);
        Self {
            html,
            structured,
            base: base.clone(),
        }
    }
}

static PRODUCT_LINKS: StrategyChain<ListingDocument, Vec<String>> = StrategyChain::new(
    "product_links",
    &[
        FieldStrategy::new("item_list", links_from_item_list),
        FieldStrategy::new("product_card", links_from_cards),
    ],
);

/// Absolute product links of a listing page, first occurrence order, no
/// duplicates. Empty when neither the item list nor the cards yield links.
pub fn parse_listing(raw: &str, base: &Url) -> Vec<String> {
    let doc = ListingDocument::parse(raw, base);
    let Some(links) = PRODUCT_LINKS.resolve(&doc) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    links.into_iter().filter(|l| seen.insert(l.clone())).collect()
}

fn links_from_item_list(doc: &ListingDocument) -> Option<Vec<String>> {
    let list = find_typed(doc.structured.as_ref()?, "ItemList")?;
    let links: Vec<String> = list
        .get("itemListElement")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("url").and_then(Value::as_str))
        .filter(|href| href.contains("/p"))
        .filter_map(|href| resolve(&doc.base, href))
        .collect();
    (!links.is_empty()).then_some(links)
}

fn links_from_cards(doc: &ListingDocument) -> Option<Vec<String>> {
    let links: Vec<String> = doc
        .html
        .select(&PRODUCT_LINK)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve(&doc.base, href))
        .collect();
    (!links.is_empty()).then_some(links)
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    match base.join(href.trim()) {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            tracing::debug!(%href, error = %e, "Unresolvable product link");
            None
        }
    }
}
