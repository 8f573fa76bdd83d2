use std::sync::LazyLock;

use pricewatch_core::error::AppError;
use pricewatch_core::models::{PricePair, ProductPage, StockStatus, VariantOffer};
use pricewatch_core::util::value_as_f64;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::Value;

use super::selectors::product as sel;
use super::strategy::{FieldStrategy, StrategyChain};
use super::text::{
    clean_price, element_text, mentions_was_price, normalize_size, pound_amounts, was_price,
};
use super::{find_typed, structured_data};

/// Longest visible text accepted as a variant name; longer labels fall back
/// to the control's `aria-label`.
const MAX_VARIANT_LABEL_CHARS: usize = 30;

static COLOUR_OPTION_TESTID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)colour:option").unwrap());
static COLOUR_OPTION_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)colour.*option").unwrap());
static PRICE_CLASS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)price").unwrap());
static SIZE_CLASS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)size").unwrap());

/// A parsed product page.
pub struct ProductDocument {
    html: Html,
    structured: Option<Value>,
}

impl ProductDocument {
    pub fn parse(raw: &str) -> Self {
        let html = Html::parse_document(raw);
        let structured = structured_data(&html);
        Self { html, structured }
    }

    /// The product object of the structured payload.
    fn product(&self) -> Option<&Value> {
        let value = self.structured.as_ref()?;
        match value {
            Value::Array(items) => find_typed(value, "Product").or_else(|| items.first()),
            v => Some(v),
        }
    }

    /// The first offer of the product object.
    fn offer(&self) -> Option<&Value> {
        match self.product()?.get("offers")? {
            Value::Array(offers) => offers.first(),
            v => Some(v),
        }
    }
}

// ---------------------------------------------------------------------------
// Field chains
// ---------------------------------------------------------------------------

static NAME: StrategyChain<ProductDocument, String> = StrategyChain::new(
    "name",
    &[
        FieldStrategy::new("structured", name_from_structured),
        FieldStrategy::new("header", name_from_header),
    ],
);

static STOCK: StrategyChain<ProductDocument, StockStatus> = StrategyChain::new(
    "stock_status",
    &[
        FieldStrategy::new("structured", stock_from_structured),
        FieldStrategy::new("availability_message", stock_from_message),
    ],
);

static IMAGE: StrategyChain<ProductDocument, String> = StrategyChain::new(
    "image",
    &[
        FieldStrategy::new("structured", image_from_structured),
        FieldStrategy::new("product_image", image_from_markup),
    ],
);

static SIZES: StrategyChain<ProductDocument, Vec<String>> = StrategyChain::new(
    "sizes",
    &[
        FieldStrategy::new("size_buttons", sizes_from_buttons),
        FieldStrategy::new("size_class", sizes_from_classes),
    ],
);

static VARIANTS: StrategyChain<ProductDocument, Vec<VariantOffer>> = StrategyChain::new(
    "variants",
    &[
        FieldStrategy::new("colour_testid", variants_from_testid),
        FieldStrategy::new("colour_class", variants_from_classes),
    ],
);

static CURRENT_PRICE: StrategyChain<ProductDocument, f64> = StrategyChain::new(
    "current_price",
    &[
        FieldStrategy::new("structured", price_from_structured),
        FieldStrategy::new("price_class", price_from_current_class),
        FieldStrategy::new("price_testid", price_from_current_testid),
    ],
);

static ORIGINAL_PRICE: StrategyChain<ProductDocument, f64> = StrategyChain::new(
    "original_price",
    &[
        FieldStrategy::new("price_prev", price_from_prev_testid),
        FieldStrategy::new("was_text", price_from_was_text),
    ],
);

/// Read every field of a product page.
///
/// Fails with [`AppError::ParseError`] when the page carries neither a name,
/// a price nor any variant control, which is what block pages and error
/// pages look like.
pub fn parse_product(raw: &str) -> Result<ProductPage, AppError> {
    let doc = ProductDocument::parse(raw);

    let name = NAME.resolve(&doc);
    let variants = VARIANTS.resolve(&doc).unwrap_or_default();
    let current = CURRENT_PRICE.resolve(&doc);

    if name.is_none() && current.is_none() && variants.is_empty() {
        return Err(AppError::ParseError(
            "page has no product name, price or variants".to_string(),
        ));
    }

    Ok(ProductPage {
        name,
        stock_status: STOCK.resolve(&doc),
        image_url: IMAGE.resolve(&doc),
        sizes: SIZES.resolve(&doc).unwrap_or_default(),
        variants,
        variant_labels: colour_labels(&doc),
        price: PricePair::new(current, ORIGINAL_PRICE.resolve(&doc)),
    })
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn name_from_structured(doc: &ProductDocument) -> Option<String> {
    non_empty(doc.product()?.get("name")?.as_str()?)
}

fn name_from_header(doc: &ProductDocument) -> Option<String> {
    non_empty(&element_text(doc.html.select(&sel::NAME).next()?))
}

fn stock_from_structured(doc: &ProductDocument) -> Option<StockStatus> {
    let availability = doc.offer()?.get("availability")?.as_str()?;
    Some(StockStatus::from_availability(availability))
}

fn stock_from_message(doc: &ProductDocument) -> Option<StockStatus> {
    let message = doc.html.select(&sel::STOCK_MESSAGE).next()?;
    Some(StockStatus::from_label(&element_text(message)))
}

fn image_from_structured(doc: &ProductDocument) -> Option<String> {
    let image = doc.product()?.get("image")?;
    let url = match image {
        Value::String(s) => s.as_str(),
        Value::Array(items) => items.first()?.as_str()?,
        Value::Object(obj) => obj.get("url")?.as_str()?,
        _ => return None,
    };
    non_empty(url)
}

fn image_from_markup(doc: &ProductDocument) -> Option<String> {
    non_empty(doc.html.select(&sel::IMAGE).next()?.value().attr("src")?)
}

fn sizes_from_buttons(doc: &ProductDocument) -> Option<Vec<String>> {
    size_labels(doc.html.select(&sel::SIZE_OPTION))
}

fn sizes_from_classes(doc: &ProductDocument) -> Option<Vec<String>> {
    size_labels(
        doc.html
            .select(&sel::SPAN)
            .filter(|e| has_class_matching(e, &SIZE_CLASS)),
    )
}

fn size_labels<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> Option<Vec<String>> {
    let sizes: Vec<String> = elements
        .map(element_text)
        .filter(|label| !label.is_empty())
        .map(|label| normalize_size(&label))
        .collect();
    (!sizes.is_empty()).then_some(sizes)
}

fn variants_from_testid(doc: &ProductDocument) -> Option<Vec<VariantOffer>> {
    let controls: Vec<ElementRef<'_>> = doc
        .html
        .select(&sel::VARIANT_TESTID)
        .filter(|e| {
            e.value()
                .attr("data-testid")
                .is_some_and(|id| COLOUR_OPTION_TESTID.is_match(id))
        })
        .collect();
    read_variants(&doc.html, &controls)
}

fn variants_from_classes(doc: &ProductDocument) -> Option<Vec<VariantOffer>> {
    let controls: Vec<ElementRef<'_>> = doc
        .html
        .select(&sel::VARIANT_CLASSED)
        .filter(|e| has_class_matching(e, &COLOUR_OPTION_CLASS))
        .collect();
    read_variants(&doc.html, &controls)
}

/// Offers for the given colour controls. `None` when there are no controls,
/// so the next strategy gets a chance.
fn read_variants(html: &Html, controls: &[ElementRef<'_>]) -> Option<Vec<VariantOffer>> {
    if controls.is_empty() {
        return None;
    }
    tracing::debug!(count = controls.len(), "Variant controls found");
    Some(
        controls
            .iter()
            .filter_map(|control| read_variant(html, *control))
            .collect(),
    )
}

fn read_variant(html: &Html, control: ElementRef<'_>) -> Option<VariantOffer> {
    let name = variant_name(control);
    let container = control
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| matches!(e.value().name(), "div" | "li"))?;

    let mut current = None;
    let mut original = None;

    let price_box = find_next(html, container, |e| {
        matches!(e.value().name(), "div" | "span") && has_class_matching(e, &PRICE_CLASS)
    });
    if let Some(price_box) = price_box {
        current = first_price_in(price_box, &sel::PRICE_CURRENT_CLASS)
            .or_else(|| first_price_in(price_box, &sel::PRICE_CURRENT_TESTID));
        original = first_price_in(price_box, &sel::PRICE_WAS_CLASS)
            .or_else(|| first_price_in(price_box, &sel::PRICE_PREV_TESTID));
    }

    if current.is_none() {
        if let Some(sibling) = control.next_siblings().find_map(ElementRef::wrap) {
            let text: String = sibling.text().collect();
            let (sibling_current, sibling_original) = pound_amounts(&text);
            if sibling_current.is_some() {
                current = sibling_current;
            }
            if sibling_original.is_some() {
                original = sibling_original;
            }
        }
    }

    Some(VariantOffer {
        name,
        price: PricePair::new(current, original),
    })
}

fn variant_name(control: ElementRef<'_>) -> String {
    let text = element_text(control);
    if !text.is_empty() && text.chars().count() <= MAX_VARIANT_LABEL_CHARS {
        return text;
    }
    control
        .value()
        .attr("aria-label")
        .unwrap_or("Unknown")
        .to_string()
}

fn price_from_structured(doc: &ProductDocument) -> Option<f64> {
    value_as_f64(doc.offer()?.get("price")?).filter(|p| *p > 0.0)
}

fn price_from_current_class(doc: &ProductDocument) -> Option<f64> {
    first_price(&doc.html, &sel::PRICE_CURRENT_CLASS)
}

fn price_from_current_testid(doc: &ProductDocument) -> Option<f64> {
    first_price(&doc.html, &sel::PRICE_CURRENT_TESTID)
}

fn price_from_prev_testid(doc: &ProductDocument) -> Option<f64> {
    first_price(&doc.html, &sel::PRICE_PREV_TESTID)
}

/// Innermost element whose text holds a "was £N" phrase.
fn price_from_was_text(doc: &ProductDocument) -> Option<f64> {
    doc.html
        .select(&sel::WAS_TEXT_HOLDER)
        .filter(|e| mentions_was_price(&element_text(*e)))
        .find(|e| {
            !e.select(&sel::WAS_TEXT_HOLDER)
                .any(|child| child.id() != e.id() && mentions_was_price(&element_text(child)))
        })
        .and_then(|e| was_price(&element_text(e)))
}

/// Colour option labels shown on the page.
fn colour_labels(doc: &ProductDocument) -> Vec<String> {
    doc.html
        .select(&sel::COLOUR_LINK)
        .filter(|e| {
            e.value()
                .attr("data-testid")
                .is_some_and(|id| COLOUR_OPTION_TESTID.is_match(id))
        })
        .map(element_text)
        .filter(|label| !label.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn has_class_matching(element: &ElementRef<'_>, pattern: &Regex) -> bool {
    element.value().classes().any(|class| pattern.is_match(class))
}

fn first_price(html: &Html, selector: &scraper::Selector) -> Option<f64> {
    clean_price(&element_text(html.select(selector).next()?)).filter(|p| *p > 0.0)
}

fn first_price_in(element: ElementRef<'_>, selector: &scraper::Selector) -> Option<f64> {
    clean_price(&element_text(element.select(selector).next()?)).filter(|p| *p > 0.0)
}

/// First element after `from` in document order matching `pred`.
fn find_next<'a>(
    html: &'a Html,
    from: ElementRef<'a>,
    pred: impl Fn(&ElementRef<'a>) -> bool,
) -> Option<ElementRef<'a>> {
    html.root_element()
        .descendants()
        .skip_while(|node| node.id() != from.id())
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|e| pred(e))
}
