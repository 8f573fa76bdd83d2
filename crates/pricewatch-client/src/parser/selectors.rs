//! CSS selectors for storefront pages.
//!
//! Update this file when the storefront markup changes, together with the
//! fixtures in the parser tests.

use std::sync::LazyLock;

use scraper::Selector;

/// Embedded schema.org payload.
pub static STRUCTURED_DATA: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

/// Selectors for category listing pages.
pub mod listing {
    use super::*;

    /// Product card link, used when the page has no item list payload.
    pub static PRODUCT_LINK: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("a.product-card_c-product-card__link___7IQk").unwrap());
}

/// Selectors for product pages.
pub mod product {
    use super::*;

    pub static NAME: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("h1.product-header__name").unwrap());

    pub static STOCK_MESSAGE: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(".stock-availability-message").unwrap());

    pub static IMAGE: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("img.product-image").unwrap());

    pub static SIZE_OPTION: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(r#"a[data-testid="size:option:button"]"#).unwrap());

    /// Candidates for the class-based size fallback.
    pub static SPAN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span").unwrap());

    /// Candidates for variant controls carrying a test id.
    pub static VARIANT_TESTID: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("button[data-testid], a[data-testid]").unwrap());

    /// Candidates for the class-based variant fallback.
    pub static VARIANT_CLASSED: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("button[class], span[class]").unwrap());

    /// Colour option links listed for display.
    pub static COLOUR_LINK: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("a[data-testid]").unwrap());

    pub static PRICE_CURRENT_CLASS: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(".prod-price__current").unwrap());

    pub static PRICE_CURRENT_TESTID: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(r#"span[data-testid="price-current"]"#).unwrap());

    pub static PRICE_WAS_CLASS: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(".prod-price__was").unwrap());

    pub static PRICE_PREV_TESTID: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(r#"span[data-testid="price-prev"]"#).unwrap());

    /// Elements that may hold a "was £N" phrase.
    pub static WAS_TEXT_HOLDER: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("span, div, s").unwrap());
}
