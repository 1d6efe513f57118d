//! Best-effort extraction of listing facts from HTML.
//!
//! Shops don't share a markup vocabulary, so everything here is a
//! priority-ordered list of common selectors plus keyword scans. A miss
//! means "unknown", never an error — the evaluator treats absent facts as
//! not-satisfied.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use shopwatch_core::types::{Availability, Snapshot};

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[$£€¥₹]\s*[\d,]+\.?\d*").expect("price regex")
});

const NAME_SELECTORS: &[&str] = &[
    "h1[data-testid=\"product-title\"]",
    "h1.product-title",
    "h1#product-title",
    ".product-name h1",
    ".product-title",
    "h1",
    ".title h1",
    "[data-cy=\"product-name\"]",
];

const PRICE_SELECTORS: &[&str] = &[
    ".price",
    ".product-price",
    "[data-testid=\"price\"]",
    ".current-price",
    ".sale-price",
    ".regular-price",
    ".price-current",
    "[class*=\"price\"]",
];

const SIZE_SELECTORS: &[&str] = &[
    ".size-option",
    ".size-selector option",
    ".sizes button",
    "[data-testid=\"size-option\"]",
    ".size-variant",
];

const DELIVERY_SELECTORS: &[&str] = &[
    ".delivery-info",
    ".shipping-info",
    ".delivery-options",
    "[data-testid=\"delivery\"]",
];

const AVAILABILITY_SELECTORS: &[&str] = &[
    ".availability",
    ".stock-status",
    ".product-availability",
    "[data-testid=\"availability\"]",
];

const OUT_OF_STOCK_INDICATORS: &[&str] = &[
    "out of stock",
    "sold out",
    "not available",
    "unavailable",
    "temporarily out of stock",
    "currently unavailable",
];

/// Parse a listing page into a structured snapshot.
pub fn snapshot_from_html(html: &str) -> Snapshot {
    let doc = Html::parse_document(html);
    Snapshot {
        name: extract_name(&doc),
        availability: extract_availability(&doc),
        sizes: extract_sizes(&doc),
        price_text: extract_price_text(&doc),
        delivery_text: extract_delivery_text(&doc),
    }
}

fn select_text(doc: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let element = doc.select(&selector).next()?;
    let text = element.text().collect::<String>().trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

fn extract_name(doc: &Html) -> Option<String> {
    NAME_SELECTORS.iter().find_map(|css| select_text(doc, css))
}

fn extract_price_text(doc: &Html) -> Option<String> {
    for css in PRICE_SELECTORS {
        if let Some(text) = select_text(doc, css)
            && let Some(m) = PRICE_RE.find(&text)
        {
            return Some(m.as_str().to_string());
        }
    }
    None
}

fn extract_availability(doc: &Html) -> Availability {
    // Buy-button text is the most reliable signal
    if let Ok(selector) = Selector::parse("button, input") {
        for element in doc.select(&selector) {
            let text = element.text().collect::<String>().to_lowercase();
            if OUT_OF_STOCK_INDICATORS.iter().any(|ind| text.contains(ind)) {
                return Availability::OutOfStock;
            }
        }
    }
    for css in AVAILABILITY_SELECTORS {
        if let Some(text) = select_text(doc, css) {
            let text = text.to_lowercase();
            if OUT_OF_STOCK_INDICATORS.iter().any(|ind| text.contains(ind)) {
                return Availability::OutOfStock;
            }
        }
    }
    Availability::InStock
}

fn extract_sizes(doc: &Html) -> Vec<String> {
    let mut sizes = Vec::new();
    for css in SIZE_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        for element in doc.select(&selector) {
            // <option> carries its size in the value attribute
            let size = if element.value().name() == "option" {
                element
                    .value()
                    .attr("value")
                    .map(str::to_string)
                    .filter(|v| !v.is_empty())
            } else {
                let text = element.text().collect::<String>().trim().to_string();
                if text.is_empty() { None } else { Some(text) }
            };
            if let Some(size) = size
                && !sizes.contains(&size)
            {
                sizes.push(size);
            }
        }
    }
    sizes
}

fn extract_delivery_text(doc: &Html) -> Option<String> {
    DELIVERY_SELECTORS
        .iter()
        .find_map(|css| select_text(doc, css))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
            <h1 class="product-title">Trail Runner X</h1>
            <span class="price">was ₹2,499 now ₹1,299.00</span>
            <div class="sizes">
                <button>40</button>
                <button>42</button>
                <button>42</button>
            </div>
            <select class="size-selector">
                <option value="">pick one</option>
                <option value="44">44</option>
            </select>
            <div class="delivery-info">Free delivery available by Friday</div>
            <button>Add to cart</button>
        </body></html>
    "#;

    #[test]
    fn extracts_full_listing() {
        let snap = snapshot_from_html(LISTING);
        assert_eq!(snap.name.as_deref(), Some("Trail Runner X"));
        assert_eq!(snap.price_text.as_deref(), Some("₹2,499"));
        assert_eq!(snap.availability, Availability::InStock);
        let mut sizes = snap.sizes.clone();
        sizes.sort();
        assert_eq!(sizes, vec!["40", "42", "44"]);
        assert_eq!(
            snap.delivery_text.as_deref(),
            Some("Free delivery available by Friday")
        );
    }

    #[test]
    fn out_of_stock_button_wins() {
        let html = r#"<html><body>
            <h1>Gone Thing</h1>
            <button>Sold Out</button>
        </body></html>"#;
        let snap = snapshot_from_html(html);
        assert_eq!(snap.availability, Availability::OutOfStock);
    }

    #[test]
    fn out_of_stock_status_block() {
        let html = r#"<html><body>
            <h1>Thing</h1>
            <div class="stock-status">Currently unavailable</div>
            <button>Notify me</button>
        </body></html>"#;
        let snap = snapshot_from_html(html);
        assert_eq!(snap.availability, Availability::OutOfStock);
    }

    #[test]
    fn empty_page_is_unknown_but_in_stock() {
        let snap = snapshot_from_html("<html><body></body></html>");
        assert_eq!(snap.name, None);
        assert_eq!(snap.price_text, None);
        assert!(snap.sizes.is_empty());
        assert_eq!(snap.delivery_text, None);
        assert_eq!(snap.availability, Availability::InStock);
    }
}
