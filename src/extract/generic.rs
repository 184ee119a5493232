use url::Url;

use super::draft::{AvailabilityPolicy, Draft, PriceRule, StoreProfile};
use super::page::Page;
use super::ExtractionStrategy;
use crate::types::RawExtractionResult;

/// Open-Graph style page metadata. Seed for every strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Baseline {
    pub title: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
}

impl Baseline {
    pub fn read(page: &Page) -> Self {
        Self {
            title: page.meta("og:title").or_else(|| page.meta("twitter:title")),
            image: page.meta("og:image").or_else(|| page.meta("twitter:image")),
            description: page.meta("og:description").or_else(|| page.meta("description")),
            price: page
                .meta("product:price:amount")
                .or_else(|| page.meta("og:price:amount"))
                .or_else(|| page.meta("price")),
            currency: page
                .meta("product:price:currency")
                .or_else(|| page.meta("og:price:currency"))
                .or_else(|| page.meta("priceCurrency")),
        }
    }
}

const GENERIC_PROFILE: StoreProfile = StoreProfile {
    bullets: &[
        "#features li",
        "[class*=\"feature\"] li",
        "[class*=\"highlight\"] li",
        "[class*=\"product-detail\"] li",
    ],
    spec_rows: &[
        "[class*=\"specification\"] tr",
        "[class*=\"spec-table\"] tr",
        "table.specs tr",
        "dl.spec-list div",
    ],
    sold_out: &["[class*=\"out-of-stock\"]", "[class*=\"sold-out\"]"],
    policy: AvailabilityPolicy::Lenient,
    ..StoreProfile::EMPTY
};

/// Default strategy for hosts without a dedicated one.
pub struct GenericStrategy {
    price: PriceRule,
}

impl GenericStrategy {
    pub fn new() -> Self {
        Self {
            price: PriceRule::Whole,
        }
    }
}

impl Default for GenericStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStrategy for GenericStrategy {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn extract(&self, page: &Page, url: &Url) -> RawExtractionResult {
        // Page metadata is the primary source here, so it goes in as the store layer.
        let baseline = Baseline::read(page);
        let mut draft = Draft::from_profile(page, &GENERIC_PROFILE, &self.price);
        draft.title = baseline.title;
        draft.image = baseline.image;
        draft.description = baseline.description;
        draft.price = baseline.price;
        draft.currency = baseline.currency;
        draft.finish(page, url, "", GENERIC_PROFILE.policy, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(url: &str, html: &str) -> RawExtractionResult {
        let url = Url::parse(url).expect("url");
        let page = Page::parse(html, url.clone());
        GenericStrategy::new().extract(&page, &url)
    }

    #[test]
    fn open_graph_baseline() {
        let result = extract(
            "https://www.somestore.it/p/1",
            r#"<html><head><title>Fallback title</title>
               <meta property="og:title" content="Cuffie Sony WH-1000XM5">
               <meta property="og:image" content="/img/xm5.jpg">
               <meta property="og:description" content="Noise cancelling">
               <meta property="product:price:amount" content="299.99">
               <meta property="product:price:currency" content="EUR">
               </head><body></body></html>"#,
        );
        assert_eq!(result.title.as_deref(), Some("Cuffie Sony WH-1000XM5"));
        assert_eq!(result.image_url.as_deref(), Some("https://www.somestore.it/img/xm5.jpg"));
        assert_eq!(result.price.as_deref(), Some("299.99"));
        assert_eq!(result.currency, "EUR");
        assert_eq!(result.store, "somestore.it");
        assert_eq!(result.diagnostics.strategy, "generic");
        assert!(result.available);
    }

    #[test]
    fn linked_data_beats_page_title() {
        let result = extract(
            "https://shop.example.org/item",
            r#"<html><head><title>Shop | Item 42 | Best deals</title>
               <script type="application/ld+json">{"@type":"Product","name":"Lenovo ThinkPad X1",
               "offers":{"price":"1349.00","priceCurrency":"EUR"}}</script></head><body></body></html>"#,
        );
        assert_eq!(result.title.as_deref(), Some("Lenovo ThinkPad X1"));
        assert_eq!(result.price.as_deref(), Some("1349.00"));
    }

    #[test]
    fn page_title_when_nothing_else() {
        let result = extract(
            "https://shop.example.org/item",
            "<html><head><title>Plain page</title></head><body><p>No prices here</p></body></html>",
        );
        assert_eq!(result.title.as_deref(), Some("Plain page"));
        assert_eq!(result.price, None);
        assert_eq!(result.currency, "EUR");
    }
}
