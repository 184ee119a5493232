use serde_json::Value;
use url::Url;

use crate::config::DESCRIPTION_MAX_CHARS;
use crate::extract::draft::{truncate_chars, AvailabilityPolicy, Draft, PriceRule, StoreProfile, TextMarker};
use crate::extract::page::Page;
use crate::extract::ExtractionStrategy;
use crate::types::RawExtractionResult;

const PROFILE: StoreProfile = StoreProfile {
    store: "backmarket",
    title: &["[data-qa=\"product-title\"]", "h1"],
    price: &["[data-qa=\"product-price\"]"],
    image: &["img[data-qa=\"product-image\"]"],
    description: &["[data-qa=\"product-description\"]", "#product-description"],
    spec_rows: &[
        "[data-qa=\"technical-specifications\"] li",
        ".technical-specifications li",
        "dl.spec-list div",
    ],
    sold_out_text: &[TextMarker {
        scope: "body",
        phrases: &["Esaurito", "Out of stock"],
    }],
    purchase: &["[data-qa=\"add-to-cart-button\"]"],
    policy: AvailabilityPolicy::PurchaseActionRequired,
    ..StoreProfile::EMPTY
};

pub struct BackMarket {
    price: PriceRule,
}

impl BackMarket {
    pub fn new() -> Self {
        Self {
            price: PriceRule::Whole,
        }
    }
}

impl Default for BackMarket {
    fn default() -> Self {
        Self::new()
    }
}

/// Product state embedded by the storefront's server renderer.
fn next_data_product(page: &Page) -> Option<Value> {
    let data = page.script_json("__NEXT_DATA__")?;
    let props = data.get("props")?.get("pageProps")?;
    props
        .get("product")
        .or_else(|| props.get("initialState").and_then(|s| s.get("product")))
        .cloned()
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl ExtractionStrategy for BackMarket {
    fn name(&self) -> &'static str {
        "backmarket"
    }

    fn extract(&self, page: &Page, url: &Url) -> RawExtractionResult {
        let mut draft = Draft::from_profile(page, &PROFILE, &self.price);

        if let Some(product) = next_data_product(page) {
            if draft.title.is_none() {
                draft.title = text_field(&product, "title");
            }
            if draft.price.is_none() {
                draft.price = product.get("price").and_then(|p| text_field(p, "amount"));
                draft.currency = product.get("price").and_then(|p| text_field(p, "currency"));
            }
            if draft.description.is_none() {
                draft.description = text_field(&product, "description")
                    .map(|d| truncate_chars(&d, DESCRIPTION_MAX_CHARS));
            }
            if draft.image.is_none() {
                draft.image = text_field(&product, "imageUrl").or_else(|| {
                    product
                        .get("images")
                        .and_then(Value::as_array)
                        .and_then(|imgs| imgs.first())
                        .and_then(Value::as_str)
                        .map(str::to_string)
                });
            }
            if draft.features.is_empty() {
                if let Some(specs) = product.get("specifications").and_then(Value::as_array) {
                    draft.features = specs
                        .iter()
                        .filter_map(|s| Some(format!("{}: {}", text_field(s, "name")?, text_field(s, "value")?)))
                        .collect();
                }
            }
            if let Some(in_stock) = product
                .get("stock")
                .and_then(|s| s.get("available"))
                .and_then(Value::as_bool)
            {
                draft.store_available = Some(in_stock);
            }
        }

        draft.finish(page, url, PROFILE.store, PROFILE.policy, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::stores::testing::{features, run};

    #[test]
    fn markup_page_with_add_to_cart() {
        let html = r#"<body>
            <h1 data-qa="product-title">iPhone 14 128 GB - Mezzanotte</h1>
            <div data-qa="product-price">€ 529,00</div>
            <img data-qa="product-image" src="https://img.backmarket.com/14.jpg">
            <dl class="spec-list"><div><dt>Memoria</dt><dd>128 GB</dd></div></dl>
            <button data-qa="add-to-cart-button">Aggiungi al carrello</button>
            </body>"#;
        let result = run(&BackMarket::new(), "https://www.backmarket.it/it-it/p/iphone-14", html);
        assert_eq!(result.title.as_deref(), Some("iPhone 14 128 GB - Mezzanotte"));
        assert_eq!(result.price.as_deref(), Some("€ 529,00"));
        assert_eq!(features(&result), vec!["Memoria: 128 GB"]);
        assert!(result.available);
    }

    #[test]
    fn missing_purchase_control_means_unavailable() {
        let html = r#"<body><h1>iPad</h1><div data-qa="product-price">€ 300,00</div></body>"#;
        assert!(!run(&BackMarket::new(), "https://www.backmarket.it/p/x", html).available);
    }

    #[test]
    fn next_data_fills_gaps_and_decides_stock() {
        let html = r#"<body><h1></h1>
            <script id="__NEXT_DATA__" type="application/json">
            {"props":{"pageProps":{"initialState":{"product":{
                "title":"Galaxy S22","price":{"amount":"399.00","currency":"EUR"},
                "stock":{"available":false},"images":["https://img.backmarket.com/s22.jpg"],
                "specifications":[{"name":"Colore","value":"Nero"}]}}}}}
            </script>
            <button data-qa="add-to-cart-button">Aggiungi</button></body>"#;
        let result = run(&BackMarket::new(), "https://www.backmarket.it/p/s22", html);
        assert_eq!(result.title.as_deref(), Some("Galaxy S22"));
        assert_eq!(result.price.as_deref(), Some("399.00"));
        assert_eq!(result.image_url.as_deref(), Some("https://img.backmarket.com/s22.jpg"));
        assert_eq!(features(&result), vec!["Colore: Nero"]);
        assert!(!result.available, "stock flag beats the purchase control");
    }

    #[test]
    fn sold_out_text_wins() {
        let html = r#"<body><h1>Watch</h1><div data-qa="product-price">€ 99,00</div><p>Esaurito</p>
            <button data-qa="add-to-cart-button">Aggiungi</button></body>"#;
        assert!(!run(&BackMarket::new(), "https://www.backmarket.it/p/w", html).available);
    }
}
