use regex::Regex;
use url::Url;

use crate::extract::draft::{AvailabilityPolicy, Draft, PriceRule, StoreProfile};
use crate::extract::page::Page;
use crate::extract::ExtractionStrategy;
use crate::types::RawExtractionResult;

const PROFILE: StoreProfile = StoreProfile {
    store: "aliexpress",
    title: &[
        "h1[data-pl=\"product-title\"]",
        ".product-title-text",
        "h1[class*=\"ProductTitle\"]",
        "[class*=\"title--wrap\"] h1",
        "h1",
    ],
    price: &[
        "[class*=\"product-price-value\"]",
        "[class*=\"uniform-banner-box-price\"]",
        ".product-price-current",
        "[data-pl=\"product-price\"]",
        "[class*=\"Price\"] [class*=\"current\"]",
        "[itemprop=\"price\"]",
    ],
    image: &[
        ".pdp-image-view img",
        "[class*=\"slider--img\"]",
        ".product-image img",
        "[class*=\"gallery\"] img",
        "[itemprop=\"image\"]",
    ],
    description: &[".product-description", "[class*=\"Description\"]", "[itemprop=\"description\"]"],
    spec_rows: &[
        ".product-property-list li",
        "[class*=\"specifications\"] tr",
        "[class*=\"detail-list\"] li",
    ],
    sold_out: &["[class*=\"soldout\"]", "[class*=\"SoldOut\"]", ".product-no-stock"],
    purchase: &["[data-pl=\"add-to-cart\"]", "[class*=\"addToCart\"]", "button[class*=\"add-to-cart\"]"],
    policy: AvailabilityPolicy::Lenient,
    ..StoreProfile::EMPTY
};

pub struct AliExpress {
    price: PriceRule,
    thumbnail_suffix: Option<Regex>,
}

impl AliExpress {
    pub fn new() -> Self {
        Self {
            price: PriceRule::Whole,
            thumbnail_suffix: Regex::new(r"_\d+x\d+").ok(),
        }
    }

    /// `..._220x220.jpg_.webp` -> full-size image.
    fn full_size(&self, image: String) -> String {
        match &self.thumbnail_suffix {
            Some(re) => re.replace(&image, "").into_owned(),
            None => image,
        }
    }
}

impl Default for AliExpress {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStrategy for AliExpress {
    fn name(&self) -> &'static str {
        "aliexpress"
    }

    fn extract(&self, page: &Page, url: &Url) -> RawExtractionResult {
        let mut draft = Draft::from_profile(page, &PROFILE, &self.price);
        draft.image = draft.image.take().map(|i| self.full_size(i));

        let extras = [
            ("seller", &["[class*=\"store-name\"]", "[data-pl=\"store-name\"]"][..]),
            ("shipping", &["[class*=\"shipping-value\"]", "[data-pl=\"shipping-cost\"]"][..]),
            ("rating", &["[class*=\"review--rating\"]", "[itemprop=\"ratingValue\"]"][..]),
        ];
        for (key, selectors) in extras {
            if let Some(value) = page.first_text(selectors) {
                draft.insert_detail(key, value);
            }
        }

        draft.finish(page, url, PROFILE.store, PROFILE.policy, self.name())
    }
}
