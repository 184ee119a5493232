use url::Url;

use crate::extract::draft::{select_price, AvailabilityPolicy, Draft, PriceRule, StoreProfile};
use crate::extract::page::{element_text, Page};
use crate::extract::ExtractionStrategy;
use crate::types::RawExtractionResult;

/// Promotional price first; the regular price block only when there is no sale.
const SALE_PRICE: &[&str] = &[
    "[class*=\"PromotionalPrice\"]",
    "[data-testid=\"pdp-price-sale\"]",
    "[class*=\"sale-price\"]",
];

const PROFILE: StoreProfile = StoreProfile {
    store: "zalando",
    title: &[
        "h1[class*=\"ProductTitle\"]",
        "[data-testid=\"product-name\"]",
        "h1[class*=\"product-name\"]",
        "h1",
    ],
    price: &["[class*=\"ProductPrice\"]", "[data-testid=\"pdp-price\"]", "[itemprop=\"price\"]"],
    image: &[
        "[class*=\"ProductGallery\"] img",
        "[data-testid=\"pdp-image\"] img",
        ".product-media img",
        "[itemprop=\"image\"]",
    ],
    description: &[
        "[class*=\"ProductDescription\"]",
        "[data-testid=\"product-description\"]",
        "[itemprop=\"description\"]",
    ],
    bullets: &[
        "[class*=\"ProductDetail\"] li",
        "[data-testid=\"product-details\"] li",
        ".product-attributes li",
    ],
    sold_out: &[
        "[class*=\"SoldOut\"]",
        "[data-testid=\"sold-out-label\"]",
        "[class*=\"out-of-stock\"]",
    ],
    purchase: &["[class*=\"AddToCart\"]", "[data-testid=\"add-to-cart-button\"]"],
    policy: AvailabilityPolicy::Lenient,
    ..StoreProfile::EMPTY
};

pub struct Zalando {
    price: PriceRule,
}

impl Zalando {
    pub fn new() -> Self {
        Self {
            price: PriceRule::Whole,
        }
    }
}

impl Default for Zalando {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStrategy for Zalando {
    fn name(&self) -> &'static str {
        "zalando"
    }

    fn extract(&self, page: &Page, url: &Url) -> RawExtractionResult {
        let mut draft = Draft::from_profile(page, &PROFILE, &self.price);
        if let Some(sale) = select_price(page, SALE_PRICE, &self.price) {
            draft.price = Some(sale);
        }

        if let Some(brand) = page.first_text(&["[class*=\"BrandName\"]", "[data-testid=\"brand-name\"]"]) {
            draft.insert_detail("brand", brand);
        }

        let sizes: Vec<String> = page
            .select_all("[class*=\"SizeSelector\"] button:not([disabled]), [data-testid=\"size-button\"]:not([disabled])")
            .into_iter()
            .map(element_text)
            .filter(|s| !s.is_empty())
            .collect();
        if !sizes.is_empty() {
            draft.insert_detail("availableSizes", sizes);
        }

        draft.finish(page, url, PROFILE.store, PROFILE.policy, self.name())
    }
}
