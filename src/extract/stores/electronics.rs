//! Italian consumer-electronics chains.

use url::Url;

use crate::extract::draft::{AvailabilityPolicy, Draft, PriceRule, StoreProfile};
use crate::extract::page::Page;
use crate::extract::ExtractionStrategy;
use crate::types::RawExtractionResult;

const UNIEURO: StoreProfile = StoreProfile {
    store: "unieuro",
    title: &[
        "h1[class*=\"product-title\"]",
        "h1[data-testid=\"product-title\"]",
        ".product-detail__title",
        "h1",
    ],
    price: &[
        "[data-testid=\"product-price\"]",
        ".product-price__current",
        ".price-current",
        "[class*=\"price\"] [class*=\"current\"]",
        "[itemprop=\"price\"]",
    ],
    image: &[
        ".product-gallery__main img",
        "[data-testid=\"product-image\"] img",
        ".product-image img",
        "[itemprop=\"image\"]",
    ],
    description: &[
        ".product-description",
        "[itemprop=\"description\"]",
        "[data-testid=\"product-description\"]",
    ],
    spec_rows: &[
        ".product-specs tr",
        ".product-specifications tr",
        "[class*=\"specification\"] tr",
        "[class*=\"tech-specs\"] li",
    ],
    bullets: &[".product-highlights li", "[class*=\"feature\"] li", "[class*=\"highlight\"] li"],
    sold_out: &[".product-availability--unavailable", "[class*=\"out-of-stock\"]"],
    purchase: &[
        "[data-testid=\"add-to-cart\"]",
        ".add-to-cart-button",
        "button[class*=\"add-to-cart\"]",
    ],
    policy: AvailabilityPolicy::Lenient,
    ..StoreProfile::EMPTY
};

const EPRICE: StoreProfile = StoreProfile {
    store: "eprice",
    title: &["h1.product-title", "h1[itemprop=\"name\"]", ".product-name h1", "h1"],
    price: &[
        ".price-current",
        "[itemprop=\"price\"]",
        ".product-price",
        "[class*=\"price\"] strong",
        ".offer-price",
    ],
    image: &[".product-gallery img", "[itemprop=\"image\"]", ".product-image img", "#product-image"],
    description: &[".product-description", "[itemprop=\"description\"]", ".description-content"],
    spec_rows: &[
        ".specifications tr",
        ".tech-specs tr",
        "[class*=\"specs\"] li",
        ".product-features li",
    ],
    sold_out: &[".not-available", "[class*=\"out-of-stock\"]", ".esaurito"],
    purchase: &[".add-to-cart", "[data-action=\"add-to-cart\"]", "button[class*=\"cart\"]"],
    policy: AvailabilityPolicy::Lenient,
    ..StoreProfile::EMPTY
};

const MEDIAWORLD: StoreProfile = StoreProfile {
    store: "mediaworld",
    title: &["h1[data-test=\"product-title\"]", "h1"],
    price: &["[data-test=\"product-price\"]", "meta[itemprop=\"price\"]"],
    purchase: &["[data-test=\"add-to-cart-button\"]"],
    policy: AvailabilityPolicy::PurchaseActionRequired,
    ..StoreProfile::EMPTY
};

macro_rules! profile_strategy {
    ($name:ident, $profile:ident, $label:literal) => {
        pub struct $name {
            price: PriceRule,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    price: PriceRule::Whole,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl ExtractionStrategy for $name {
            fn name(&self) -> &'static str {
                $label
            }

            fn extract(&self, page: &Page, url: &Url) -> RawExtractionResult {
                Draft::from_profile(page, &$profile, &self.price).finish(
                    page,
                    url,
                    $profile.store,
                    $profile.policy,
                    self.name(),
                )
            }
        }
    };
}

profile_strategy!(Unieuro, UNIEURO, "unieuro");
profile_strategy!(EPrice, EPRICE, "eprice");
profile_strategy!(MediaWorld, MEDIAWORLD, "mediaworld");
