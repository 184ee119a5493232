//! Refurbished-electronics marketplaces.

use url::Url;

use super::EURO_AMOUNT;
use crate::extract::draft::{AvailabilityPolicy, Draft, PriceRule, StoreProfile, TextMarker};
use crate::extract::generic::Baseline;
use crate::extract::page::{element_text, Page};
use crate::extract::ExtractionStrategy;
use crate::types::RawExtractionResult;

/// Swappie prints instalment amounts next to the real price; only three-digit euro figures count.
const SWAPPIE_PRICE: &str = r"€\s*\d{3,}|\d{3,}\s*€";
const SHORT_DESCRIPTION_CHARS: usize = 50;

const MAGENTO_SPEC_ROWS: &[&str] = &["#product-attribute-specs-table tr", ".additional-attributes tr"];
const MAGENTO_BULLETS: &[&str] = &[
    ".product.attribute.description li",
    ".product-info-description li",
    ".product.description li",
];
const MAGENTO_DESCRIPTION: &[&str] = &[
    ".product.attribute.description .value",
    ".product-info-description",
    "[itemprop=\"description\"]",
];

const SWAPPIE: StoreProfile = StoreProfile {
    store: "swappie",
    price: &[
        "[class*=\"price\"] [class*=\"value\"]",
        "[class*=\"Price\"]",
        "h2[class*=\"price\"]",
        "div[class*=\"price\"] span",
        "[data-testid=\"price\"]",
    ],
    description: &["[class*=\"description\"]", "[class*=\"Description\"]"],
    bullets: &[
        "[class*=\"spec\"] li",
        "[class*=\"Spec\"] li",
        "[class*=\"attribute\"] li",
        "[class*=\"Attribute\"] li",
    ],
    sold_out: &["[class*=\"out-of-stock\"]", "[class*=\"OutOfStock\"]", "[class*=\"sold-out\"]"],
    policy: AvailabilityPolicy::Lenient,
    ..StoreProfile::EMPTY
};

const SWAPPIE_DETAIL_ROWS: &[&str] = &["[class*=\"detail\"] [class*=\"row\"]", "[class*=\"Detail\"] [class*=\"Row\"]"];

const SMART_GENERATION: StoreProfile = StoreProfile {
    store: "smartgeneration",
    price: &[".price"],
    description: MAGENTO_DESCRIPTION,
    spec_rows: MAGENTO_SPEC_ROWS,
    bullets: MAGENTO_BULLETS,
    purchase: &["#product-addtocart-button", "button[title=\"Aggiungi al Carrello\"]"],
    policy: AvailabilityPolicy::PriceOrPurchaseAction,
    ..StoreProfile::EMPTY
};

const REWORK_LABS: StoreProfile = StoreProfile {
    store: "reworklabs",
    price: &[".product-price", ".price", "#ProductPrice-product-template"],
    sold_out_text: &[TextMarker {
        scope: ".product-form__cart-submit",
        phrases: &["esaurito", "sold out"],
    }],
    policy: AvailabilityPolicy::Lenient,
    ..StoreProfile::EMPTY
};

const JUICE: StoreProfile = StoreProfile {
    store: "juice",
    price: &["[data-price-type=\"finalPrice\"] .price", ".price-box .price"],
    description: MAGENTO_DESCRIPTION,
    spec_rows: &[
        "#product-attribute-specs-table tr",
        ".additional-attributes tr",
        ".product-specs tr",
    ],
    bullets: &[
        ".product.attribute.description li",
        ".product-info-description li",
        ".product.description li",
        "[class*=\"feature\"] li",
        "[class*=\"highlight\"] li",
    ],
    sold_out_text: &[TextMarker {
        scope: ".stock.available span",
        phrases: &["non disponibile"],
    }],
    policy: AvailabilityPolicy::Lenient,
    ..StoreProfile::EMPTY
};

const REFURBED: StoreProfile = StoreProfile {
    store: "refurbed",
    price: &["[data-test=\"product-price\"]"],
    policy: AvailabilityPolicy::Lenient,
    ..StoreProfile::EMPTY
};

// ---------------------------------------------------------------------------
// Swappie
// ---------------------------------------------------------------------------

pub struct Swappie {
    price: PriceRule,
}

impl Swappie {
    pub fn new() -> Self {
        Self {
            price: PriceRule::require(SWAPPIE_PRICE),
        }
    }
}

impl Default for Swappie {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStrategy for Swappie {
    fn name(&self) -> &'static str {
        "swappie"
    }

    fn extract(&self, page: &Page, url: &Url) -> RawExtractionResult {
        let mut draft = Draft::from_profile(page, &SWAPPIE, &self.price);

        if draft.features.is_empty() {
            for css in SWAPPIE_DETAIL_ROWS {
                for row in page.select_all(css) {
                    let text = element_text(row);
                    let len = text.chars().count();
                    if len > 2 && len < 200 && !draft.features.contains(&text) {
                        draft.features.push(text);
                    }
                }
            }
        }

        // The page-level description only replaces a missing or terse meta description.
        let meta_description = Baseline::read(page).description;
        if meta_description
            .as_deref()
            .is_some_and(|d| d.chars().count() >= SHORT_DESCRIPTION_CHARS)
        {
            draft.description = meta_description;
        }

        draft.finish(page, url, SWAPPIE.store, SWAPPIE.policy, self.name())
    }
}

// ---------------------------------------------------------------------------
// Magento and Shopify storefronts
// ---------------------------------------------------------------------------

pub struct SmartGeneration {
    price: PriceRule,
}

impl SmartGeneration {
    pub fn new() -> Self {
        Self {
            price: PriceRule::first_match_or_whole(EURO_AMOUNT),
        }
    }
}

impl Default for SmartGeneration {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStrategy for SmartGeneration {
    fn name(&self) -> &'static str {
        "smartgeneration"
    }

    fn extract(&self, page: &Page, url: &Url) -> RawExtractionResult {
        Draft::from_profile(page, &SMART_GENERATION, &self.price).finish(
            page,
            url,
            SMART_GENERATION.store,
            SMART_GENERATION.policy,
            self.name(),
        )
    }
}

pub struct ReworkLabs {
    price: PriceRule,
}

impl ReworkLabs {
    pub fn new() -> Self {
        Self {
            price: PriceRule::last_match(EURO_AMOUNT),
        }
    }
}

impl Default for ReworkLabs {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStrategy for ReworkLabs {
    fn name(&self) -> &'static str {
        "reworklabs"
    }

    fn extract(&self, page: &Page, url: &Url) -> RawExtractionResult {
        Draft::from_profile(page, &REWORK_LABS, &self.price).finish(
            page,
            url,
            REWORK_LABS.store,
            REWORK_LABS.policy,
            self.name(),
        )
    }
}

pub struct Juice {
    price: PriceRule,
}

impl Juice {
    pub fn new() -> Self {
        Self {
            price: PriceRule::Whole,
        }
    }
}

impl Default for Juice {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStrategy for Juice {
    fn name(&self) -> &'static str {
        "juice"
    }

    fn extract(&self, page: &Page, url: &Url) -> RawExtractionResult {
        Draft::from_profile(page, &JUICE, &self.price).finish(page, url, JUICE.store, JUICE.policy, self.name())
    }
}

// ---------------------------------------------------------------------------
// Refurbed
// ---------------------------------------------------------------------------

/// Linked data carries price and stock; the markup price is the fallback.
pub struct Refurbed {
    price: PriceRule,
}

impl Refurbed {
    pub fn new() -> Self {
        Self {
            price: PriceRule::Whole,
        }
    }
}

impl Default for Refurbed {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStrategy for Refurbed {
    fn name(&self) -> &'static str {
        "refurbed"
    }

    fn extract(&self, page: &Page, url: &Url) -> RawExtractionResult {
        let mut draft = Draft::from_profile(page, &REFURBED, &self.price);
        let linked = crate::extract::structured::StructuredProduct::from_page(page);
        if let Some(price) = linked.and_then(|p| p.price) {
            draft.price = Some(price);
        }
        draft.finish(page, url, REFURBED.store, REFURBED.policy, self.name())
    }
}
