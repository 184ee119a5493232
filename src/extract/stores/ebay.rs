use url::Url;

use crate::extract::draft::{AvailabilityPolicy, Draft, PriceRule, StoreProfile};
use crate::extract::page::Page;
use crate::extract::ExtractionStrategy;
use crate::types::RawExtractionResult;

const PROFILE: StoreProfile = StoreProfile {
    store: "ebay",
    title: &[".x-item-title__mainTitle", "#itemTitle"],
    price: &[".x-price-primary", "#prcIsum"],
    image: &[".ux-image-carousel-item.image-treatment.active img", "#icImg"],
    bullets: &[".ux-layout-section-evo__col .ux-labels-values__values"],
    sold_out: &[".d-quantity__availability--soldout", "#msgPanel .sold-out"],
    policy: AvailabilityPolicy::Lenient,
    ..StoreProfile::EMPTY
};

pub struct Ebay {
    price: PriceRule,
}

impl Ebay {
    pub fn new() -> Self {
        Self {
            price: PriceRule::Whole,
        }
    }
}

impl Default for Ebay {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStrategy for Ebay {
    fn name(&self) -> &'static str {
        "ebay"
    }

    fn extract(&self, page: &Page, url: &Url) -> RawExtractionResult {
        let mut draft = Draft::from_profile(page, &PROFILE, &self.price);
        draft.title = draft
            .title
            .take()
            .map(|t| t.replace("Details about", "").trim().to_string())
            .filter(|t| !t.is_empty());
        draft.finish(page, url, PROFILE.store, PROFILE.policy, self.name())
    }
}
