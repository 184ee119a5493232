use regex::Regex;
use url::Url;

use crate::extract::draft::{AvailabilityPolicy, Draft, PriceRule, StoreProfile, TextMarker};
use crate::extract::page::Page;
use crate::extract::ExtractionStrategy;
use crate::types::RawExtractionResult;

const PROFILE: StoreProfile = StoreProfile {
    store: "amazon",
    title: &["#productTitle"],
    price: &[
        ".a-price .a-offscreen",
        "#priceblock_ourprice",
        "#priceblock_dealprice",
        ".a-price-whole",
        "#corePrice_feature_div .a-price .a-offscreen",
        "#corePriceDisplay_desktop_feature_div .a-price .a-offscreen",
        "#corePrice_desktop .a-price .a-offscreen",
        ".apexPriceToPay .a-offscreen",
        ".priceToPay .a-offscreen",
        "#apex_desktop .a-price .a-offscreen",
    ],
    image: &["#landingImage", "#imgBlkFront", "#ebooksImgBlkFront"],
    bullets: &["#feature-bullets li span.a-list-item"],
    sold_out_text: &[TextMarker {
        scope: "#availability",
        phrases: &["non disponibile", "currently unavailable", "out of stock", "nicht verfügbar", "no disponible"],
    }],
    policy: AvailabilityPolicy::PriceRequired,
    ..StoreProfile::EMPTY
};

/// Descriptions shorter than this are replaced by the first feature bullets.
const SHORT_DESCRIPTION_CHARS: usize = 50;

pub struct Amazon {
    price: PriceRule,
    title_suffix: Option<Regex>,
    dynamic_image: Option<Regex>,
}

impl Amazon {
    pub fn new() -> Self {
        Self {
            price: PriceRule::Whole,
            title_suffix: Regex::new(r"(?i)\s*:\s*Amazon\.(it|com|co\.uk|de|fr|es).*$").ok(),
            dynamic_image: Regex::new(r#""(https?://[^"]+)""#).ok(),
        }
    }

    /// `data-a-dynamic-image` is a JSON object keyed by image URL; the first key is the main image.
    fn dynamic_image(&self, page: &Page) -> Option<String> {
        let raw = page.first_attr(PROFILE.image, "data-a-dynamic-image")?;
        let re = self.dynamic_image.as_ref()?;
        re.captures(&raw).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
    }

    fn strip_title_suffix(&self, title: String) -> String {
        match &self.title_suffix {
            Some(re) => re.replace(&title, "").trim().to_string(),
            None => title,
        }
    }
}

impl Default for Amazon {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStrategy for Amazon {
    fn name(&self) -> &'static str {
        "amazon"
    }

    fn extract(&self, page: &Page, url: &Url) -> RawExtractionResult {
        let mut draft = Draft::from_profile(page, &PROFILE, &self.price);
        if draft.image.is_none() {
            draft.image = self.dynamic_image(page);
        }

        let from_markup_title = draft.title.is_some();
        let short_description = draft
            .description
            .as_deref()
            .map_or(true, |d| d.chars().count() < SHORT_DESCRIPTION_CHARS);
        let bullet_summary = (!draft.features.is_empty()).then(|| {
            draft.features.iter().take(3).cloned().collect::<Vec<_>>().join("\n")
        });

        let mut result = draft.finish(page, url, PROFILE.store, PROFILE.policy, self.name());

        if !from_markup_title {
            result.title = result.title.map(|t| self.strip_title_suffix(t));
        }
        let final_is_short = result
            .description
            .as_deref()
            .map_or(true, |d| d.chars().count() < SHORT_DESCRIPTION_CHARS);
        if short_description && final_is_short {
            if let Some(summary) = bullet_summary {
                result.description = Some(summary);
            }
        }
        result
    }
}
