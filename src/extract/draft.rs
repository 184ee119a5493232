//! Per-page accumulator shared by every strategy.
//!
//! A strategy fills a [`Draft`] from its own selectors, adds whatever custom
//! fields it knows about, then calls [`Draft::finish`], which layers the
//! linked-data product and the generic baseline underneath and settles
//! availability.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use super::features::extract_features;
use super::generic::Baseline;
use super::page::{element_text, image_source, is_disabled, is_struck_through, Page};
use super::structured::StructuredProduct;
use crate::config::DESCRIPTION_MAX_CHARS;
use crate::types::{ExtractionDiagnostics, ProductDetails, RawExtractionResult};

/// How availability is settled once explicit signals are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityPolicy {
    /// Available unless a disabled purchase control says otherwise.
    Lenient,
    /// The store always shows a price; none means unavailable.
    PriceRequired,
    /// A missing or disabled purchase control means unavailable.
    PurchaseActionRequired,
    /// Purchase control or a resolvable price is enough.
    PriceOrPurchaseAction,
}

/// Scoped text that marks a product as sold out, matched case-insensitively.
pub struct TextMarker {
    /// Element whose text is searched; `body` searches the whole page text.
    pub scope: &'static str,
    pub phrases: &'static [&'static str],
}

/// Declarative selector table for one store. Lists are tried in order.
pub struct StoreProfile {
    pub store: &'static str,
    pub title: &'static [&'static str],
    pub price: &'static [&'static str],
    pub image: &'static [&'static str],
    pub description: &'static [&'static str],
    pub spec_rows: &'static [&'static str],
    pub bullets: &'static [&'static str],
    /// Presence of any of these means sold out.
    pub sold_out: &'static [&'static str],
    pub sold_out_text: &'static [TextMarker],
    /// Add-to-cart style controls.
    pub purchase: &'static [&'static str],
    pub policy: AvailabilityPolicy,
}

impl StoreProfile {
    pub const EMPTY: StoreProfile = StoreProfile {
        store: "",
        title: &[],
        price: &[],
        image: &[],
        description: &[],
        spec_rows: &[],
        bullets: &[],
        sold_out: &[],
        sold_out_text: &[],
        purchase: &[],
        policy: AvailabilityPolicy::Lenient,
    };
}

/// Which part of a price element's text is the price.
pub enum PriceRule {
    Whole,
    /// Candidates whose text does not match are skipped.
    Require(Regex),
    /// First match, or the whole text when nothing matches.
    FirstMatchOrWhole(Regex),
    /// Last match; the struck original usually comes first in the same block.
    LastMatch(Regex),
}

impl PriceRule {
    pub fn apply(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if !text.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }
        match self {
            PriceRule::Whole => Some(text.to_string()),
            PriceRule::Require(re) => re.is_match(text).then(|| text.to_string()),
            PriceRule::FirstMatchOrWhole(re) => Some(
                re.find(text)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| text.to_string()),
            ),
            PriceRule::LastMatch(re) => re.find_iter(text).last().map(|m| m.as_str().to_string()),
        }
    }

    /// `PriceRule` from a pattern; an invalid pattern degrades to [`PriceRule::Whole`].
    pub fn last_match(pattern: &str) -> Self {
        Regex::new(pattern).map(PriceRule::LastMatch).unwrap_or(PriceRule::Whole)
    }

    pub fn first_match_or_whole(pattern: &str) -> Self {
        Regex::new(pattern)
            .map(PriceRule::FirstMatchOrWhole)
            .unwrap_or(PriceRule::Whole)
    }

    pub fn require(pattern: &str) -> Self {
        Regex::new(pattern).map(PriceRule::Require).unwrap_or(PriceRule::Whole)
    }
}

/// Currency-adjacent amount for the last-resort body scan.
fn loose_price_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"[$€£]\s*\d+(?:[.,]\d{3})*(?:[.,]\d{1,2})?|\d+(?:[.,]\d{3})*(?:[.,]\d{1,2})?\s*[$€£]").ok()
        })
        .as_ref()
}

#[derive(Debug, Default)]
pub struct Draft {
    pub title: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
    pub features: Vec<String>,
    pub details: ProductDetails,
    pub sold_out: bool,
    /// A store-specific source settled availability outright.
    pub store_available: Option<bool>,
    /// None when the store has no purchase control selectors.
    pub purchase_action: Option<bool>,
}

impl Draft {
    pub fn from_profile(page: &Page, profile: &StoreProfile, price_rule: &PriceRule) -> Self {
        let description = page
            .first_text(profile.description)
            .map(|d| truncate_chars(&d, DESCRIPTION_MAX_CHARS));
        let features = extract_features(page, profile.spec_rows, profile.bullets, description.as_deref());

        let sold_out = profile.sold_out.iter().any(|css| page.exists(css))
            || profile.sold_out_text.iter().any(|marker| marker_matches(page, marker));

        let purchase_action = if profile.purchase.is_empty() {
            None
        } else {
            let control = profile.purchase.iter().find_map(|css| page.first(css));
            Some(control.is_some_and(|el| !is_disabled(el)))
        };

        Self {
            title: page.first_text(profile.title),
            image: first_image(page, profile.image),
            description,
            price: select_price(page, profile.price, price_rule),
            currency: None,
            features,
            details: ProductDetails::new(),
            sold_out,
            store_available: None,
            purchase_action,
        }
    }

    pub fn insert_detail(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.details.insert(key.to_string(), value.into());
    }

    /// Layer linked data and the generic baseline under the store fields and settle availability.
    pub fn finish(
        self,
        page: &Page,
        url: &Url,
        store: &str,
        policy: AvailabilityPolicy,
        strategy: &str,
    ) -> RawExtractionResult {
        let structured = StructuredProduct::from_page(page).unwrap_or_default();
        let baseline = Baseline::read(page);

        let title = self
            .title
            .or(structured.name.clone())
            .or(baseline.title.clone())
            .or_else(|| page.title());
        let image = self
            .image
            .or(structured.image.clone())
            .or(baseline.image.clone())
            .and_then(|i| page.absolutize(&i));
        let description = self
            .description
            .or(structured.description.clone())
            .or(baseline.description.clone());
        let mut price = self
            .price
            .or(structured.price.clone())
            .or(baseline.price.clone());

        let mut available = if self.sold_out {
            false
        } else if let Some(explicit) = self.store_available {
            explicit
        } else if let Some(declared) = structured.is_available() {
            declared
        } else {
            match policy {
                AvailabilityPolicy::Lenient => self.purchase_action != Some(false),
                AvailabilityPolicy::PriceRequired => price.is_some(),
                AvailabilityPolicy::PurchaseActionRequired => self.purchase_action == Some(true),
                AvailabilityPolicy::PriceOrPurchaseAction => {
                    self.purchase_action == Some(true) || price.is_some()
                }
            }
        };
        if price.is_none() && policy == AvailabilityPolicy::PriceRequired {
            available = false;
        }

        // Last resort: only when nothing says the product is gone, so shipping or
        // savings figures on a sold-out page are never read as the price.
        if price.is_none() && available {
            price = loose_price_pattern()
                .and_then(|re| re.find(&page.body_text()).map(|m| m.as_str().trim().to_string()));
        }

        let currency = self
            .currency
            .or(structured.currency)
            .or(baseline.currency)
            .or_else(|| price.as_deref().and_then(currency_from_symbol))
            .unwrap_or_else(|| "EUR".to_string());

        let mut details = self.details;
        if !self.features.is_empty() && !details.contains_key("features") {
            details.insert("features".to_string(), self.features.into());
        }
        if !details.contains_key("brand") {
            if let Some(brand) = structured.brand {
                details.insert("brand".to_string(), brand.into());
            }
        }

        RawExtractionResult {
            title,
            image_url: image,
            description,
            price,
            currency,
            store: if store.is_empty() { store_from_url(url) } else { store.to_string() },
            details,
            available,
            diagnostics: ExtractionDiagnostics {
                strategy: strategy.to_string(),
                final_url: page.url().to_string(),
                ..Default::default()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Shared selector helpers
// ---------------------------------------------------------------------------

/// Price from the first selector with a usable candidate, skipping struck-through
/// originals. A struck price is used only when nothing else matched.
pub fn select_price(page: &Page, selectors: &[&str], rule: &PriceRule) -> Option<String> {
    let mut struck = None;
    for css in selectors {
        for el in page.select_all(css) {
            let text = element_text(el);
            let raw = if text.is_empty() {
                el.value().attr("content").unwrap_or_default().to_string()
            } else {
                text
            };
            let Some(price) = rule.apply(&raw) else {
                continue;
            };
            if is_struck_through(el) {
                struck.get_or_insert(price);
                continue;
            }
            return Some(price);
        }
    }
    struck
}

pub fn first_image(page: &Page, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .find_map(|css| page.select_all(css).into_iter().find_map(image_source))
}

fn marker_matches(page: &Page, marker: &TextMarker) -> bool {
    let text = if marker.scope == "body" {
        page.body_text()
    } else {
        page.select_all(marker.scope)
            .into_iter()
            .map(element_text)
            .collect::<Vec<_>>()
            .join(" ")
    };
    let text = text.to_lowercase();
    marker.phrases.iter().any(|p| text.contains(&p.to_lowercase()))
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn currency_from_symbol(price: &str) -> Option<String> {
    let code = if price.contains('€') {
        "EUR"
    } else if price.contains('£') {
        "GBP"
    } else if price.contains('$') {
        "USD"
    } else {
        return None;
    };
    Some(code.to_string())
}

/// Hostname without a leading `www.`.
pub fn store_from_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}
