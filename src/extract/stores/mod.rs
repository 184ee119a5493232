//! Dedicated strategies for recognised stores.

mod aliexpress;
mod amazon;
mod backmarket;
mod ebay;
mod electronics;
mod refurbished;
mod zalando;

use std::sync::Arc;

pub use aliexpress::AliExpress;
pub use amazon::Amazon;
pub use backmarket::BackMarket;
pub use ebay::Ebay;
pub use electronics::{EPrice, MediaWorld, Unieuro};
pub use refurbished::{Juice, Refurbed, ReworkLabs, SmartGeneration, Swappie};
pub use zalando::Zalando;

use super::StrategyRegistry;

/// Amounts written `1.234,56`, used by stores that print several prices in one block.
pub(crate) const EURO_AMOUNT: &str = r"[\d.]+,\d{2}";

pub fn register_all(registry: StrategyRegistry) -> StrategyRegistry {
    registry
        .register("amazon.", Arc::new(Amazon::new()))
        .register("swappie.", Arc::new(Swappie::new()))
        .register("backmarket.", Arc::new(BackMarket::new()))
        .register("zalando.", Arc::new(Zalando::new()))
        .register("unieuro.", Arc::new(Unieuro::new()))
        .register("eprice.", Arc::new(EPrice::new()))
        .register("aliexpress.", Arc::new(AliExpress::new()))
        .register("ebay.", Arc::new(Ebay::new()))
        .register("mediaworld.", Arc::new(MediaWorld::new()))
        .register("smartgeneration.", Arc::new(SmartGeneration::new()))
        .register("rework-labs.", Arc::new(ReworkLabs::new()))
        .register("reworklabs.", Arc::new(ReworkLabs::new()))
        .register("juice.", Arc::new(Juice::new()))
        .register("refurbed.", Arc::new(Refurbed::new()))
}

#[cfg(test)]
pub(crate) mod testing {
    use url::Url;

    use crate::extract::{ExtractionStrategy, Page};
    use crate::types::RawExtractionResult;

    pub fn run(strategy: &dyn ExtractionStrategy, url: &str, html: &str) -> RawExtractionResult {
        let url = Url::parse(url).expect("url");
        let page = Page::parse(html, url.clone());
        strategy.extract(&page, &url)
    }

    pub fn features(result: &RawExtractionResult) -> Vec<String> {
        result
            .details
            .get("features")
            .and_then(|f| f.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
