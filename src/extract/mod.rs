//! Extraction strategies: one per recognised store plus a generic fallback.

pub mod draft;
pub mod features;
pub mod generic;
pub mod page;
pub mod stores;
pub mod structured;

use std::sync::Arc;

use url::Url;

use crate::types::RawExtractionResult;
pub use generic::GenericStrategy;
pub use page::Page;

/// Turns a loaded page into a raw product record. Implementations are stateless
/// apart from precompiled patterns and may be shared across tasks.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, page: &Page, url: &Url) -> RawExtractionResult;
}

/// Ordered hostname-fragment table. First match wins; no match falls through to
/// the fallback strategy.
pub struct StrategyRegistry {
    routes: Vec<(&'static str, Arc<dyn ExtractionStrategy>)>,
    fallback: Arc<dyn ExtractionStrategy>,
}

impl StrategyRegistry {
    pub fn new(fallback: Arc<dyn ExtractionStrategy>) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
        }
    }

    pub fn register(mut self, fragment: &'static str, strategy: Arc<dyn ExtractionStrategy>) -> Self {
        self.routes.push((fragment, strategy));
        self
    }

    /// Every built-in store strategy, generic fallback last.
    pub fn with_default_stores() -> Self {
        stores::register_all(Self::new(Arc::new(GenericStrategy::new())))
    }

    pub fn for_domain(&self, hostname: &str) -> Arc<dyn ExtractionStrategy> {
        let host = hostname.to_ascii_lowercase();
        self.routes
            .iter()
            .find(|(fragment, _)| host.contains(fragment))
            .map(|(_, strategy)| Arc::clone(strategy))
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.routes
            .iter()
            .map(|(_, s)| s.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_by_hostname_fragment() {
        let registry = StrategyRegistry::with_default_stores();
        let cases = [
            ("www.amazon.it", "amazon"),
            ("amazon.co.uk", "amazon"),
            ("www.swappie.com", "swappie"),
            ("www.backmarket.it", "backmarket"),
            ("www.zalando.it", "zalando"),
            ("www.unieuro.it", "unieuro"),
            ("www.eprice.it", "eprice"),
            ("it.aliexpress.com", "aliexpress"),
            ("www.ebay.it", "ebay"),
            ("www.mediaworld.it", "mediaworld"),
            ("www.smartgeneration.it", "smartgeneration"),
            ("www.rework-labs.com", "reworklabs"),
            ("www.juice.it", "juice"),
            ("www.refurbed.it", "refurbed"),
            ("WWW.AMAZON.DE", "amazon"),
            ("shop.example.com", "generic"),
        ];
        for (host, expected) in cases {
            assert_eq!(registry.for_domain(host).name(), expected, "{host}");
        }
    }

    #[test]
    fn custom_routes_take_precedence_in_order() {
        let registry = StrategyRegistry::new(Arc::new(GenericStrategy::new()))
            .register("example", Arc::new(stores::Ebay::new()));
        assert_eq!(registry.for_domain("shop.example.com").name(), "ebay");
        assert_eq!(registry.for_domain("other.org").name(), "generic");
        assert_eq!(registry.strategy_names(), vec!["ebay", "generic"]);
    }
}
