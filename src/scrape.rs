//! The outbound `scrape(url)` contract: allow-list gate, then orchestrated fetch.

use std::sync::Arc;

use async_trait::async_trait;

use crate::allowlist::AllowList;
use crate::error::ScrapeError;
use crate::fetch::FetchOrchestrator;
use crate::types::RawExtractionResult;

#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Validate and fetch `url`. `max_attempts` overrides the default attempt budget.
    async fn scrape(
        &self,
        url: &str,
        max_attempts: Option<u32>,
    ) -> Result<RawExtractionResult, ScrapeError>;
}

pub struct ScrapeService {
    allowlist: Arc<AllowList>,
    orchestrator: Arc<FetchOrchestrator>,
}

impl ScrapeService {
    pub fn new(allowlist: Arc<AllowList>, orchestrator: Arc<FetchOrchestrator>) -> Self {
        Self {
            allowlist,
            orchestrator,
        }
    }
}

#[async_trait]
impl ProductSource for ScrapeService {
    async fn scrape(
        &self,
        url: &str,
        max_attempts: Option<u32>,
    ) -> Result<RawExtractionResult, ScrapeError> {
        let url = self.allowlist.validate(url).await?;
        self.orchestrator.fetch(&url, max_attempts).await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::fetch::testing::{orchestrator, ScriptedLoader, PRODUCT_PAGE};
    use crate::identity::ProxyPool;

    fn service(loader: Arc<ScriptedLoader>) -> ScrapeService {
        ScrapeService::new(
            Arc::new(AllowList::built_in_only()),
            Arc::new(orchestrator(loader, ProxyPool::new(Vec::new()), 3)),
        )
    }

    #[tokio::test]
    async fn unlisted_domain_never_reaches_the_network() {
        let loader = Arc::new(ScriptedLoader::always(PRODUCT_PAGE));
        let service = service(loader.clone());

        let err = service
            .scrape("https://www.unknown-shop.example/p/1", None)
            .await
            .unwrap_err();

        assert_matches!(err, ScrapeError::UnsupportedDomain(h) if h == "www.unknown-shop.example");
        assert_eq!(loader.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_before_fetching() {
        let loader = Arc::new(ScriptedLoader::always(PRODUCT_PAGE));
        let service = service(loader.clone());

        assert_matches!(
            service.scrape("javascript:alert(1)", None).await,
            Err(ScrapeError::UnsupportedProtocol(_))
        );
        assert_matches!(service.scrape("", None).await, Err(ScrapeError::InvalidUrl(_)));
        assert_eq!(loader.calls(), 0);
    }

    #[tokio::test]
    async fn listed_domain_is_fetched() {
        let loader = Arc::new(ScriptedLoader::always(PRODUCT_PAGE));
        let service = service(loader.clone());

        let result = service
            .scrape("https://www.amazon.it/dp/B09B8V1LZ3", None)
            .await
            .expect("scrape");
        assert_eq!(result.store, "amazon");
        assert_eq!(loader.calls(), 1);
    }
}
