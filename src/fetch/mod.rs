//! Retry/backoff driver around a [`PageLoader`].
//!
//! Each attempt picks an identity, loads the page, runs the challenge detector
//! and, on a clean page, the store strategy. Challenges and transport failures
//! are retried with exponential backoff until the attempt budget runs out.

pub mod backoff;
pub mod loader;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::latency::LatencyStats;
use crate::challenge::{ChallengeDetectionResult, ChallengeDetector, ChallengeType};
use crate::config::{BackoffConfig, Config};
use crate::error::ScrapeError;
use crate::extract::{Page, StrategyRegistry};
use crate::identity::{Identity, ProxyPool, UserAgentPool};
use crate::types::RawExtractionResult;
pub use backoff::backoff_delay;
pub use loader::{HttpPageLoader, LoadError, LoadRequest, LoadedPage, PageLoader};

#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
    /// Total attempts per fetch when the caller does not pass its own budget.
    pub max_attempts: u32,
    pub navigation_timeout: Duration,
    pub backoff: BackoffConfig,
}

impl FetchSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_attempts: cfg.fetch_max_attempts,
            navigation_timeout: Duration::from_secs(cfg.fetch_navigation_timeout_secs),
            backoff: cfg.backoff,
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            navigation_timeout: Duration::from_secs(30),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Outcome of inspecting one loaded page.
enum Inspection {
    Extracted(RawExtractionResult),
    Challenged(ChallengeDetectionResult),
}

pub struct FetchOrchestrator {
    loader: Arc<dyn PageLoader>,
    user_agents: Arc<UserAgentPool>,
    proxies: Arc<ProxyPool>,
    detector: Arc<ChallengeDetector>,
    registry: Arc<StrategyRegistry>,
    latency: Arc<LatencyStats>,
    settings: FetchSettings,
}

impl FetchOrchestrator {
    pub fn new(
        loader: Arc<dyn PageLoader>,
        user_agents: Arc<UserAgentPool>,
        proxies: Arc<ProxyPool>,
        detector: Arc<ChallengeDetector>,
        registry: Arc<StrategyRegistry>,
        latency: Arc<LatencyStats>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            loader,
            user_agents,
            proxies,
            detector,
            registry,
            latency,
            settings,
        }
    }

    /// Fetch and extract `url` with up to `max_attempts` attempts (the configured
    /// default when `None`). The URL must already have passed the allow-list.
    pub async fn fetch(
        &self,
        url: &Url,
        max_attempts: Option<u32>,
    ) -> std::result::Result<RawExtractionResult, ScrapeError> {
        let budget = max_attempts.unwrap_or(self.settings.max_attempts).max(1);
        let started = Instant::now();
        let outcome = self.attempt_loop(url, budget).await;
        self.latency.record(started.elapsed());

        match &outcome {
            Ok(result) => info!(
                strategy = %result.diagnostics.strategy,
                attempts = result.diagnostics.attempts,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "[FETCH] {} ok (price={:?})",
                url,
                result.price
            ),
            Err(e) => warn!("[FETCH] {} failed: {e}", url),
        }
        outcome
    }

    async fn attempt_loop(
        &self,
        url: &Url,
        budget: u32,
    ) -> std::result::Result<RawExtractionResult, ScrapeError> {
        let host = url.host_str().unwrap_or_default().to_string();
        let mut last_failure = String::from("no attempt made");
        let mut previous_agent: Option<String> = None;

        for attempt in 0..budget {
            let attempts = attempt + 1;
            let identity = self.identity_for(&host, previous_agent.as_deref());
            previous_agent = Some(identity.user_agent.clone());
            let request = LoadRequest {
                url: url.clone(),
                user_agent: identity.user_agent.clone(),
                proxy: identity.proxy.as_ref().map(|lease| lease.descriptor.clone()),
                session_cookie: loader::session_cookie(),
                timeout: self.settings.navigation_timeout,
            };
            debug!(
                attempt = attempts,
                budget,
                proxy = ?request.proxy.as_ref().map(|p| p.server.as_str()),
                "[FETCH] loading {url}"
            );

            match self.loader.load(&request).await {
                Ok(loaded) => {
                    debug!(status = loaded.status, bytes = loaded.html.len(), "[FETCH] {url} loaded");
                    if loaded.partial {
                        warn!("[FETCH] {url} navigation deadline hit, continuing with partial content");
                    }
                    match self.inspect(url, loaded, &identity, attempts) {
                        Inspection::Extracted(result) => return Ok(result),
                        Inspection::Challenged(detection) => {
                            if let Some(lease) = &identity.proxy {
                                self.proxies.mark_failed(lease);
                            }
                            let kind = detection.challenge_type.unwrap_or(ChallengeType::Unknown);
                            if attempts >= budget {
                                return Err(ScrapeError::ChallengeBlocked { kind, attempts });
                            }
                            last_failure = format!("{kind} challenge ({}%)", detection.confidence);
                        }
                    }
                }
                Err(e) if e.is_retryable() => {
                    warn!("[FETCH] attempt {attempts}/{budget} for {url} failed: {e}");
                    last_failure = e.to_string();
                }
                Err(e) => {
                    return Err(ScrapeError::FetchFailed {
                        attempts,
                        reason: e.to_string(),
                    })
                }
            }

            if attempts < budget {
                let delay = backoff_delay(&self.settings.backoff, attempt, &mut rand::thread_rng());
                info!("[FETCH] retrying {url} in {}ms ({last_failure})", delay.as_millis());
                tokio::time::sleep(delay).await;
            }
        }

        Err(ScrapeError::FetchFailed {
            attempts: budget,
            reason: last_failure,
        })
    }

    /// First attempt leans on the store's browser affinity; retries move away from
    /// the agent this fetch used last.
    fn identity_for(&self, host: &str, previous_agent: Option<&str>) -> Identity {
        let user_agent = match previous_agent {
            None => self.user_agents.pick_for_domain(host),
            Some(last) => self.user_agents.pick_different_from_last(last),
        };
        Identity {
            user_agent,
            proxy: self.proxies.random_active(),
        }
    }

    /// Parse, detect and extract in one synchronous step; the parsed document never
    /// crosses an await.
    fn inspect(&self, url: &Url, loaded: LoadedPage, identity: &Identity, attempts: u32) -> Inspection {
        let page = Page::parse(&loaded.html, loaded.final_url.clone());
        let detection = self.detector.inspect(&page);
        if detection.detected {
            return Inspection::Challenged(detection);
        }

        let strategy = self.registry.for_domain(url.host_str().unwrap_or_default());
        let mut result = strategy.extract(&page, page.url());
        let diagnostics = &mut result.diagnostics;
        diagnostics.attempts = attempts;
        diagnostics.user_agent = identity.user_agent.clone();
        diagnostics.proxy = identity.proxy.as_ref().map(|l| l.descriptor.server.clone());
        diagnostics.final_url = loaded.final_url.to_string();
        diagnostics.partial_content = loaded.partial;
        diagnostics.challenge = (detection.confidence > 0).then_some(detection);
        Inspection::Extracted(result)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;

    /// Replays scripted outcomes; the last one repeats once the script runs out.
    pub struct ScriptedLoader {
        script: Mutex<VecDeque<Result<String, LoadError>>>,
        pub calls: AtomicU32,
        pub requests: Mutex<Vec<(Instant, LoadRequest)>>,
    }

    impl ScriptedLoader {
        pub fn new(script: Vec<Result<String, LoadError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn always(html: &str) -> Self {
            Self::new(vec![Ok(html.to_string())])
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageLoader for ScriptedLoader {
        async fn load(&self, request: &LoadRequest) -> Result<LoadedPage, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push((Instant::now(), request.clone()));
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front()
                } else {
                    script.front().map(|r| match r {
                        Ok(html) => Ok(html.clone()),
                        Err(e) => Err(clone_error(e)),
                    })
                }
            };
            match next.expect("script is never empty") {
                Ok(html) => Ok(LoadedPage {
                    final_url: request.url.clone(),
                    status: 200,
                    html,
                    partial: false,
                }),
                Err(e) => Err(e),
            }
        }
    }

    fn clone_error(e: &LoadError) -> LoadError {
        match e {
            LoadError::Navigation(m) => LoadError::Navigation(m.clone()),
            LoadError::Timeout(d) => LoadError::Timeout(*d),
            LoadError::Protocol(m) => LoadError::Protocol(m.clone()),
            LoadError::Status(s) => LoadError::Status(*s),
            LoadError::Fatal(m) => LoadError::Fatal(m.clone()),
        }
    }

    pub fn orchestrator(loader: Arc<dyn PageLoader>, proxies: ProxyPool, max_attempts: u32) -> FetchOrchestrator {
        FetchOrchestrator::new(
            loader,
            Arc::new(UserAgentPool::new()),
            Arc::new(proxies),
            Arc::new(ChallengeDetector::new()),
            Arc::new(StrategyRegistry::with_default_stores()),
            Arc::new(LatencyStats::new()),
            FetchSettings {
                max_attempts,
                ..FetchSettings::default()
            },
        )
    }

    pub const CAPTCHA_PAGE: &str = r#"<html><head><title>Amazon CAPTCHA</title></head><body>
        <form action="/errors/validateCaptcha"><input id="captchacharacters" type="text"></form>
        </body></html>"#;

    pub const PRODUCT_PAGE: &str = r#"<html><head><title>Echo Dot</title></head><body>
        <span id="productTitle">Echo Dot (5a generazione)</span>
        <span class="a-price"><span class="a-offscreen">64,99 €</span></span>
        </body></html>"#;
}
