//! Hostname allow-list gating every fetch.
//!
//! The built-in set is always allowed. The dynamic set comes from a
//! [`DomainSource`] and is cached as an immutable snapshot that is swapped
//! once its TTL expires.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{info, warn};
use url::Url;

use crate::error::{Result, ScrapeError};

const BUILT_IN_HOSTS: &[&str] = &[
    "amazon.it",
    "amazon.com",
    "amazon.co.uk",
    "amazon.de",
    "amazon.fr",
    "amazon.es",
    "www.amazon.it",
    "www.amazon.com",
    "www.amazon.co.uk",
    "www.amazon.de",
    "www.amazon.fr",
    "www.amazon.es",
    "swappie.com",
    "www.swappie.com",
];

/// Supplies the configured (non built-in) hostnames.
#[async_trait]
pub trait DomainSource: Send + Sync {
    async fn enabled_hostnames(&self) -> Result<Vec<String>>;
}

struct Snapshot {
    hosts: Arc<HashSet<String>>,
    loaded_at: Option<Instant>,
}

pub struct AllowList {
    built_in: HashSet<String>,
    source: Option<Arc<dyn DomainSource>>,
    ttl: Duration,
    snapshot: RwLock<Snapshot>,
}

impl AllowList {
    pub fn new(source: Option<Arc<dyn DomainSource>>, ttl: Duration) -> Self {
        Self {
            built_in: BUILT_IN_HOSTS.iter().map(|h| h.to_string()).collect(),
            source,
            ttl,
            snapshot: RwLock::new(Snapshot {
                hosts: Arc::new(HashSet::new()),
                loaded_at: None,
            }),
        }
    }

    /// Only the built-in hosts.
    pub fn built_in_only() -> Self {
        Self::new(None, Duration::ZERO)
    }

    /// Parse and gate `raw`, returning the canonical URL. No network activity
    /// happens for a rejected URL.
    pub async fn validate(&self, raw: &str) -> std::result::Result<Url, ScrapeError> {
        let raw = raw.trim();
        let url = Url::parse(raw).map_err(|_| ScrapeError::InvalidUrl(raw.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ScrapeError::UnsupportedProtocol(url.scheme().to_string()));
        }

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_ascii_lowercase(),
            _ => return Err(ScrapeError::InvalidUrl(raw.to_string())),
        };

        if self.built_in.contains(&host) || self.dynamic_hosts().await.contains(&host) {
            Ok(url)
        } else {
            Err(ScrapeError::UnsupportedDomain(host))
        }
    }

    /// Current dynamic snapshot, reloaded from the source when stale. A failed
    /// reload keeps the previous snapshot until the next TTL window.
    pub async fn dynamic_hosts(&self) -> Arc<HashSet<String>> {
        let (current, stale) = self.read_snapshot();
        let Some(source) = &self.source else {
            return current;
        };
        if !stale {
            return current;
        }

        match source.enabled_hostnames().await {
            Ok(hosts) => {
                let hosts: Arc<HashSet<String>> = Arc::new(
                    hosts
                        .into_iter()
                        .map(|h| h.trim().to_ascii_lowercase())
                        .filter(|h| !h.is_empty())
                        .collect(),
                );
                info!("[ALLOWLIST] loaded {} configured domains", hosts.len());
                self.store_snapshot(Arc::clone(&hosts));
                hosts
            }
            Err(e) => {
                warn!("[ALLOWLIST] failed to load configured domains, using built-in list: {e}");
                self.store_snapshot(Arc::clone(&current));
                current
            }
        }
    }

    fn read_snapshot(&self) -> (Arc<HashSet<String>>, bool) {
        let snapshot = match self.snapshot.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let stale = snapshot
            .loaded_at
            .map_or(true, |at| at.elapsed() >= self.ttl);
        (Arc::clone(&snapshot.hosts), stale)
    }

    fn store_snapshot(&self, hosts: Arc<HashSet<String>>) {
        let mut snapshot = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *snapshot = Snapshot {
            hosts,
            loaded_at: Some(Instant::now()),
        };
    }
}
