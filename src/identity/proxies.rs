use std::collections::HashSet;
use std::sync::Mutex;

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDescriptor {
    /// `scheme://host:port`
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyDescriptor {
    /// Accepts `scheme://[user:pass@]host[:port]`, `host:port` or `host:port:user:pass`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if raw.contains("://") {
            let url = url::Url::parse(raw).ok()?;
            let host = url.host_str()?;
            let port = url.port_or_known_default().unwrap_or(80);
            return Some(Self {
                server: format!("{}://{}:{}", url.scheme(), host, port),
                username: Some(url.username().to_string()).filter(|u| !u.is_empty()),
                password: url.password().map(str::to_string).filter(|p| !p.is_empty()),
            });
        }

        let parts: Vec<&str> = raw.split(':').collect();
        match parts.as_slice() {
            [host, port] => Some(Self {
                server: format!("http://{host}:{port}"),
                username: None,
                password: None,
            }),
            [host, port, user, pass, ..] => Some(Self {
                server: format!("http://{host}:{port}"),
                username: Some(user.to_string()),
                password: Some(pass.to_string()),
            }),
            _ => None,
        }
    }
}

/// A proxy handed out for one attempt. The index lets the caller flag exactly
/// this entry as failed even if other attempts picked proxies meanwhile.
#[derive(Debug, Clone)]
pub struct ProxyLease {
    pub index: usize,
    pub descriptor: ProxyDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProxyStats {
    pub total: usize,
    pub failed: usize,
    pub available: usize,
}

/// Session-scoped proxy rotation. Failure flags are never persisted.
pub struct ProxyPool {
    proxies: Vec<ProxyDescriptor>,
    failed: Mutex<HashSet<usize>>,
}

impl ProxyPool {
    pub fn new(proxies: Vec<ProxyDescriptor>) -> Self {
        Self {
            proxies,
            failed: Mutex::new(HashSet::new()),
        }
    }

    /// Parse a comma-separated list. Malformed entries are skipped with a warning.
    pub fn from_list(list: &str) -> Self {
        let proxies = list
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .filter_map(|p| {
                let parsed = ProxyDescriptor::parse(p);
                if parsed.is_none() {
                    warn!("[PROXY] ignoring malformed proxy entry: {p}");
                }
                parsed
            })
            .collect();
        Self::new(proxies)
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Random proxy among those not flagged failed. Once every entry has failed the
    /// flags are reset in the same critical section and a random entry is returned.
    pub fn random_active(&self) -> Option<ProxyLease> {
        if self.proxies.is_empty() {
            return None;
        }
        let mut failed = match self.failed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let active: Vec<usize> = (0..self.proxies.len())
            .filter(|i| !failed.contains(i))
            .collect();

        let mut rng = rand::thread_rng();
        let index = if active.is_empty() {
            info!("[PROXY] all {} proxies failed, resetting", self.proxies.len());
            failed.clear();
            rng.gen_range(0..self.proxies.len())
        } else {
            active[rng.gen_range(0..active.len())]
        };

        Some(ProxyLease {
            index,
            descriptor: self.proxies[index].clone(),
        })
    }

    pub fn mark_failed(&self, lease: &ProxyLease) {
        let mut failed = match self.failed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if lease.index < self.proxies.len() && failed.insert(lease.index) {
            warn!(
                proxy = %lease.descriptor.server,
                "[PROXY] marked proxy {} as failed ({}/{})",
                lease.index,
                failed.len(),
                self.proxies.len()
            );
        }
    }

    pub fn stats(&self) -> ProxyStats {
        let failed = self.failed.lock().map(|f| f.len()).unwrap_or(0);
        ProxyStats {
            total: self.proxies.len(),
            failed,
            available: self.proxies.len().saturating_sub(failed),
        }
    }
}
