//! Outbound identity for a fetch attempt: a User-Agent plus an optional proxy.

pub mod proxies;
pub mod user_agents;

pub use proxies::{ProxyDescriptor, ProxyLease, ProxyPool, ProxyStats};
pub use user_agents::UserAgentPool;

/// The identity used for one attempt.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_agent: String,
    pub proxy: Option<ProxyLease>,
}
