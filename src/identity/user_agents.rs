use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    Chrome,
    Firefox,
    Safari,
    Edge,
}

impl BrowserFamily {
    fn of(user_agent: &str) -> Self {
        if user_agent.contains("Edg/") {
            BrowserFamily::Edge
        } else if user_agent.contains("Firefox/") {
            BrowserFamily::Firefox
        } else if user_agent.contains("Chrome/") {
            BrowserFamily::Chrome
        } else {
            BrowserFamily::Safari
        }
    }
}

const DEFAULT_USER_AGENTS: &[&str] = &[
    // Chrome, Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 11.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Chrome, macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Firefox
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.0; rv:121.0) Gecko/20100101 Firefox/121.0",
    // Safari
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    // Edge
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 Edg/119.0.0.0",
];

/// Hostname fragment -> browser families that store tolerates best.
const STORE_AFFINITIES: &[(&str, &[BrowserFamily])] = &[
    ("amazon", &[BrowserFamily::Chrome, BrowserFamily::Edge]),
    ("ebay", &[BrowserFamily::Chrome, BrowserFamily::Firefox]),
    ("aliexpress", &[BrowserFamily::Chrome]),
];

struct Entry {
    user_agent: String,
    family: BrowserFamily,
}

/// Rotating User-Agent pool. Holds no per-fetch state; retries pass in the
/// agent they are moving away from.
pub struct UserAgentPool {
    entries: Vec<Entry>,
}

impl UserAgentPool {
    pub fn new() -> Self {
        Self::with_agents(DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect())
    }

    /// Build a pool from explicit strings. Empty input falls back to the built-in list.
    pub fn with_agents(agents: Vec<String>) -> Self {
        let agents = if agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect()
        } else {
            agents
        };
        let entries = agents
            .into_iter()
            .map(|ua| Entry {
                family: BrowserFamily::of(&ua),
                user_agent: ua,
            })
            .collect();
        Self { entries }
    }

    /// Pick a User-Agent, preferring browser families the store is known to accept.
    pub fn pick_for_domain(&self, hostname: &str) -> String {
        let host = hostname.to_ascii_lowercase();
        let preferred: Vec<usize> = STORE_AFFINITIES
            .iter()
            .find(|(fragment, _)| host.contains(fragment))
            .map(|(_, families)| {
                self.entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| families.contains(&e.family))
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default();

        let mut rng = rand::thread_rng();
        let index = if preferred.is_empty() {
            rng.gen_range(0..self.entries.len())
        } else {
            preferred[rng.gen_range(0..preferred.len())]
        };
        self.entries[index].user_agent.clone()
    }

    /// Pick a User-Agent other than `last`. Only a pool whose every member equals
    /// `last` can hand it back.
    pub fn pick_different_from_last(&self, last: &str) -> String {
        let others: Vec<&Entry> = self.entries.iter().filter(|e| e.user_agent != last).collect();
        let mut rng = rand::thread_rng();
        let entry = if others.is_empty() {
            &self.entries[rng.gen_range(0..self.entries.len())]
        } else {
            others[rng.gen_range(0..others.len())]
        };
        entry.user_agent.clone()
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self::new()
    }
}
