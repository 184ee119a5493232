use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::challenge::ChallengeDetectionResult;
use crate::config::{DEFAULT_CHECK_INTERVAL_MINUTES, DEFAULT_MAX_RETRIES, DEFAULT_SCRAPE_DELAY_MS};

/// Open-ended extraction bag: features, brand, seller, rating, shipping, ...
/// Unknown keys must survive persistence untouched.
pub type ProductDetails = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Tracked products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: i64,
    pub owner_id: i64,
    pub url: String,
    pub name: String,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub currency: String,
    pub current_price: f64,
    pub target_price: Option<f64>,
    /// Derived from the hostname at creation time.
    pub store: String,
    pub details: ProductDetails,
    pub available: bool,
    /// None means monitored indefinitely.
    pub monitoring_until: Option<NaiveDate>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl ProductRecord {
    /// True while the monitoring window has not ended. The end date itself is still monitored.
    pub fn is_monitored_on(&self, today: NaiveDate) -> bool {
        self.monitoring_until.map_or(true, |until| until >= today)
    }

    /// Earliest instant the next check may run. Never-checked products are due from the epoch.
    pub fn next_due(&self, interval: chrono::Duration) -> DateTime<Utc> {
        self.last_checked_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH) + interval
    }

    /// A genuine downward crossing of the target between two consecutive prices.
    pub fn crosses_target(&self, old_price: f64, new_price: f64) -> bool {
        match self.target_price {
            Some(target) => old_price > target && new_price <= target,
            None => false,
        }
    }
}

/// Insert payload for a freshly scraped product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub owner_id: i64,
    pub url: String,
    pub name: String,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub currency: String,
    pub current_price: f64,
    pub target_price: Option<f64>,
    pub store: String,
    pub details: ProductDetails,
    pub available: bool,
    pub monitoring_until: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceHistoryEntry {
    pub id: i64,
    pub product_id: i64,
    pub price: f64,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PriceDrop,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::PriceDrop => write!(f, "price_drop"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEvent {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub kind: NotificationKind,
    pub old_price: f64,
    pub new_price: f64,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Per-user tracking settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTrackingSettings {
    pub owner_id: i64,
    /// Minutes between checks of the same product, at least 1.
    pub check_interval_minutes: u32,
    /// Pause after each product of this owner.
    pub scrape_delay_ms: u64,
    pub max_retries: u32,
    pub email_notifications: bool,
}

impl UserTrackingSettings {
    pub fn defaults_for(owner_id: i64) -> Self {
        Self {
            owner_id,
            check_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
            scrape_delay_ms: DEFAULT_SCRAPE_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            email_notifications: true,
        }
    }

    pub fn check_interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.check_interval_minutes.max(1)))
    }

    pub fn scrape_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.scrape_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Extraction output
// ---------------------------------------------------------------------------

/// What one successful fetch produced. Transient: the price is still the raw
/// site string and must go through the price parser before use.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RawExtractionResult {
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    /// Verbatim price text, currency symbol and grouping preserved.
    pub price: Option<String>,
    pub currency: String,
    pub store: String,
    pub details: ProductDetails,
    pub available: bool,
    pub diagnostics: ExtractionDiagnostics,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionDiagnostics {
    pub strategy: String,
    pub attempts: u32,
    pub user_agent: String,
    pub proxy: Option<String>,
    pub final_url: String,
    /// The navigation deadline hit while the body was still streaming.
    pub partial_content: bool,
    pub challenge: Option<ChallengeDetectionResult>,
}
