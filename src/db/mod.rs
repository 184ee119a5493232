//! Persistence seams used by the tracker, the API and the allow-list.

pub mod models;
pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::types::{
    NewProduct, NotificationEvent, PriceHistoryEntry, ProductRecord, UserTrackingSettings,
};
pub use store::SqliteStore;

/// Everything one successful price check writes, applied atomically.
#[derive(Debug, Clone)]
pub struct PriceCheck {
    pub product_id: i64,
    pub owner_id: i64,
    pub old_price: f64,
    pub new_price: f64,
    pub available: bool,
    pub checked_at: DateTime<Utc>,
    /// Append a history entry.
    pub record_history: bool,
    /// Create a price-drop notification.
    pub notify: bool,
}

#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Products whose monitoring window is open on `today`.
    async fn monitored_products(&self, today: NaiveDate) -> Result<Vec<ProductRecord>>;

    async fn product(&self, id: i64) -> Result<Option<ProductRecord>>;

    async fn settings_for(&self, owner_id: i64) -> Result<Option<UserTrackingSettings>>;

    /// Insert a product together with its first history entry.
    async fn create_product(&self, product: &NewProduct, at: DateTime<Utc>) -> Result<ProductRecord>;

    /// Returns the notification created by the check, if any.
    async fn record_check(&self, check: &PriceCheck) -> Result<Option<NotificationEvent>>;

    async fn price_history(&self, product_id: i64) -> Result<Vec<PriceHistoryEntry>>;

    async fn notifications_for(&self, user_id: i64) -> Result<Vec<NotificationEvent>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn email_for(&self, user_id: i64) -> Result<Option<String>>;
}
