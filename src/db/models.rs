//! Row types for the tables in `migrations/`. Conversions into domain types live here
//! so queries stay plain `query_as` calls.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;

use crate::types::{
    NotificationEvent, NotificationKind, PriceHistoryEntry, ProductDetails, ProductRecord,
    UserTrackingSettings,
};

#[derive(Debug, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub user_id: i64,
    pub url: String,
    pub name: String,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub currency: String,
    pub current_price: f64,
    pub target_price: Option<f64>,
    pub store: String,
    pub details: Json<ProductDetails>,
    pub available: bool,
    pub monitoring_until: Option<NaiveDate>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for ProductRecord {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.user_id,
            url: row.url,
            name: row.name,
            image_url: row.image_url,
            description: row.description,
            currency: row.currency,
            current_price: row.current_price,
            target_price: row.target_price,
            store: row.store,
            details: row.details.0,
            available: row.available,
            monitoring_until: row.monitoring_until,
            last_checked_at: row.last_checked_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SettingsRow {
    pub user_id: i64,
    pub check_interval_minutes: i64,
    pub scrape_delay_ms: i64,
    pub max_retries: i64,
    pub email_notifications: bool,
}

impl From<SettingsRow> for UserTrackingSettings {
    fn from(row: SettingsRow) -> Self {
        Self {
            owner_id: row.user_id,
            check_interval_minutes: u32::try_from(row.check_interval_minutes.max(1)).unwrap_or(u32::MAX),
            scrape_delay_ms: u64::try_from(row.scrape_delay_ms).unwrap_or(0),
            max_retries: u32::try_from(row.max_retries).unwrap_or(0),
            email_notifications: row.email_notifications,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PriceHistoryRow {
    pub id: i64,
    pub product_id: i64,
    pub price: f64,
    pub recorded_at: DateTime<Utc>,
}

impl From<PriceHistoryRow> for PriceHistoryEntry {
    fn from(row: PriceHistoryRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            price: row.price,
            recorded_at: row.recorded_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub old_price: f64,
    pub new_price: f64,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationEvent {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            kind: NotificationKind::PriceDrop,
            old_price: row.old_price,
            new_price: row.new_price,
            read: row.read,
            created_at: row.created_at,
        }
    }
}
