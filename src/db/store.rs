use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;

use super::models::{NotificationRow, PriceHistoryRow, ProductRow, SettingsRow};
use super::{PriceCheck, TrackingStore, UserDirectory};
use crate::allowlist::DomainSource;
use crate::error::Result;
use crate::types::{
    NewProduct, NotificationEvent, NotificationKind, PriceHistoryEntry, ProductRecord,
    UserTrackingSettings,
};

const PRODUCT_COLUMNS: &str = "id, user_id, url, name, image_url, description, currency, \
     current_price, target_price, store, details, available, monitoring_until, last_checked_at";

/// SQLite-backed implementation of every persistence seam.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn create_user(&self, email: &str) -> Result<i64> {
        let id = sqlx::query("INSERT INTO users (email) VALUES (?)")
            .bind(email)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    pub async fn save_settings(&self, settings: &UserTrackingSettings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, check_interval_minutes, scrape_delay_ms, max_retries, email_notifications)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                check_interval_minutes = excluded.check_interval_minutes,
                scrape_delay_ms = excluded.scrape_delay_ms,
                max_retries = excluded.max_retries,
                email_notifications = excluded.email_notifications
            "#,
        )
        .bind(settings.owner_id)
        .bind(i64::from(settings.check_interval_minutes.max(1)))
        .bind(i64::try_from(settings.scrape_delay_ms).unwrap_or(i64::MAX))
        .bind(i64::from(settings.max_retries))
        .bind(settings.email_notifications)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TrackingStore for SqliteStore {
    async fn monitored_products(&self, today: NaiveDate) -> Result<Vec<ProductRecord>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE monitoring_until IS NULL OR monitoring_until >= ? \
             ORDER BY user_id, id"
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ProductRecord::from).collect())
    }

    async fn product(&self, id: i64) -> Result<Option<ProductRecord>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(ProductRecord::from))
    }

    async fn settings_for(&self, owner_id: i64) -> Result<Option<UserTrackingSettings>> {
        let row: Option<SettingsRow> = sqlx::query_as(
            "SELECT user_id, check_interval_minutes, scrape_delay_ms, max_retries, email_notifications \
             FROM user_settings WHERE user_id = ?",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserTrackingSettings::from))
    }

    async fn create_product(&self, product: &NewProduct, at: DateTime<Utc>) -> Result<ProductRecord> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            r#"
            INSERT INTO products (
                user_id, url, name, image_url, description, currency, current_price,
                target_price, store, details, available, monitoring_until, last_checked_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(product.owner_id)
        .bind(&product.url)
        .bind(&product.name)
        .bind(&product.image_url)
        .bind(&product.description)
        .bind(&product.currency)
        .bind(product.current_price)
        .bind(product.target_price)
        .bind(&product.store)
        .bind(Json(&product.details))
        .bind(product.available)
        .bind(product.monitoring_until)
        .bind(at)
        .bind(at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query("INSERT INTO price_history (product_id, price, recorded_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(product.current_price)
            .bind(at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(ProductRecord {
            id,
            owner_id: product.owner_id,
            url: product.url.clone(),
            name: product.name.clone(),
            image_url: product.image_url.clone(),
            description: product.description.clone(),
            currency: product.currency.clone(),
            current_price: product.current_price,
            target_price: product.target_price,
            store: product.store.clone(),
            details: product.details.clone(),
            available: product.available,
            monitoring_until: product.monitoring_until,
            last_checked_at: Some(at),
        })
    }

    async fn record_check(&self, check: &PriceCheck) -> Result<Option<NotificationEvent>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE products SET current_price = ?, available = ?, last_checked_at = ? WHERE id = ?",
        )
        .bind(check.new_price)
        .bind(check.available)
        .bind(check.checked_at)
        .bind(check.product_id)
        .execute(&mut *tx)
        .await?;

        if check.record_history {
            sqlx::query("INSERT INTO price_history (product_id, price, recorded_at) VALUES (?, ?, ?)")
                .bind(check.product_id)
                .bind(check.new_price)
                .bind(check.checked_at)
                .execute(&mut *tx)
                .await?;
        }

        let notification = if check.notify {
            let kind = NotificationKind::PriceDrop;
            let id = sqlx::query(
                "INSERT INTO notifications (user_id, product_id, kind, old_price, new_price, read, created_at) \
                 VALUES (?, ?, ?, ?, ?, 0, ?)",
            )
            .bind(check.owner_id)
            .bind(check.product_id)
            .bind(kind.to_string())
            .bind(check.old_price)
            .bind(check.new_price)
            .bind(check.checked_at)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
            Some(NotificationEvent {
                id,
                user_id: check.owner_id,
                product_id: check.product_id,
                kind,
                old_price: check.old_price,
                new_price: check.new_price,
                read: false,
                created_at: check.checked_at,
            })
        } else {
            None
        };

        tx.commit().await?;
        Ok(notification)
    }

    async fn price_history(&self, product_id: i64) -> Result<Vec<PriceHistoryEntry>> {
        let rows: Vec<PriceHistoryRow> = sqlx::query_as(
            "SELECT id, product_id, price, recorded_at FROM price_history \
             WHERE product_id = ? ORDER BY recorded_at, id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PriceHistoryEntry::from).collect())
    }

    async fn notifications_for(&self, user_id: i64) -> Result<Vec<NotificationEvent>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT id, user_id, product_id, old_price, new_price, read, created_at FROM notifications \
             WHERE user_id = ? AND kind = 'price_drop' ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(NotificationEvent::from).collect())
    }
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn email_for(&self, user_id: i64) -> Result<Option<String>> {
        let email: Option<String> = sqlx::query_scalar("SELECT email FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(email)
    }
}

#[async_trait]
impl DomainSource for SqliteStore {
    async fn enabled_hostnames(&self) -> Result<Vec<String>> {
        let hosts: Vec<String> =
            sqlx::query_scalar("SELECT hostname FROM allowed_domains WHERE enabled = 1")
                .fetch_all(&self.pool)
                .await?;
        Ok(hosts)
    }
}
