//! Periodic price tracking.
//!
//! One pass loads every monitored product, groups them by owner and checks the
//! due ones. Owners run in parallel up to a bound; each owner's products are
//! checked strictly one after another with the owner's pacing delay between them.

pub mod clock;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::config::{Config, PRICE_CHANGE_EPSILON};
use crate::db::{PriceCheck, TrackingStore};
use crate::error::{AppError, Result};
use crate::notify::Notifier;
use crate::price::parse_price;
use crate::scrape::ProductSource;
use crate::types::{NewProduct, ProductRecord, UserTrackingSettings};
pub use clock::{Clock, SystemClock};

#[derive(Debug, Clone, Copy)]
pub struct TrackerSettings {
    pub interval: Duration,
    pub owner_concurrency: usize,
    /// Hard cap for one product check, retries and backoff included.
    pub product_timeout: Duration,
}

impl TrackerSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            interval: Duration::from_secs(cfg.tracker_interval_secs.max(1)),
            owner_concurrency: cfg.tracker_owner_concurrency.max(1),
            product_timeout: Duration::from_secs(cfg.tracker_product_timeout_secs.max(1)),
        }
    }
}

/// What one product check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Updated { history: bool, notified: bool },
    /// No usable price on the page; nothing was written.
    Unparsable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub checked: usize,
    pub not_due: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub unparsable: usize,
    pub history_entries: usize,
    pub notifications: usize,
    pub failures: usize,
    pub skipped_in_flight: usize,
}

impl PassSummary {
    fn merge(&mut self, other: &PassSummary) {
        self.checked += other.checked;
        self.not_due += other.not_due;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.unparsable += other.unparsable;
        self.history_entries += other.history_entries;
        self.notifications += other.notifications;
        self.failures += other.failures;
        self.skipped_in_flight += other.skipped_in_flight;
    }

    fn count(&mut self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::Updated { history, notified } => {
                if history {
                    self.updated += 1;
                    self.history_entries += 1;
                } else {
                    self.unchanged += 1;
                }
                if notified {
                    self.notifications += 1;
                }
            }
            CheckOutcome::Unparsable => self.unparsable += 1,
        }
    }
}

/// Removes the product id from the in-flight set when the check ends, however it ends.
struct InFlight<'a> {
    set: &'a DashSet<i64>,
    id: i64,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a DashSet<i64>, id: i64) -> Option<Self> {
        set.insert(id).then(|| Self { set, id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

pub struct PriceTracker {
    store: Arc<dyn TrackingStore>,
    source: Arc<dyn ProductSource>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    in_flight: DashSet<i64>,
    health: Arc<HealthState>,
    settings: TrackerSettings,
}

impl PriceTracker {
    pub fn new(
        store: Arc<dyn TrackingStore>,
        source: Arc<dyn ProductSource>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            store,
            source,
            notifier,
            clock,
            in_flight: DashSet::new(),
            health: Arc::new(HealthState::new()),
            settings,
        }
    }

    /// Report scheduler liveness and pass results into a shared health state.
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = health;
        self
    }

    pub fn health(&self) -> &Arc<HealthState> {
        &self.health
    }

    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // first pass one interval after startup

        self.health.set_tracker_running(true);
        info!(
            interval_secs = self.settings.interval.as_secs(),
            "[TRACKER] started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!("[TRACKER] pass interrupted by shutdown");
                    break;
                }
                _ = self.run_tracking_pass() => {}
            }
        }
        self.health.set_tracker_running(false);
        info!("[TRACKER] stopped");
    }

    /// One full pass over every monitored product. Individual failures are
    /// logged and counted; they never abort the pass.
    pub async fn run_tracking_pass(&self) -> PassSummary {
        self.health.pass_started();
        let summary = self.pass().await;
        self.health.pass_finished(self.clock.now(), &summary);
        summary
    }

    async fn pass(&self) -> PassSummary {
        let today = self.clock.now().date_naive();
        let products = match self.store.monitored_products(today).await {
            Ok(products) => products,
            Err(e) => {
                error!("[TRACKER] could not load monitored products: {e}");
                return PassSummary::default();
            }
        };
        if products.is_empty() {
            debug!("[TRACKER] no monitored products");
            return PassSummary::default();
        }

        let mut by_owner: BTreeMap<i64, Vec<ProductRecord>> = BTreeMap::new();
        for product in products {
            by_owner.entry(product.owner_id).or_default().push(product);
        }
        info!(
            owners = by_owner.len(),
            "[TRACKER] pass started for {} products",
            by_owner.values().map(Vec::len).sum::<usize>()
        );

        let per_owner: Vec<PassSummary> = stream::iter(by_owner)
            .map(|(owner, products)| self.check_owner(owner, products))
            .buffer_unordered(self.settings.owner_concurrency)
            .collect()
            .await;

        let mut summary = PassSummary::default();
        for s in &per_owner {
            summary.merge(s);
        }
        info!(
            checked = summary.checked,
            not_due = summary.not_due,
            updated = summary.updated,
            unchanged = summary.unchanged,
            unparsable = summary.unparsable,
            notifications = summary.notifications,
            failures = summary.failures,
            skipped_in_flight = summary.skipped_in_flight,
            "[TRACKER] pass complete"
        );
        summary
    }

    async fn check_owner(&self, owner_id: i64, products: Vec<ProductRecord>) -> PassSummary {
        let settings = self.settings_for(owner_id).await;
        let mut summary = PassSummary::default();

        for listed in products {
            if self.clock.now() < listed.next_due(settings.check_interval()) {
                summary.not_due += 1;
                continue;
            }

            let Some(guard) = InFlight::acquire(&self.in_flight, listed.id) else {
                debug!(product_id = listed.id, "[TRACKER] already being checked, skipping");
                summary.skipped_in_flight += 1;
                continue;
            };

            // The pass snapshot may predate a manual refresh; decide on the stored row.
            let product = match self.store.product(listed.id).await {
                Ok(Some(product)) => product,
                Ok(None) => {
                    debug!(product_id = listed.id, "[TRACKER] removed since the pass started");
                    continue;
                }
                Err(e) => {
                    warn!(product_id = listed.id, "[TRACKER] could not reload product: {e}");
                    summary.failures += 1;
                    continue;
                }
            };
            let now = self.clock.now();
            if !product.is_monitored_on(now.date_naive()) || now < product.next_due(settings.check_interval()) {
                summary.not_due += 1;
                continue;
            }

            summary.checked += 1;
            debug!(
                product_id = product.id,
                last_checked = ?product.last_checked_at,
                "[TRACKER] checking {}",
                product.name
            );
            match self.check_product(&product, &settings).await {
                Ok(outcome) => summary.count(outcome),
                Err(AppError::Scrape(e)) if e.is_validation() => {
                    error!(product_id = product.id, "[TRACKER] {} can no longer be fetched: {e}", product.url);
                    summary.failures += 1;
                }
                Err(e) => {
                    warn!(product_id = product.id, "[TRACKER] check failed for {}: {e}", product.url);
                    summary.failures += 1;
                }
            }
            drop(guard);

            tokio::time::sleep(settings.scrape_delay()).await;
        }
        summary
    }

    async fn settings_for(&self, owner_id: i64) -> UserTrackingSettings {
        match self.store.settings_for(owner_id).await {
            Ok(Some(settings)) => settings,
            Ok(None) => UserTrackingSettings::defaults_for(owner_id),
            Err(e) => {
                warn!(owner_id, "[TRACKER] settings unavailable, using defaults: {e}");
                UserTrackingSettings::defaults_for(owner_id)
            }
        }
    }

    /// Scrape, parse and persist one product. Due-gating is the caller's concern.
    async fn check_product(
        &self,
        product: &ProductRecord,
        settings: &UserTrackingSettings,
    ) -> Result<CheckOutcome> {
        let budget = Some(settings.max_retries.max(1));
        let raw = timeout(self.settings.product_timeout, self.source.scrape(&product.url, budget))
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "product {} not checked within {:?}",
                    product.id, self.settings.product_timeout
                ))
            })??;

        let new_price = parse_price(raw.price.as_deref().unwrap_or_default(), &raw.currency);
        if new_price <= 0.0 {
            info!(product_id = product.id, raw = ?raw.price, "[TRACKER] could not extract a price for {}", product.name);
            return Ok(CheckOutcome::Unparsable);
        }

        let old_price = product.current_price;
        let changed = (new_price - old_price).abs() > PRICE_CHANGE_EPSILON;
        let notify = changed && product.crosses_target(old_price, new_price);
        let now = self.clock.now();
        let checked_at = product.last_checked_at.map_or(now, |prev| prev.max(now));

        let event = self
            .store
            .record_check(&PriceCheck {
                product_id: product.id,
                owner_id: product.owner_id,
                old_price,
                new_price,
                available: raw.available,
                checked_at,
                record_history: changed,
                notify,
            })
            .await?;

        if changed {
            info!(product_id = product.id, "[TRACKER] price changed for {}: {old_price} -> {new_price}", product.name);
        }
        let notified = event.is_some();
        if let Some(event) = event {
            info!(product_id = product.id, "[TRACKER] target price reached for {}", product.name);
            let mut updated = product.clone();
            updated.current_price = new_price;
            updated.last_checked_at = Some(checked_at);
            self.notifier.dispatch(updated, event, settings.email_notifications);
        }

        Ok(CheckOutcome::Updated {
            history: changed,
            notified,
        })
    }

    /// Manual refresh of one product, ignoring due-gating.
    pub async fn refresh_product(&self, id: i64) -> Result<(ProductRecord, CheckOutcome)> {
        let outcome = {
            let _guard = InFlight::acquire(&self.in_flight, id)
                .ok_or_else(|| AppError::Conflict(format!("product {id} is already being checked")))?;
            let product = self
                .store
                .product(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
            let settings = self.settings_for(product.owner_id).await;
            self.check_product(&product, &settings).await?
        };

        let refreshed = self
            .store
            .product(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
        Ok((refreshed, outcome))
    }

    /// Scrape `url` and start tracking it for `owner_id`.
    pub async fn add_product(
        &self,
        owner_id: i64,
        url: &str,
        target_price: Option<f64>,
        monitoring_until: Option<chrono::NaiveDate>,
    ) -> Result<ProductRecord> {
        if target_price.is_some_and(|t| !t.is_finite() || t < 0.0) {
            return Err(AppError::BadRequest("target_price must be a non-negative number".into()));
        }

        let raw = self.source.scrape(url, None).await?;
        let price = parse_price(raw.price.as_deref().unwrap_or_default(), &raw.currency);
        if price <= 0.0 {
            warn!("[TRACKER] no price found while adding {url}, tracking from 0");
        }

        let product = NewProduct {
            owner_id,
            url: url.trim().to_string(),
            name: raw.title.clone().unwrap_or_else(|| url.to_string()),
            image_url: raw.image_url.clone(),
            description: raw.description.clone(),
            currency: raw.currency.clone(),
            current_price: price,
            target_price,
            store: raw.store.clone(),
            details: raw.details.clone(),
            available: raw.available,
            monitoring_until,
        };
        let created = self.store.create_product(&product, self.clock.now()).await?;
        info!(product_id = created.id, owner_id, "[TRACKER] now tracking {}", created.name);
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use tokio::sync::Notify;

    use super::clock::testing::ManualClock;
    use super::*;
    use crate::db::store::testing::{memory_store, new_product};
    use crate::db::SqliteStore;
    use crate::error::ScrapeError;
    use crate::notify::testing::RecordingMailer;
    use crate::types::RawExtractionResult;

    /// Hands out scripted raw prices in order; `None` means the page had no price.
    struct ScriptedSource {
        script: Mutex<VecDeque<std::result::Result<Option<&'static str>, ScrapeError>>>,
        budgets: Mutex<Vec<Option<u32>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<std::result::Result<Option<&'static str>, ScrapeError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                budgets: Mutex::new(Vec::new()),
            }
        }

        fn prices(prices: &[&'static str]) -> Self {
            Self::new(prices.iter().map(|p| Ok(Some(*p))).collect())
        }

        fn calls(&self) -> usize {
            self.budgets.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProductSource for ScriptedSource {
        async fn scrape(
            &self,
            _url: &str,
            max_attempts: Option<u32>,
        ) -> std::result::Result<RawExtractionResult, ScrapeError> {
            self.budgets.lock().unwrap().push(max_attempts);
            let next = self.script.lock().unwrap().pop_front().unwrap_or(Err(ScrapeError::FetchFailed {
                attempts: 1,
                reason: "script exhausted".into(),
            }))?;
            Ok(RawExtractionResult {
                title: Some("Apple AirPods Pro".into()),
                price: next.map(str::to_string),
                currency: "EUR".into(),
                store: "amazon".into(),
                available: true,
                ..Default::default()
            })
        }
    }

    /// Answers "90,00 €" for every url, but holds scrapes of urls ending in
    /// `/slow` until released.
    #[derive(Default)]
    struct GatedSource {
        slow_started: Notify,
        release: Notify,
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProductSource for GatedSource {
        async fn scrape(
            &self,
            url: &str,
            _max_attempts: Option<u32>,
        ) -> std::result::Result<RawExtractionResult, ScrapeError> {
            self.urls.lock().unwrap().push(url.to_string());
            if url.ends_with("/slow") {
                self.slow_started.notify_one();
                self.release.notified().await;
            }
            Ok(RawExtractionResult {
                price: Some("90,00 €".into()),
                currency: "EUR".into(),
                store: "amazon".into(),
                available: true,
                ..Default::default()
            })
        }
    }

    struct Harness<S> {
        store: Arc<SqliteStore>,
        source: Arc<S>,
        clock: Arc<ManualClock>,
        tracker: PriceTracker,
        owner: i64,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("timestamp")
    }

    async fn harness<S: ProductSource + 'static>(source: S, interval_minutes: u32) -> Harness<S> {
        let store = Arc::new(memory_store().await);
        let owner = store.create_user("ada@example.com").await.unwrap();
        let mut settings = UserTrackingSettings::defaults_for(owner);
        settings.check_interval_minutes = interval_minutes;
        settings.scrape_delay_ms = 0;
        settings.max_retries = 2;
        store.save_settings(&settings).await.unwrap();

        let source = Arc::new(source);
        let clock = Arc::new(ManualClock::new(start()));
        let notifier = Notifier::new(
            Arc::new(RecordingMailer::default()),
            store.clone(),
            "http://localhost:5173".into(),
        );
        let tracker = PriceTracker::new(
            store.clone(),
            source.clone(),
            notifier,
            clock.clone(),
            TrackerSettings {
                interval: Duration::from_secs(60),
                owner_concurrency: 2,
                product_timeout: Duration::from_secs(30),
            },
        );
        Harness {
            store,
            source,
            clock,
            tracker,
            owner,
        }
    }

    #[tokio::test]
    async fn due_gating_at_the_interval_boundary() {
        let h = harness(ScriptedSource::prices(&["229,00 €"]), 60).await;
        let interval = chrono::Duration::minutes(60);
        let second = chrono::Duration::seconds(1);

        let not_yet = h
            .store
            .create_product(&new_product(h.owner, 229.0, None), start() - interval + second)
            .await
            .unwrap();
        let due = h
            .store
            .create_product(&new_product(h.owner, 229.0, None), start() - interval - second)
            .await
            .unwrap();

        let summary = h.tracker.run_tracking_pass().await;

        assert_eq!(summary.not_due, 1);
        assert_eq!(summary.checked, 1);
        assert_eq!(h.source.calls(), 1);
        let due = h.store.product(due.id).await.unwrap().unwrap();
        let not_yet_after = h.store.product(not_yet.id).await.unwrap().unwrap();
        assert_eq!(due.last_checked_at, Some(start()));
        assert_eq!(not_yet_after.last_checked_at, not_yet.last_checked_at);
    }

    #[tokio::test]
    async fn unchanged_price_writes_no_history_or_notification() {
        let h = harness(ScriptedSource::prices(&["90,00 €"]), 60).await;
        let product = h
            .store
            .create_product(&new_product(h.owner, 90.0, Some(100.0)), start() - chrono::Duration::days(1))
            .await
            .unwrap();

        let summary = h.tracker.run_tracking_pass().await;

        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.notifications, 0);
        assert_eq!(h.store.price_history(product.id).await.unwrap().len(), 1);
        assert!(h.store.notifications_for(h.owner).await.unwrap().is_empty());
        let reloaded = h.store.product(product.id).await.unwrap().unwrap();
        assert_eq!(reloaded.last_checked_at, Some(start()));
    }

    #[tokio::test]
    async fn single_notification_on_downward_crossing() {
        let h = harness(ScriptedSource::prices(&["90,00 €", "85,00 €"]), 60).await;
        let product = h
            .store
            .create_product(&new_product(h.owner, 120.0, Some(100.0)), start() - chrono::Duration::days(1))
            .await
            .unwrap();

        let first = h.tracker.run_tracking_pass().await;
        h.clock.advance(chrono::Duration::minutes(61));
        let second = h.tracker.run_tracking_pass().await;

        assert_eq!(first.notifications, 1);
        assert_eq!(second.notifications, 0);
        assert_eq!(second.updated, 1);

        let notifications = h.store.notifications_for(h.owner).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!((notifications[0].old_price, notifications[0].new_price), (120.0, 90.0));

        let history: Vec<f64> = h
            .store
            .price_history(product.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.price)
            .collect();
        assert_eq!(history, vec![120.0, 90.0, 85.0]);
    }

    #[tokio::test]
    async fn unparsable_price_leaves_the_record_alone() {
        let h = harness(ScriptedSource::new(vec![Ok(None)]), 60).await;
        let before = h
            .store
            .create_product(&new_product(h.owner, 229.0, None), start() - chrono::Duration::days(1))
            .await
            .unwrap();

        let summary = h.tracker.run_tracking_pass().await;

        assert_eq!(summary.unparsable, 1);
        assert_eq!(h.store.product(before.id).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn failures_do_not_abort_the_pass() {
        let h = harness(
            ScriptedSource::new(vec![
                Err(ScrapeError::ChallengeBlocked {
                    kind: crate::challenge::ChallengeType::Cloudflare,
                    attempts: 2,
                }),
                Ok(Some("199,00 €")),
            ]),
            60,
        )
        .await;
        let old = start() - chrono::Duration::days(1);
        h.store.create_product(&new_product(h.owner, 229.0, None), old).await.unwrap();
        let second = h
            .store
            .create_product(&new_product(h.owner, 229.0, None), old)
            .await
            .unwrap();

        let summary = h.tracker.run_tracking_pass().await;

        assert_eq!(summary.failures, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(h.store.product(second.id).await.unwrap().unwrap().current_price, 199.0);
        assert_eq!(*h.source.budgets.lock().unwrap(), vec![Some(2), Some(2)]);
        let health = h.tracker.health().snapshot();
        assert_eq!(health.last_pass_failures, 1);
        assert_eq!(health.last_pass_at, Some(start()));
    }

    #[tokio::test]
    async fn products_in_flight_are_skipped() {
        let h = harness(ScriptedSource::prices(&["199,00 €"]), 60).await;
        let product = h
            .store
            .create_product(&new_product(h.owner, 229.0, None), start() - chrono::Duration::days(1))
            .await
            .unwrap();
        h.tracker.in_flight.insert(product.id);

        let summary = h.tracker.run_tracking_pass().await;

        assert_eq!(summary.skipped_in_flight, 1);
        assert_eq!(h.source.calls(), 0);
        assert!(h.tracker.in_flight.contains(&product.id), "skipping must not release the marker");
        assert_matches!(
            h.tracker.refresh_product(product.id).await,
            Err(AppError::Conflict(_))
        );
    }

    fn product_at(owner: i64, url: &str, price: f64, target: Option<f64>) -> NewProduct {
        NewProduct {
            url: url.to_string(),
            ..new_product(owner, price, target)
        }
    }

    #[tokio::test]
    async fn refresh_is_refused_while_the_pass_checks_the_product() {
        let h = harness(GatedSource::default(), 60).await;
        let slow = h
            .store
            .create_product(
                &product_at(h.owner, "https://www.amazon.it/dp/slow", 120.0, None),
                start() - chrono::Duration::days(1),
            )
            .await
            .unwrap();
        let tracker = Arc::new(h.tracker);

        let pass = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.run_tracking_pass().await }
        });
        h.source.slow_started.notified().await;

        assert_matches!(tracker.refresh_product(slow.id).await, Err(AppError::Conflict(_)));

        h.source.release.notify_one();
        let summary = pass.await.expect("pass task");
        assert_eq!(summary.checked, 1);
        assert!(tracker.in_flight.is_empty());
        assert_eq!(h.source.urls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pass_rechecks_products_refreshed_after_it_started() {
        let h = harness(GatedSource::default(), 60).await;
        let yesterday = start() - chrono::Duration::days(1);
        h.store
            .create_product(&product_at(h.owner, "https://www.amazon.it/dp/slow", 229.0, None), yesterday)
            .await
            .unwrap();
        let fast = h
            .store
            .create_product(
                &product_at(h.owner, "https://www.amazon.it/dp/fast", 120.0, Some(100.0)),
                yesterday,
            )
            .await
            .unwrap();
        let tracker = Arc::new(h.tracker);

        let pass = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.run_tracking_pass().await }
        });
        h.source.slow_started.notified().await;

        // While the pass waits on the first product, the second one is refreshed by hand.
        let (refreshed, outcome) = tracker.refresh_product(fast.id).await.unwrap();
        assert_eq!(refreshed.current_price, 90.0);
        assert_eq!(outcome, CheckOutcome::Updated { history: true, notified: true });

        h.source.release.notify_one();
        let summary = pass.await.expect("pass task");

        assert_eq!(summary.checked, 1);
        assert_eq!(summary.not_due, 1);
        assert_eq!(summary.notifications, 0);
        assert_eq!(h.store.notifications_for(h.owner).await.unwrap().len(), 1);
        let history: Vec<f64> = h
            .store
            .price_history(fast.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.price)
            .collect();
        assert_eq!(history, vec![120.0, 90.0]);
    }

    #[tokio::test]
    async fn products_whose_window_closed_mid_pass_are_not_checked() {
        let h = harness(GatedSource::default(), 60).await;
        let yesterday = start() - chrono::Duration::days(1);
        h.store
            .create_product(&product_at(h.owner, "https://www.amazon.it/dp/slow", 229.0, None), yesterday)
            .await
            .unwrap();
        let ending = h
            .store
            .create_product(
                &NewProduct {
                    monitoring_until: Some(start().date_naive()),
                    ..product_at(h.owner, "https://www.amazon.it/dp/ending", 120.0, None)
                },
                yesterday,
            )
            .await
            .unwrap();
        let tracker = Arc::new(h.tracker);

        let pass = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.run_tracking_pass().await }
        });
        h.source.slow_started.notified().await;
        h.clock.advance(chrono::Duration::days(1));
        h.source.release.notify_one();
        let summary = pass.await.expect("pass task");

        assert_eq!(summary.checked, 1);
        assert_eq!(summary.not_due, 1);
        let untouched = h.store.product(ending.id).await.unwrap().unwrap();
        assert_eq!(untouched.current_price, 120.0);
        assert_eq!(*h.source.urls.lock().unwrap(), vec!["https://www.amazon.it/dp/slow".to_string()]);
    }

    #[tokio::test]
    async fn manual_refresh_ignores_due_gating() {
        let h = harness(ScriptedSource::prices(&["199,00 €"]), 60).await;
        let product = h
            .store
            .create_product(&new_product(h.owner, 229.0, None), start())
            .await
            .unwrap();

        let (refreshed, outcome) = h.tracker.refresh_product(product.id).await.unwrap();

        assert_eq!(refreshed.current_price, 199.0);
        assert_eq!(outcome, CheckOutcome::Updated { history: true, notified: false });
        assert!(h.tracker.in_flight.is_empty());
        assert_matches!(h.tracker.refresh_product(9_999).await, Err(AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn last_checked_never_moves_backwards() {
        let h = harness(ScriptedSource::prices(&["199,00 €"]), 60).await;
        let future = start() + chrono::Duration::hours(1);
        let product = h
            .store
            .create_product(&new_product(h.owner, 229.0, None), future)
            .await
            .unwrap();

        h.tracker.refresh_product(product.id).await.unwrap();

        let reloaded = h.store.product(product.id).await.unwrap().unwrap();
        assert_eq!(reloaded.last_checked_at, Some(future));
    }

    #[tokio::test]
    async fn add_product_stores_the_first_observation() {
        let h = harness(ScriptedSource::prices(&["1.299,00 €"]), 60).await;

        let created = h
            .tracker
            .add_product(h.owner, " https://www.amazon.it/dp/B0CHWRXH8B ", Some(1_000.0), None)
            .await
            .unwrap();

        assert_eq!(created.current_price, 1_299.0);
        assert_eq!(created.url, "https://www.amazon.it/dp/B0CHWRXH8B");
        assert_eq!(created.store, "amazon");
        assert_eq!(h.store.price_history(created.id).await.unwrap().len(), 1);
        assert_eq!(*h.source.budgets.lock().unwrap(), vec![None]);

        assert_matches!(
            h.tracker.add_product(h.owner, "https://www.amazon.it/dp/X", Some(-1.0), None).await,
            Err(AppError::BadRequest(_))
        );
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let h = harness(ScriptedSource::prices(&[]), 60).await;
        let tracker = Arc::new(h.tracker);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&tracker).run(cancel.clone()));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("tracker stops promptly")
            .expect("task not panicked");
        assert!(!tracker.health().tracker_running());
    }
}
