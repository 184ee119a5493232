use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::health::{HealthSnapshot, HealthState};
use crate::api::latency::{LatencyReport, LatencyStats};
use crate::challenge::{ChallengeDetector, ChallengeStats};
use crate::db::TrackingStore;
use crate::error::AppError;
use crate::identity::{ProxyPool, ProxyStats};
use crate::price::parse_price;
use crate::scrape::ProductSource;
use crate::tracker::{CheckOutcome, PriceTracker};
use crate::types::{NotificationEvent, PriceHistoryEntry, ProductRecord, RawExtractionResult};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn TrackingStore>,
    pub tracker: Arc<PriceTracker>,
    pub source: Arc<dyn ProductSource>,
    pub detector: Arc<ChallengeDetector>,
    pub proxies: Arc<ProxyPool>,
    pub latency: Arc<LatencyStats>,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/scrape", post(post_scrape))
        .route("/api/products", post(post_product))
        .route("/api/products/:id", get(get_product))
        .route("/api/products/:id/refresh", post(post_refresh))
        .route("/api/products/:id/history", get(get_history))
        .route("/api/users/:id/notifications", get(get_notifications))
        .route("/api/check-prices", post(post_check_prices))
        .route("/api/challenges", get(get_challenges).delete(delete_challenges))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
}

#[derive(Deserialize)]
pub struct NewProductRequest {
    pub owner_id: i64,
    pub url: String,
    pub target_price: Option<f64>,
    pub monitoring_until: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    #[serde(flatten)]
    pub result: RawExtractionResult,
    /// 0.0 when the raw price text could not be parsed.
    pub parsed_price: f64,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub product: ProductRecord,
    pub outcome: CheckOutcome,
}

#[derive(Debug, Serialize)]
pub struct ChallengesResponse {
    pub detector: ChallengeStats,
    pub proxies: ProxyStats,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn post_scrape(
    State(state): State<ApiState>,
    Json(body): Json<ScrapeRequest>,
) -> Result<Json<ScrapeResponse>, AppError> {
    let result = state.source.scrape(&body.url, None).await?;
    let parsed_price = parse_price(result.price.as_deref().unwrap_or_default(), &result.currency);
    Ok(Json(ScrapeResponse {
        result,
        parsed_price,
    }))
}

async fn post_product(
    State(state): State<ApiState>,
    Json(body): Json<NewProductRequest>,
) -> Result<(StatusCode, Json<ProductRecord>), AppError> {
    let product = state
        .tracker
        .add_product(body.owner_id, &body.url, body.target_price, body.monitoring_until)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<ProductRecord>, AppError> {
    state
        .store
        .product(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

async fn post_refresh(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<RefreshResponse>, AppError> {
    let (product, outcome) = state.tracker.refresh_product(id).await?;
    Ok(Json(RefreshResponse { product, outcome }))
}

async fn get_history(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PriceHistoryEntry>>, AppError> {
    if state.store.product(id).await?.is_none() {
        return Err(AppError::NotFound(format!("product {id}")));
    }
    Ok(Json(state.store.price_history(id).await?))
}

async fn get_notifications(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<NotificationEvent>>, AppError> {
    Ok(Json(state.store.notifications_for(user_id).await?))
}

async fn post_check_prices(State(state): State<ApiState>) -> Json<MessageResponse> {
    info!("[API] manual price check requested");
    let tracker = Arc::clone(&state.tracker);
    tokio::spawn(async move {
        tracker.run_tracking_pass().await;
    });
    Json(MessageResponse {
        message: "Price check started in background",
    })
}

async fn get_challenges(State(state): State<ApiState>) -> Json<ChallengesResponse> {
    Json(ChallengesResponse {
        detector: state.detector.stats(),
        proxies: state.proxies.stats(),
    })
}

async fn delete_challenges(State(state): State<ApiState>) -> StatusCode {
    state.detector.clear();
    StatusCode::NO_CONTENT
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthSnapshot> {
    Json(state.health.snapshot())
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyReport> {
    Json(state.latency.report())
}
