mod allowlist;
mod api;
mod challenge;
mod config;
mod db;
mod error;
mod extract;
mod fetch;
mod identity;
mod notify;
mod price;
mod scrape;
mod tracker;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::allowlist::{AllowList, DomainSource};
use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::{router, ApiState};
use crate::challenge::ChallengeDetector;
use crate::config::Config;
use crate::db::SqliteStore;
use crate::error::Result;
use crate::extract::StrategyRegistry;
use crate::fetch::{FetchOrchestrator, FetchSettings, HttpPageLoader};
use crate::identity::{ProxyPool, UserAgentPool};
use crate::notify::{LogMailer, Mailer, Notifier, SmtpMailer};
use crate::scrape::{ProductSource, ScrapeService};
use crate::tracker::{PriceTracker, SystemClock, TrackerSettings};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);
    let store = Arc::new(SqliteStore::new(pool));

    // --- Identity, detection, extraction ---
    let user_agents = Arc::new(UserAgentPool::new());
    let proxies = Arc::new(ProxyPool::from_list(&cfg.proxy_list));
    if proxies.is_empty() {
        info!("[PROXY] no proxies configured, connecting directly");
    } else {
        info!("[PROXY] {} proxies loaded", proxies.stats().total);
    }
    let detector = Arc::new(ChallengeDetector::new());
    let registry = Arc::new(StrategyRegistry::with_default_stores());
    info!("Extraction strategies: {}", registry.strategy_names().join(", "));
    let latency = Arc::new(LatencyStats::new());

    // --- Scrape pipeline ---
    let orchestrator = Arc::new(FetchOrchestrator::new(
        Arc::new(HttpPageLoader::new()),
        user_agents,
        Arc::clone(&proxies),
        Arc::clone(&detector),
        registry,
        Arc::clone(&latency),
        FetchSettings::from_config(&cfg),
    ));
    let domains: Arc<dyn DomainSource> = store.clone();
    let allowlist = Arc::new(AllowList::new(
        Some(domains),
        Duration::from_secs(cfg.allowlist_ttl_secs),
    ));
    let source: Arc<dyn ProductSource> = Arc::new(ScrapeService::new(allowlist, orchestrator));

    // --- Notifications ---
    let mailer: Arc<dyn Mailer> = match &cfg.smtp {
        Some(smtp) => match SmtpMailer::new(smtp) {
            Ok(m) => {
                info!("[EMAIL] SMTP relay {}:{}", smtp.host, smtp.port);
                Arc::new(m)
            }
            Err(e) => {
                warn!("[EMAIL] SMTP setup failed ({e}), emails will only be logged");
                Arc::new(LogMailer)
            }
        },
        None => {
            warn!("SMTP_USER/SMTP_PASS not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    };
    let notifier = Notifier::new(mailer, store.clone(), cfg.app_base_url.clone());

    // --- Tracker ---
    let health = Arc::new(HealthState::new());
    let tracker = Arc::new(
        PriceTracker::new(
            store.clone(),
            Arc::clone(&source),
            notifier,
            Arc::new(SystemClock),
            TrackerSettings::from_config(&cfg),
        )
        .with_health(Arc::clone(&health)),
    );
    let cancel = CancellationToken::new();
    let tracker_task = tokio::spawn(Arc::clone(&tracker).run(cancel.clone()));

    // HTTP API server
    let api_state = ApiState {
        store,
        tracker,
        source,
        detector,
        proxies,
        latency,
        health,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Could not listen for shutdown signal: {e}");
            }
            info!("Shutdown requested");
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    if let Err(e) = tracker_task.await {
        error!("Tracker task ended abnormally: {e}");
    }
    Ok(())
}
