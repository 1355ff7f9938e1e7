//! Server setup and initialization
//!
//! Provides the main application builder, the background expiry sweep, and
//! the server runner.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use market_cache::{Publisher, RedisNotificationSink, RedisPool, RedisPoolConfig, RedisSpamRules, SpamLimits};
use market_common::{AppConfig, AppError, JwtVerifier};
use market_core::SnowflakeGenerator;
use market_db::{
    create_pool, run_migrations, PgChangeFeed, PgChatRepository, PgMessageRepository,
    PgOfferRepository, PgPaymentRepository, PgRatingRepository, PgRequestRepository,
};
use market_service::services::{MatchingService, ServiceContext, ServiceContextBuilder, ServiceSettings};
use market_service::{HttpAiReviewer, HttpPaymentVerifier};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::middleware::{apply_middleware, apply_middleware_with_config, HttpSettings};
use crate::routes::{create_router, health_routes};
use crate::state::{AppState, Probes};

/// Room for bursts of row changes before slow subscribers start lagging
const CHANGE_FEED_CAPACITY: usize = 1024;

/// How long shutdown waits for spawned notification dispatches
const NOTIFICATION_DRAIN: Duration = Duration::from_secs(5);

/// Build the application with the base middleware and no rate limiting
pub fn create_app(state: AppState) -> Router {
    let router = apply_middleware(create_router(), HttpSettings::default().request_timeout);
    router.merge(health_routes()).with_state(state)
}

/// Build the production application; health probes bypass the rate limiter
pub fn create_app_with_config(state: AppState, settings: &HttpSettings) -> Result<Router, AppError> {
    let router = apply_middleware_with_config(create_router(), settings)?;
    Ok(router.merge(health_routes()).with_state(state))
}

/// Initialize all dependencies and create AppState
pub async fn create_app_state(config: &AppConfig) -> Result<AppState, AppError> {
    // Create database pool
    info!("Connecting to PostgreSQL...");
    let pool = create_pool(&market_db::DatabaseConfig::from(&config.database))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    run_migrations(&pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    info!("PostgreSQL connection established");

    let change_feed = PgChangeFeed::start(&pool, CHANGE_FEED_CAPACITY)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    // Create Redis pool
    info!("Connecting to Redis...");
    let redis_pool = RedisPool::new(RedisPoolConfig::from(&config.redis))
        .map_err(|e| AppError::Cache(e.to_string()))?;
    info!("Redis pool created");

    // External collaborators
    let ai_reviewer = HttpAiReviewer::new(&config.review).map_err(|e| AppError::Config(e.to_string()))?;
    let payment_verifier =
        HttpPaymentVerifier::new(&config.payments).map_err(|e| AppError::Config(e.to_string()))?;
    let spam_rules = RedisSpamRules::new(redis_pool.clone(), SpamLimits::from(&config.moderation));
    let notification_sink = RedisNotificationSink::new(Publisher::new(redis_pool.clone()));

    let service_context = ServiceContextBuilder::new()
        .request_repo(Arc::new(PgRequestRepository::new(pool.clone())))
        .offer_repo(Arc::new(PgOfferRepository::new(pool.clone())))
        .chat_repo(Arc::new(PgChatRepository::new(pool.clone())))
        .message_repo(Arc::new(PgMessageRepository::new(pool.clone())))
        .rating_repo(Arc::new(PgRatingRepository::new(pool.clone())))
        .payment_repo(Arc::new(PgPaymentRepository::new(pool.clone())))
        .change_feed(Arc::new(change_feed))
        .spam_rules(Arc::new(spam_rules))
        .ai_reviewer(Arc::new(ai_reviewer))
        .payment_verifier(Arc::new(payment_verifier))
        .sink(Arc::new(notification_sink))
        .settings(ServiceSettings::from_config(config))
        .snowflake_generator(Arc::new(SnowflakeGenerator::new(config.snowflake.worker_id)))
        .build()
        .map_err(|e| AppError::Config(e.to_string()))?;

    let probes = Probes {
        database: Some(pool),
        redis: Some(redis_pool),
    };

    Ok(AppState::new(service_context, JwtVerifier::new(&config.jwt), probes))
}

/// Periodically expire stale requests and offers
pub fn spawn_expiry_sweep(ctx: Arc<ServiceContext>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip first immediate tick

        loop {
            interval.tick().await;
            match MatchingService::new(&ctx).expire_stale(Utc::now()).await {
                Ok(report) if report.requests + report.offers > 0 => {
                    info!(requests = report.requests, offers = report.offers, "Expired stale entries");
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Expiry sweep failed"),
            }
        }
    })
}

/// Run the HTTP server until Ctrl-C
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), AppError> {
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    info!("Server listening on http://{}", addr);

    // Peer addresses feed the rate limiter's key extractor
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}

/// Run the complete server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .api
        .address()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid listen address: {e}")))?;

    let state = create_app_state(&config).await?;

    let ctx = state.shared_context();
    let sweep = spawn_expiry_sweep(
        ctx.clone(),
        Duration::from_secs(config.matching.sweep_interval_secs.max(1)),
    );

    let settings = HttpSettings {
        request_timeout: Duration::from_secs(config.api.request_timeout_secs),
        rate_limit: Some(config.rate_limit.clone()),
        cors: config.cors.clone(),
        is_production: config.app.env.is_production(),
    };
    let app = create_app_with_config(state, &settings)?;

    let result = run_server(app, addr).await;
    sweep.abort();

    let pending = ctx.notifier().in_flight();
    if pending > 0 {
        info!(pending, "Draining notifications");
        if tokio::time::timeout(NOTIFICATION_DRAIN, ctx.notifications_settled())
            .await
            .is_err()
        {
            warn!(pending = ctx.notifier().in_flight(), "Notifications still pending at shutdown");
        }
    }
    result
}
