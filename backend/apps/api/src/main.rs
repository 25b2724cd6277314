//! API Server Entry Point
//!
//! Wires configuration, stores and background maintenance, then serves
//! the router until Ctrl-C or SIGTERM. Startup errors use `anyhow`;
//! request-path errors are the crates' own `AppError`-backed types.

mod app;
mod config;
mod headers;

use crate::app::AppParts;
use crate::config::ApiConfig;
use axum::Router;
use monitor::{MaintenanceTask, Monitor, MonitorConfig, SecurityValidationConfig, Sweep};
use platform::clock::system_clock;
use quota::{PgQuotaRepository, QuotaConfig, QuotaLedger};
use ratelimit::{CounterStore, RateLimitConfig, SelectedBackend, WindowLimiter};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "api=info,ratelimit=info,quota=info,monitor=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env()?;

    // Database connection
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let clock = system_clock();

    // Monitor
    let monitor = Arc::new(Monitor::new(MonitorConfig::from_env(), clock.clone()));

    // Rate limiting
    let rate_limit = RateLimitConfig::from_env();
    let backend = SelectedBackend::from_url(rate_limit.redis_url.as_deref(), clock.clone()).await;

    // Background maintenance: monitor retention and local counter expiry
    let mut jobs: Vec<Arc<dyn Sweep>> = vec![monitor.clone() as Arc<dyn Sweep>];
    jobs.extend(backend.sweeper());
    let maintenance = MaintenanceTask::spawn(
        jobs,
        monitor.config().cleanup_interval,
        monitor.config().retry_backoff,
    );

    let limiter = Arc::new(WindowLimiter::new(
        CounterStore::new(backend, rate_limit.store_timeout),
        clock.clone(),
    ));

    // Quotas
    let quota_repo = Arc::new(PgQuotaRepository::new(pool.clone()));
    let ledger = Arc::new(QuotaLedger::new(quota_repo.clone(), quota_repo, clock));

    tracing::info!(
        rate_limiting = rate_limit.enabled,
        "Rate limit policies loaded"
    );
    tracing::info!(
        proxies = config.trusted_proxies.proxies.len(),
        loopback = config.trusted_proxies.trust_loopback,
        "Trusted proxies loaded"
    );

    let app = app::router(AppParts {
        monitor,
        security: SecurityValidationConfig::from_env(),
        limiter,
        rate_limit,
        ledger,
        quota: QuotaConfig::from_env(),
        // AI generation handlers are provided by the generation service
        generation: Router::new(),
        frontend_origins: config.frontend_origins,
        trusted_proxies: config.trusted_proxies,
    });

    // Start server
    tracing::info!("Listening on {}", config.bind_addr);

    let listener = TcpListener::bind(config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    maintenance.shutdown().await;
    tracing::info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
