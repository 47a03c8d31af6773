//! Marketplace storefront - HTTP API for customers and vendors.
//!
//! This binary serves the `/api/v1` JSON API on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework, JSON in and out
//! - `PostgreSQL` (schema `marketplace`) through the repository traits
//! - One background worker draining the job queue (emails, import, export)
//! - Bearer session tokens, one per customer, valid for an hour

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use marketplace_storefront::config::MarketplaceConfig;
use marketplace_storefront::db::{self, PgRepository, Repository};
use marketplace_storefront::services::email::{LogMailer, Mailer, SmtpMailer};
use marketplace_storefront::services::jobs::{JobQueue, run_worker};
use marketplace_storefront::state::AppState;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &MarketplaceConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn mailer(config: &MarketplaceConfig) -> Arc<dyn Mailer> {
    match &config.email {
        Some(email) => match SmtpMailer::new(email) {
            Ok(smtp) => Arc::new(smtp),
            Err(e) => {
                tracing::error!(error = %e, "SMTP setup failed, emails will be logged only");
                Arc::new(LogMailer)
            }
        },
        None => {
            tracing::warn!("SMTP_HOST not set, emails will be logged only");
            Arc::new(LogMailer)
        }
    }
}

#[tokio::main]
async fn main() {
    let config = MarketplaceConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "marketplace_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p marketplace-cli -- migrate

    let repo: Arc<dyn Repository> = Arc::new(PgRepository::new(pool));
    let (jobs, rx) = JobQueue::new(config.job_queue_capacity);
    let worker = tokio::spawn(run_worker(rx, Arc::clone(&repo), mailer(&config)));

    let state = AppState::new(config.clone(), repo, jobs);
    let app = marketplace_storefront::app(state);

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    // The router owned the last queue handle; the worker drains what is left.
    if let Err(e) = worker.await {
        tracing::error!(error = %e, "Job worker panicked");
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
