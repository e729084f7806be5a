//! Mentora Billing Engine
//!
//! Realtime per-minute billing for advisory sessions. Clients connect over
//! WebSocket, drive sessions with `type`-tagged commands, and receive billing
//! events for the room they joined. A background scheduler meters every
//! active session once per interval and settles charges against the wallet
//! ledger.
//!
//! ## WebSocket
//!
//! - `GET /ws` - Session command and event channel
//!
//! ## REST Endpoints
//!
//! - `GET /api/v1/sessions` - List tracked sessions
//! - `GET /api/v1/sessions/{id}` - Get one session
//! - `DELETE /api/v1/sessions/{id}` - Cancel a session
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe (checks wallet ledger)
//! - `GET /metrics` - Prometheus metrics

mod config;
mod error;
mod handlers;
mod state;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use mentora_billing_core::{BillingEngine, BillingScheduler, EventPublisher, RoomHub};
use mentora_ledger::{HttpWalletStore, LedgerClient, MemoryWalletStore, SettlementLedger};

use crate::config::{Config, LedgerBackend};
use crate::handlers::{health, ready};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("billing_engine=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Mentora Billing Engine");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        backend = ?config.ledger_backend,
        billing_interval_secs = config.billing_interval.as_secs(),
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Create the wallet ledger backend
    let ledger = build_ledger(&config)?;

    // Refuse to start if the ledger cannot be reached
    ledger
        .ping()
        .await
        .context("wallet ledger unreachable, refusing to start")?;
    tracing::info!("Wallet ledger reachable");

    // Create the room hub and billing engine
    let hub = Arc::new(RoomHub::new());
    let engine = Arc::new(BillingEngine::new(
        ledger.clone(),
        hub.clone() as Arc<dyn EventPublisher>,
        config.billing(),
    ));

    // Start the billing scheduler
    let shutdown = CancellationToken::new();
    let scheduler = BillingScheduler::new(engine.clone(), shutdown.clone());
    let scheduler_handle = scheduler.spawn();

    // Create application state
    let state = AppState::new(engine, hub, ledger, config.clone());

    // Build HTTP router
    let app = build_router(state, metrics_handle);

    // Start server
    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));

    tokio::select! {
        result = run_http_server(app, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = ?e, "HTTP server error");
            }
        }
        () = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
        }
    }

    // Stop the scheduler before exiting
    shutdown.cancel();
    if let Err(e) = scheduler_handle.await {
        tracing::error!(error = ?e, "billing scheduler task failed");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Build the configured ledger backend behind a trait object
fn build_ledger(config: &Config) -> anyhow::Result<Arc<dyn LedgerClient>> {
    match config.ledger_backend {
        LedgerBackend::Memory => {
            tracing::warn!("using in-memory wallet store, balances are volatile");
            let store = MemoryWalletStore::with_opening_balance(config.memory_opening_balance);
            Ok(Arc::new(SettlementLedger::new(
                Arc::new(store),
                config.commission,
            )))
        }
        LedgerBackend::Http => {
            let store = HttpWalletStore::new(config.wallet_api()?)
                .context("failed to build wallet api client")?;
            Ok(Arc::new(SettlementLedger::new(
                Arc::new(store),
                config.commission,
            )))
        }
    }
}

fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    // API v1 session routes
    let api_v1 = Router::new()
        .route("/sessions", get(handlers::list_sessions))
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::cancel_session),
        );

    // WebSocket route (separate - long-lived, must not be timed out)
    let ws_route = Router::new().route("/ws", get(ws::ws_handler));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        // Request ID propagation (outermost)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        // Tracing with request details
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Request timeout (innermost - closest to handler)
        .layer(TimeoutLayer::new(request_timeout));

    // Combine all routes
    Router::new()
        .nest("/api/v1", api_v1)
        .layer(middleware)
        .merge(ws_route) // WebSocket without timeout
        .merge(health_routes) // Health routes without timeout
        .merge(metrics_route) // Metrics route without timeout
        .with_state(state)
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let service: IntoMakeServiceWithConnectInfo<Router, SocketAddr> =
        app.into_make_service_with_connect_info();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Latency buckets sized for billing cycles and ledger round trips
    let billing_latency_buckets = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.5, 1.0, 2.5];

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            billing_latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full("billing_cycle_duration_seconds".to_string()),
            billing_latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full("billing_operation_duration_seconds".to_string()),
            billing_latency_buckets,
        )?;

    let handle = builder.install_recorder()?;

    // Register metrics with descriptions
    metrics::describe_counter!(
        "billing_sessions_started_total",
        "Total billing sessions started"
    );
    metrics::describe_counter!(
        "billing_sessions_rejected_total",
        "Total session starts refused for insufficient balance"
    );
    metrics::describe_counter!(
        "billing_sessions_ended_total",
        "Total sessions ended by reason"
    );
    metrics::describe_counter!(
        "billing_charged_cents_total",
        "Total cents charged across all sessions"
    );
    metrics::describe_counter!(
        "billing_cycles_total",
        "Total billing cycles evaluated by outcome"
    );
    metrics::describe_gauge!(
        "billing_active_sessions",
        "Sessions currently being metered"
    );
    metrics::describe_histogram!(
        "billing_cycle_duration_seconds",
        "Billing cycle latency in seconds"
    );
    metrics::describe_histogram!(
        "billing_operation_duration_seconds",
        "Session operation latency in seconds by operation type"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
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
