//! Regula API Gateway
//!
//! The HTTP entry point for the regulatory document assistant.
//! Handles:
//! - Document upload (PDF, raw text, URL)
//! - Question answering with the shared answer cache
//! - Structured summaries
//! - Rate limiting and observability (logging, metrics, request ids)

mod handlers;
mod middleware;
#[cfg(test)]
mod tests;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use regula_common::{
    config::{AppConfig, ObservabilityConfig},
    metrics, Services,
};
use std::sync::Arc;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Services,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config.observability);
    info!(
        service = %config.observability.service_name,
        "Starting Regula API Gateway v{}",
        regula_common::VERSION
    );

    // Initialize metrics
    metrics::register_metrics();
    let handle = install_metrics_recorder()?;
    spawn_metrics_server(handle, config.metrics_address());

    // Connect stores and build services
    let services = Services::from_config(&config).await?;

    let state = AppState {
        config: Arc::new(config),
        services,
    };

    let addr = state.config.bind_address();
    let app = create_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing; `RUST_LOG` overrides the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Install the Prometheus recorder with per-histogram buckets
fn install_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("request_duration_seconds".to_string()),
            metrics::LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("inference_duration_seconds".to_string()),
            metrics::INFERENCE_BUCKETS,
        )?
        .install_recorder()?;

    Ok(handle)
}

/// Serve `/metrics` on its own port; port 0 disables the endpoint
fn spawn_metrics_server(handle: PrometheusHandle, addr: Option<String>) {
    let Some(addr) = addr else {
        return;
    };

    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => {
                info!("Metrics listening on {}", addr);
                if let Err(e) = axum::serve(listener, app).await {
                    error!(error = %e, "Metrics server stopped");
                }
            }
            Err(e) => warn!(error = %e, addr = %addr, "Failed to bind metrics listener"),
        }
    });
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Endpoints that reach the model or write documents are rate limited
    let mut work_routes = Router::new()
        .route("/ask", post(handlers::ask::ask))
        .route("/summarize", post(handlers::summarize::summarize))
        .route("/upload", post(handlers::upload::upload));

    if config.rate_limit.enabled {
        let limiter = middleware::rate_limit::RateLimitState::new(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        );
        work_routes = work_routes.route_layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        // Document endpoints
        .route("/documents", get(handlers::documents::list_documents))
        .route("/documents/{id}/history", get(handlers::documents::document_history))
        .merge(work_routes)
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_metrics));

    // Compose the app
    Router::new()
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(ConcurrencyLimitLayer::new(config.server.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
