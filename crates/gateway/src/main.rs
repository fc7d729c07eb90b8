//! Literature Desk API
//!
//! Serves the note desk over HTTP:
//! - Note ingestion with LLM metadata extraction
//! - Paper record CRUD, timeline and literature query
//! - Background keyword worker
//! - Observability (logging, metrics, request ids)

mod handlers;

use anyhow::Context;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use litdesk_common::{
    config::{AppConfig, ObservabilityConfig},
    db::{DbPool, Repository},
    extraction::{KeywordExtractor, MetadataExtractor},
    keywords::{InFlight, KeywordProcessor, KeywordTrigger, KeywordWorker},
    llm::{create_backend, ChatBackend},
    metrics,
    query::QueryAnswerer,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::watch};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub backend: Arc<dyn ChatBackend>,
    pub extractor: MetadataExtractor,
    pub answerer: QueryAnswerer,
    pub in_flight: InFlight,
    pub trigger: KeywordTrigger,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: DbPool, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            extractor: MetadataExtractor::new(backend.clone()),
            answerer: QueryAnswerer::new(backend.clone(), config.query.context_records),
            in_flight: InFlight::new(),
            trigger: KeywordTrigger::new(),
            config,
            db,
            backend,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;
    let config = Arc::new(config);

    init_tracing(&config.observability);

    info!("Starting Literature Desk v{}", litdesk_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }
    metrics::register_metrics();

    // Initialize database connection
    info!(path = %config.database.path, "Opening database...");
    let db = DbPool::new(&config.database).await?;

    // Initialize chat backend
    let backend = create_backend(&config.llm)?;
    info!(backend = backend.name(), model = backend.model(), "Chat backend selected");

    let state = AppState::new(config.clone(), db.clone(), backend.clone());

    // Keyword worker
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = if config.keywords.enabled {
        let processor = KeywordProcessor::new(
            Repository::new(db),
            KeywordExtractor::new(backend, config.keywords.max_keywords),
            state.in_flight.clone(),
        );
        let worker = KeywordWorker::new(
            Arc::new(processor),
            state.trigger.clone(),
            config.keyword_poll_interval(),
            shutdown_rx,
        );
        Some(tokio::spawn(worker.run()))
    } else {
        info!("Keyword worker disabled");
        None
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server host '{}'", config.server.host))?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let an in-flight keyword call finish; no new cycle starts
    let _ = shutdown_tx.send(true);
    if let Some(handle) = worker {
        if let Err(e) = handle.await {
            warn!(error = %e, "Keyword worker ended abnormally");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.log_level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.json_logging {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_llm_duration_seconds", metrics::METRICS_PREFIX)),
            metrics::LLM_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(port, "Prometheus exporter listening");
    Ok(())
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    match origin.trim() {
        "" | "*" => cors.allow_origin(Any),
        origin => match origin.parse::<HeaderValue>() {
            Ok(value) => cors.allow_origin(value),
            Err(e) => {
                warn!(origin, error = %e, "Invalid CORS origin, allowing any");
                cors.allow_origin(Any)
            }
        },
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);
    let body_limit = RequestBodyLimitLayer::new(state.config.server.body_limit_bytes);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        // Paper endpoints
        .route(
            "/papers",
            get(handlers::papers::list_papers)
                .post(handlers::papers::create_paper)
                .delete(handlers::papers::delete_papers),
        )
        .route(
            "/papers/{id}",
            get(handlers::papers::get_paper).patch(handlers::papers::update_paper),
        )

        // Note ingestion
        .route("/notes", post(handlers::notes::create_note))

        // Derived views
        .route("/query", post(handlers::query::query))
        .route("/timeline", get(handlers::timeline::timeline))
        .route("/backend", get(handlers::backend::backend_status));

    // Compose the app
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
