use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use catalog_core::CatalogError;
use tokio::sync::watch;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::{AppConfig, ServerConfig},
    create_snapshot_store, handlers,
    query::QueryService,
    refresh::RefreshController,
    scheduler::RefreshScheduler,
    upstream::{CatalogSource, HttpCatalogSource},
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
    pub refresh: Arc<RefreshController>,
    /// Bearer token required by `POST /update`, when configured.
    pub trigger_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        query: QueryService,
        refresh: Arc<RefreshController>,
        trigger_token: Option<String>,
    ) -> Self {
        Self {
            query,
            refresh,
            trigger_token: trigger_token.filter(|t| !t.is_empty()).map(Arc::from),
        }
    }
}

/// Wire the store, the upstream source, and both services from configuration.
pub async fn build_state(cfg: &AppConfig) -> Result<AppState, CatalogError> {
    let store = create_snapshot_store(&cfg.store).await?;
    let source: Arc<dyn CatalogSource> = Arc::new(HttpCatalogSource::new(&cfg.upstream)?);
    let refresh = Arc::new(RefreshController::new(source, store.clone()));
    Ok(AppState::new(
        QueryService::new(store),
        refresh,
        cfg.refresh.trigger_token.clone(),
    ))
}

pub fn build_app(cfg: &ServerConfig, state: AppState) -> Router {
    let routes = Router::new()
        .route(
            "/data",
            get(handlers::data).fallback(handlers::method_not_allowed),
        )
        .route(
            "/update",
            post(handlers::update).fallback(handlers::method_not_allowed),
        )
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .with_state(state);

    let router = if cfg.path_prefix.is_empty() || cfg.path_prefix == "/" {
        routes
    } else {
        Router::new().nest(cfg.path_prefix.trim_end_matches('/'), routes)
    };

    router
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = tracing::field::Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(DefaultBodyLimit::max(cfg.body_limit_bytes))
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    pub async fn build(self) -> Result<CatalogGatewayServer, CatalogError> {
        let state = build_state(&self.config).await?;
        let app = build_app(&self.config.server, state.clone());
        Ok(CatalogGatewayServer {
            addr: self.config.addr(),
            app,
            state,
            config: self.config,
        })
    }
}

pub struct CatalogGatewayServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
    config: AppConfig,
}

impl CatalogGatewayServer {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Refresh on start-up if configured, start the periodic trigger if
    /// configured, then serve until Ctrl+C.
    pub async fn run(self) -> anyhow::Result<()> {
        if self.config.refresh.on_startup {
            self.state.refresh.refresh_on_startup().await;
        }

        let scheduler: Option<watch::Sender<bool>> = self.config.refresh.periodic.then(|| {
            RefreshScheduler::new(self.state.refresh.clone(), self.config.refresh.interval())
                .start()
        });

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(
            addr = %self.addr,
            prefix = %self.config.server.path_prefix,
            strategy = %self.state.query.strategy(),
            "listening"
        );
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(tx) = scheduler {
            let _ = tx.send(true);
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
