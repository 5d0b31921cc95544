//! HTTP server: JSON API under `/api` and the static dashboard front end

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cache::PersistentCache;
use crate::config::{HousingConfig, Secrets};
use crate::data::{Dataset, load_dataset};
use crate::spatial::BoroughAtlas;
use crate::valuation::PriceEstimator;

pub mod api;
mod extract;

const MAX_BODY_BYTES: usize = 64 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub dataset: Arc<Dataset>,
    pub atlas: Arc<BoroughAtlas>,
    /// `None` until a model has been trained
    pub estimator: Option<Arc<PriceEstimator>>,
    pub secrets: Arc<Secrets>,
}

impl AppState {
    /// Load boroughs, the dataset, secrets and the price model if present
    pub async fn load(config: &HousingConfig) -> anyhow::Result<Self> {
        let boroughs_dir = config.data.boroughs_dir.clone();
        let atlas = tokio::task::spawn_blocking(move || BoroughAtlas::load(boroughs_dir))
            .await?
            .with_context(|| format!("failed to load boroughs from {}", config.data.boroughs_dir.display()))?;
        let atlas = Arc::new(atlas);
        info!("Loaded {} borough shapes", atlas.shapes().len());

        let cache = if config.cache.enabled {
            PersistentCache::open(&config.cache.location)
                .inspect_err(|e| warn!("Cache unavailable, rebuilding the dataset: {e}"))
                .ok()
        } else {
            None
        };
        let dataset = load_dataset(&config.data, Arc::clone(&atlas), cache.as_ref(), config.cache.ttl()).await?;
        info!("Dataset ready with {} rows", dataset.len());

        let secrets = Secrets::load(&config.data.secrets_path)?;

        let estimator = match PriceEstimator::load(&config.data.model_path) {
            Ok(estimator) => Some(Arc::new(estimator)),
            Err(e) => {
                warn!("Price estimator disabled: {e}");
                None
            }
        };

        Ok(Self {
            dataset: Arc::new(dataset),
            atlas,
            estimator,
            secrets: Arc::new(secrets),
        })
    }

    pub(crate) fn google_key(&self) -> Option<&str> {
        self.secrets.google_maps_api_key.as_deref()
    }
}

/// JSON error body with the given status
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

pub fn build_router(state: AppState, assets_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api::router())
        .fallback_service(ServeDir::new(assets_dir))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the process is stopped, over HTTPS when a certificate and
/// key are configured
pub async fn serve(config: &HousingConfig, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state, &config.server.assets_dir);
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind))?;

    if let (Some(cert), Some(key)) = (&config.server.tls_cert, &config.server.tls_key) {
        #[cfg(feature = "tls")]
        {
            let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
                .await
                .with_context(|| format!("failed to load TLS certificate {}", cert.display()))?;
            info!("Dashboard running at https://{addr}");
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await?;
            return Ok(());
        }
        #[cfg(not(feature = "tls"))]
        warn!(
            "TLS configured ({}, {}) but built without the `tls` feature, serving plain HTTP",
            cert.display(),
            key.display()
        );
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Dashboard running at http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
