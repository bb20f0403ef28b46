use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::{ScanConfig, ServerConfig},
    error::ScanError,
    scanner::Scanner,
    types::{ScanRequest, ScanResult, ScanType},
};

/// Per-server state. Scans share nothing but the immutable scanner configuration.
#[derive(Clone)]
pub struct AppState {
    scanner: Scanner,
}

impl AppState {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            scanner: Scanner::new(config),
        }
    }

    pub fn with_scanner(scanner: Scanner) -> Self {
        Self { scanner }
    }
}

/// Raw `POST /scan` body. Both fields are re-validated here; `scan_type` defaults to basic.
#[derive(Debug, Deserialize)]
pub struct ScanBody {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub scan_type: Option<String>,
}

/// Routes are served at the root and again under `/api`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/scan", post(post_scan))
        .route("/health", get(get_health))
        .with_state(state);

    Router::new().merge(api.clone()).nest("/api", api).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(SetResponseHeaderLayer::if_not_present(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store"),
            )),
    )
}

pub async fn spawn_server(config: ServerConfig) -> Result<()> {
    let app = router(AppState::new(config.scan));
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    info!(bind = %config.bind, "serving scan API");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;
    Ok(())
}

async fn get_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Runs the scan inside the request. If the client goes away the handler
/// future is dropped, which aborts the scan's workers.
async fn post_scan(
    State(app): State<AppState>,
    body: Result<Json<ScanBody>, JsonRejection>,
) -> Result<Json<ScanResult>, ScanError> {
    let Json(body) = body.map_err(|e| ScanError::invalid_input(e.body_text()))?;
    let scan_type = body
        .scan_type
        .as_deref()
        .unwrap_or(ScanType::Basic.as_str());
    let request = ScanRequest::parse(&body.host, scan_type)?;
    let result = app.scanner.scan(&request).await?;
    Ok(Json(result))
}

impl IntoResponse for ScanError {
    fn into_response(self) -> Response {
        let status = match &self {
            ScanError::InvalidInput(_) | ScanError::Resolution { .. } | ScanError::InvalidPort(_) => {
                StatusCode::BAD_REQUEST
            }
            ScanError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ScanError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
