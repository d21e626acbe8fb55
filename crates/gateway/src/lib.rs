//! HTTP API gateway for answerdesk.
//!
//! Exposes the answer pipeline over REST: a health check at the root and
//! the v1 API (answers, feedback, stats, sessions, knowledge admin).
//!
//! Built on Axum for high performance async HTTP.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, extract::State, response::Json, routing::get};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use answerdesk_config::AppConfig;
use answerdesk_pipeline::{AnswerSelector, FeedbackRecorder, SessionRegistry};

/// Maximum accepted request body.
const BODY_LIMIT: usize = 1024 * 1024;

/// Shared application state.
///
/// The selector and recorder share one knowledge index; sessions are
/// scoped to this state, so two gateways in one process never mix counters.
pub struct AppState {
    pub config: AppConfig,
    pub selector: Arc<AnswerSelector>,
    pub feedback: Arc<FeedbackRecorder>,
    pub sessions: SessionRegistry,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        selector: Arc<AnswerSelector>,
        feedback: Arc<FeedbackRecorder>,
    ) -> Self {
        let sessions = SessionRegistry::with_limits(
            config.gateway.max_sessions,
            Duration::from_secs(config.gateway.session_ttl_secs),
        );
        Self {
            config,
            selector,
            feedback,
            sessions,
            start_time: chrono::Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;

/// Build the full router.
///
/// Layers applied:
/// - CORS restricted to the configured origins
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.allowed_origins);

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS policy for the configured origins. Unparseable origins are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server on the configured host and port.
pub async fn start(state: SharedState) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", state.config.gateway.host, state.config.gateway.port);
    let records = state.selector.index().count().await;
    let offline = state.selector.is_offline();

    let app = build_router(state);

    info!(addr = %addr, records, offline, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    offline: bool,
    records: usize,
    model_configured: bool,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let offline = state.selector.is_offline();
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        offline,
        records: state.selector.index().count().await,
        model_configured: !offline,
    })
}
