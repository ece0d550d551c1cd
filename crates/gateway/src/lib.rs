//! HTTP API gateway for the CourseLLM IST service.
//!
//! Routes:
//! - `GET  /health`
//! - `POST /api/intent-skill-trajectory`
//! - `POST /analyze-message`
//!
//! Built on Axum. Errors are returned as `{"detail": "..."}`.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::extract::rejection::JsonRejection;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use coursellm_config::{AppConfig, GatewayConfig};
use coursellm_core::{Error, ExtractionResult, IstRequest};
use coursellm_ist::{AnalyzeMessageRequest, ExtractorCell, MessageAnalysis, MessageAnalyzer};

pub const SERVICE_NAME: &str = "CourseLLM IST Service";

/// Caller identity until authentication exists.
pub const STUB_USER_ID: &str = "test_user_id";

const EXTRACTOR_NAME: &str = "IST extractor";
const ANALYSIS_FAILED: &str = "Failed to analyze message";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub extractor: Arc<ExtractorCell>,
    pub analyzer: MessageAnalyzer,
}

impl GatewayState {
    pub fn new(extractor: Arc<ExtractorCell>, analyzer: MessageAnalyzer) -> Self {
        Self { extractor, analyzer }
    }
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all routes and HTTP trace logging.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/intent-skill-trajectory", post(extract_handler))
        .route("/analyze-message", post(analyze_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the router with CORS and the request body limit applied.
pub fn build_full_router(state: SharedState, config: &GatewayConfig) -> Router {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600));

    build_router(state)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors)
}

/// Start the gateway HTTP server.
///
/// The extractor is initialized before binding; a configuration error
/// aborts startup.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let extractor = Arc::new(ExtractorCell::new());
    extractor.initialize(&config)?;

    let state = Arc::new(GatewayState::new(extractor, MessageAnalyzer::noop()));
    let app = build_full_router(state, &config.gateway);

    info!(addr = %addr, service = SERVICE_NAME, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Errors ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// An error on its way to becoming a `{"detail"}` response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = match err {
            Error::Validation(msg) => msg,
            Error::InvalidInput(msg) => format!("Validation error: {msg}"),
            other => other.to_string(),
        };
        Self::new(status, detail)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // Everything except an oversized body is a schema violation.
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn extract_handler(
    State(state): State<SharedState>,
    payload: Result<Json<IstRequest>, JsonRejection>,
) -> Result<Json<ExtractionResult>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let Some(extractor) = state.extractor.get() else {
        error!("Request received before the IST extractor was initialized");
        return Err(Error::NotInitialized(EXTRACTOR_NAME.into()).into());
    };

    match extractor.extract(&request).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            if !matches!(e, Error::Validation(_)) {
                error!(error = %e, "IST extraction failed");
            }
            Err(e.into())
        }
    }
}

async fn analyze_handler(
    State(state): State<SharedState>,
    payload: Result<Json<AnalyzeMessageRequest>, JsonRejection>,
) -> Result<Json<MessageAnalysis>, ApiError> {
    let Json(request) = payload?;

    let Some(extractor) = state.extractor.get() else {
        error!("Analysis requested before the IST extractor was initialized");
        return Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, ANALYSIS_FAILED));
    };

    match state.analyzer.analyze(&extractor, STUB_USER_ID, &request).await {
        Ok(analysis) => Ok(Json(analysis)),
        Err(e @ Error::InvalidInput(_)) => Err(e.into()),
        Err(e) => {
            error!(error = %e, thread_id = %request.thread_id, "Error analyzing message");
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, ANALYSIS_FAILED))
        }
    }
}
