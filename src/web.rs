use crate::api_errors::AppError;
use crate::app_state::AppState;
use crate::errors::{WatchError, WatchResult};
use crate::intervention_service::InterventionResponse;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Build the public router: the intervention endpoint plus health checks.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/intervene", post(intervene))
        // health endpoints
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

/// Same router with the browser CORS policy applied.
pub fn build_app(state: Arc<AppState>, cors_origins: &[String]) -> WatchResult<Router> {
    Ok(build_router(state).layer(cors_layer(cors_origins)?))
}

pub fn cors_layer(origins: &[String]) -> WatchResult<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| WatchError::config(format!("invalid CORS origin '{origin}': {e}")))
        })
        .collect::<WatchResult<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]))
}

// Body arrives as raw bytes so malformed JSON is reported through the same
// 422 shape as field errors.
async fn intervene(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<InterventionResponse>, AppError> {
    state.service.handle(&body).await.map(Json)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn readyz(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let ready = state.is_ready().await;
    Json(serde_json::json!({ "ready": ready }))
}
