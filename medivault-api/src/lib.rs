use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod health;
pub mod interactions;
pub mod metrics;
pub mod prescriptions;
pub mod state;
pub mod summary;

pub use metrics::Metrics;
pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/ai/save-prescription", post(prescriptions::save_prescription))
        .route("/ai/check-interaction", post(interactions::check_interaction))
        .route("/ai/emergency-summary", post(summary::emergency_summary))
        .route("/health", get(health::health))
        .route("/metrics", get(metrics::metrics_handler))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "ok": false, "error": "Endpoint not found" })),
    )
}
