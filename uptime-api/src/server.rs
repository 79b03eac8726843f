use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Json, Response},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;
use uptime_core::{Error, MonitorEngine, checker::CheckResult, store::MonitorStore};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MonitorEngine>,
}

#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.0 {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            other => {
                error!(error = %other, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/monitors/{id}/check", post(check_now))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now()
    }))
}

/// Runs a check immediately, waiting behind any scheduled check of the same monitor.
async fn check_now(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<CheckResult>, ApiError> {
    let monitor = state
        .engine
        .store()
        .monitor_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("monitor {id}")))?;

    let result = state.engine.perform_check(&monitor).await?;
    Ok(Json(result))
}
