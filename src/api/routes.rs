use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::scheduler::{JobState, RunOutcome};

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub job_state: Arc<JobState>,
    pub trigger_tx: mpsc::Sender<()>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/job/status", get(get_job_status))
        .route("/job/trigger", post(post_job_trigger))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub total_listings: i64,
    pub active_listings: i64,
    pub computed_listings: i64,
}

#[derive(Serialize)]
pub struct JobStatusResponse {
    pub running: bool,
    pub last_outcome: Option<RunOutcome>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Result<Json<HealthResponse>, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings")
        .fetch_one(&state.pool)
        .await?;
    let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings WHERE expired = 0")
        .fetch_one(&state.pool)
        .await?;
    let computed: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM listings WHERE computed IS NOT NULL")
            .fetch_one(&state.pool)
            .await?;

    Ok(Json(HealthResponse {
        status: "ok",
        total_listings: total,
        active_listings: active,
        computed_listings: computed,
    }))
}

async fn get_job_status(State(state): State<ApiState>) -> Json<JobStatusResponse> {
    Json(JobStatusResponse {
        running: state.job_state.is_running(),
        last_outcome: state.job_state.last_outcome(),
    })
}

/// Queues a manual run. 409 while a run is active — the scheduler would
/// reject it anyway, but answering here keeps the contract visible.
async fn post_job_trigger(
    State(state): State<ApiState>,
) -> (StatusCode, Json<serde_json::Value>) {
    if state.job_state.is_running() {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "a run is already active" })),
        );
    }
    match state.trigger_tx.try_send(()) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": "triggered" })),
        ),
        Err(_) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "trigger queue is full" })),
        ),
    }
}
