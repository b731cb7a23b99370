//! Pipeline status and trigger endpoints
//!
//! Triggers acquire the run handle before answering, so a busy tracker is
//! reported as 409 instead of starting a second run in the background.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;

use crate::db::memes::{self, StatusCounts};
use crate::error::{ApiError, ApiResult};
use crate::models::RunSnapshot;
use crate::services::pipeline::{REMOTE_BATCH_TASK, RETRY_TASK, SWEEP_TASK};
use crate::services::normalize_remote_urls;
use crate::AppState;

/// Returned when a triggered run was started
#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub status: String,
    pub task: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoteFetchRequest {
    #[serde(default)]
    pub image_urls: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteFetchResponse {
    pub status: String,
    pub total_urls: usize,
}

/// Run a pipeline future in the background, keeping its error for /health
fn spawn_run<F, T, E>(state: &AppState, task: &'static str, run: F)
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    let last_error = state.last_error.clone();
    tokio::spawn(async move {
        if let Err(e) = run.await {
            tracing::error!(task, error = %e, "Background run failed");
            *last_error.write().await = Some(format!("{}: {}", task, e));
        }
    });
}

/// GET /api/progress
pub async fn get_progress(State(state): State<AppState>) -> Json<RunSnapshot> {
    Json(state.progress.snapshot())
}

/// POST /api/trigger-fetch
pub async fn trigger_fetch(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    let run = state.progress.start_run(SWEEP_TASK, 0)?;

    let orchestrator = state.orchestrator.clone();
    spawn_run(&state, SWEEP_TASK, async move {
        orchestrator.scheduled_sweep(run).await
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            status: "started".to_string(),
            task: SWEEP_TASK.to_string(),
        }),
    ))
}

/// POST /api/trigger-retry
pub async fn trigger_retry(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    let run = state.progress.start_run(RETRY_TASK, 0)?;

    let orchestrator = state.orchestrator.clone();
    spawn_run(&state, RETRY_TASK, async move {
        orchestrator.retry_sweep(run).await
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            status: "started".to_string(),
            task: RETRY_TASK.to_string(),
        }),
    ))
}

/// POST /api/trigger-remote-fetch
pub async fn trigger_remote_fetch(
    State(state): State<AppState>,
    Json(request): Json<RemoteFetchRequest>,
) -> ApiResult<(StatusCode, Json<RemoteFetchResponse>)> {
    if request.image_urls.is_empty() {
        return Err(ApiError::BadRequest("image_urls must not be empty".to_string()));
    }

    let urls = normalize_remote_urls(&request.image_urls);
    if urls.is_empty() {
        return Err(ApiError::BadRequest(
            "No valid http(s) image URLs provided".to_string(),
        ));
    }

    let total_urls = urls.len();
    let run = state.progress.start_run(REMOTE_BATCH_TASK, total_urls)?;

    let orchestrator = state.orchestrator.clone();
    spawn_run(&state, REMOTE_BATCH_TASK, async move {
        orchestrator.remote_batch(run, urls).await
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(RemoteFetchResponse {
            status: "started".to_string(),
            total_urls,
        }),
    ))
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<StatusCounts>> {
    Ok(Json(memes::count_by_status(&state.db).await?))
}

pub fn pipeline_routes() -> Router<AppState> {
    Router::new()
        .route("/api/progress", get(get_progress))
        .route("/api/stats", get(get_stats))
        .route("/api/trigger-fetch", post(trigger_fetch))
        .route("/api/trigger-retry", post(trigger_retry))
        .route("/api/trigger-remote-fetch", post(trigger_remote_fetch))
}
