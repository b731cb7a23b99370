//! memestash-ingest library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::services::{PipelineOrchestrator, ProgressTracker};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Tracker shared with the orchestrator
    pub progress: Arc<ProgressTracker>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last background run error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self {
            db,
            progress: orchestrator.progress().clone(),
            orchestrator,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::pipeline_routes())
        .merge(api::health_routes())
        .with_state(state)
}
