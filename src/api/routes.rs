use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::cycle_stats::CycleStats;
use crate::api::health::HealthReport;
use crate::error::AppError;
use crate::kpi::Kpis;
use crate::refresh::{OrchestratorHandle, TriggerOutcome};
use crate::types::{DashboardSnapshot, RefreshState};

#[derive(Clone)]
pub struct ApiState {
    pub handle: OrchestratorHandle,
    pub stats: Arc<CycleStats>,
    pub refresh_interval_secs: u64,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/kpis", get(get_kpis))
        .route("/refresh", post(post_refresh))
        .route("/auto-refresh", post(post_auto_refresh))
        .route("/health", get(get_health))
        .route("/stats/cycles", get(get_stats_cycles))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct AutoRefreshBody {
    pub enabled: bool,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub outcome: TriggerOutcome,
}

#[derive(Serialize)]
pub struct CycleStatsResponse {
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub count: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_dashboard(State(state): State<ApiState>) -> Json<DashboardSnapshot> {
    Json(state.handle.snapshot().as_ref().clone())
}

async fn get_kpis(State(state): State<ApiState>) -> Json<Kpis> {
    Json(state.handle.snapshot().kpis.clone())
}

async fn post_refresh(
    State(state): State<ApiState>,
) -> Result<(StatusCode, Json<RefreshResponse>), AppError> {
    let outcome = state.handle.refresh_now().await;
    let status = match outcome {
        TriggerOutcome::Started => StatusCode::ACCEPTED,
        TriggerOutcome::Dropped => StatusCode::CONFLICT,
        TriggerOutcome::Closed => {
            return Err(AppError::Orchestrator("refresh loop stopped".to_string()))
        }
    };
    Ok((status, Json(RefreshResponse { outcome })))
}

async fn post_auto_refresh(
    State(state): State<ApiState>,
    Json(body): Json<AutoRefreshBody>,
) -> Result<Json<RefreshState>, AppError> {
    let refresh = state.handle.set_auto_refresh(body.enabled).await?;
    Ok(Json(refresh))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthReport> {
    let now_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let snapshot = state.handle.snapshot();
    Json(HealthReport::from_state(
        &snapshot.refresh,
        now_ns,
        state.refresh_interval_secs,
    ))
}

async fn get_stats_cycles(State(state): State<ApiState>) -> Json<CycleStatsResponse> {
    let (p50_ms, p95_ms, p99_ms) = state.stats.percentiles();
    Json(CycleStatsResponse {
        p50_ms,
        p95_ms,
        p99_ms,
        count: state.stats.len(),
    })
}
