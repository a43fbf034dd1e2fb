//! Axum route handlers for the Scoring and Context APIs.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::analysis::RunSummary;
use crate::orchestration::aggregate::{CompositeResult, OverallStatus};
use crate::orchestration::context_manager::ContextHealth;
use crate::orchestration::storage::JobRankingRow;
use crate::orchestration::types::{
    AnalysisResult, AnalysisType, ExecutionContext, TaskFailure, TaskStatus,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub resume_id: String,
    pub job_id: String,
    /// Per analysis type overrides of the default weights.
    #[serde(default)]
    pub weights: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    pub run_id: Uuid,
    pub scores: BTreeMap<AnalysisType, Option<f64>>,
    pub composite: Option<f64>,
    pub status: OverallStatus,
    pub per_task_status: BTreeMap<AnalysisType, TaskStatus>,
    pub weights_used: BTreeMap<AnalysisType, f64>,
    pub errors: BTreeMap<AnalysisType, TaskFailure>,
    pub persist_warnings: Vec<String>,
    pub results: Vec<AnalysisResult>,
}

impl From<CompositeResult> for ScoreResponse {
    fn from(composite: CompositeResult) -> Self {
        Self {
            run_id: composite.run_id,
            scores: composite.scores(),
            composite: composite.composite_score,
            status: composite.overall_status,
            per_task_status: composite.per_task_status(),
            errors: composite.errors(),
            persist_warnings: composite.persist_warnings(),
            weights_used: composite.weights_used,
            results: composite.results.into_values().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRankingsResponse {
    pub job_id: Uuid,
    pub rankings: Vec<JobRankingRow>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/scores
///
/// Runs every analyzer against the resume/job pair and returns the composite.
/// Individual analysis failures are reported in the body, not as an error status.
pub async fn handle_score(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    if request.resume_id.trim().is_empty() || request.job_id.trim().is_empty() {
        return Err(AppError::Validation(
            "resumeId and jobId are required".to_string(),
        ));
    }

    let composite = state
        .coordinator
        .score(&request.resume_id, &request.job_id, request.weights.as_ref())
        .await?;

    Ok(Json(composite.into()))
}

/// GET /api/v1/scores/:run_id
///
/// Stored run with the per-analysis results that were durably written.
pub async fn handle_get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunSummary>, AppError> {
    let run_id = parse_path_id("run_id", &run_id)?;
    let summary = state
        .storage
        .run_summary(run_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("run {run_id}")))?;
    Ok(Json(summary))
}

/// GET /api/v1/jobs/:job_id/rankings
///
/// Best stored composite per resume for one job, highest first.
pub async fn handle_job_rankings(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRankingsResponse>, AppError> {
    let job_id = parse_path_id("job_id", &job_id)?;
    let rankings = state.storage.job_rankings(job_id).await?;
    Ok(Json(JobRankingsResponse { job_id, rankings }))
}

/// GET /api/v1/contexts/health
///
/// Always 200. A contended registry or unreachable store shows up as `degraded`.
pub async fn handle_context_health(State(state): State<AppState>) -> Json<ContextHealth> {
    Json(state.contexts.health_check().await)
}

/// GET /api/v1/contexts/:id
pub async fn handle_get_context(
    State(state): State<AppState>,
    Path(context_id): Path<String>,
) -> Result<Json<ExecutionContext>, AppError> {
    let context_id = parse_path_id("context id", &context_id)?;
    state
        .contexts
        .get(context_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("context {context_id}")))
}

fn parse_path_id(what: &str, raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("{what} '{raw}' is not a UUID")))
}
