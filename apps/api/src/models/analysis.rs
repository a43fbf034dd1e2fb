use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRunRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub composite_score: Option<f64>,
    pub overall_status: String,
    pub weights_used: Value,
    pub created_at: DateTime<Utc>,
}

/// One row of the run summary join: a run and one of its per-analyzer results.
/// Result columns are null for a run that has no stored results.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RunResultRow {
    pub run_id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub composite_score: Option<f64>,
    pub overall_status: String,
    pub weights_used: Value,
    pub run_created_at: DateTime<Utc>,
    pub context_id: Option<Uuid>,
    pub analysis_type: Option<String>,
    pub score: Option<f64>,
    pub evidence: Option<Value>,
    pub timing_ms: Option<i64>,
    pub result_created_at: Option<DateTime<Utc>>,
}

/// Stored run with the results that were durably written for it.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run: AnalysisRunRow,
    pub results: Vec<StoredResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResult {
    pub context_id: Uuid,
    pub analysis_type: String,
    pub score: f64,
    pub evidence: Value,
    pub timing_ms: i64,
    pub created_at: DateTime<Utc>,
}
