//! Storage collaborator: subject reads and result writes, always through a
//! context's connection descriptor.
//!
//! Every query that touches more than one table qualifies each column with its
//! table alias. `analysis_runs` and `analysis_results` share several column
//! names (`id`, `created_at`, `analysis_type`...), and an unqualified reference
//! in a join is an "ambiguous column" error at runtime, not at compile time.

use async_trait::async_trait;
use serde_json::json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::analysis::{AnalysisRunRow, RunResultRow, RunSummary, StoredResult};
use crate::models::subject::{JobRecord, JobRow, ResumeRecord, ResumeRow};
use crate::orchestration::aggregate::CompositeResult;
use crate::orchestration::evidence::Evidence;
use crate::orchestration::isolation::{is_safe_schema_name, SHARED_SCHEMA};
use crate::orchestration::types::{AnalysisType, ConnectionDescriptor};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} is outside the context's scope")]
    OutOfScope(String),

    #[error("invalid connection handle '{0}'")]
    InvalidHandle(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Parameters for writing one validated analysis result.
#[derive(Debug, Clone, Copy)]
pub struct ResultParams<'a> {
    pub context_id: Uuid,
    pub run_id: Uuid,
    pub analysis_type: AnalysisType,
    pub score: f64,
    pub evidence: &'a Evidence,
    pub timing_ms: u64,
}

/// Best composite per resume for one job, across all stored runs.
#[derive(Debug, Clone, serde::Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobRankingRow {
    pub resume_id: Uuid,
    pub best_composite: Option<f64>,
    pub runs: i64,
    pub stored_results: i64,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_resume(
        &self,
        conn: &ConnectionDescriptor,
        resume_id: Uuid,
    ) -> Result<ResumeRecord, StorageError>;

    async fn get_job(
        &self,
        conn: &ConnectionDescriptor,
        job_id: Uuid,
    ) -> Result<JobRecord, StorageError>;

    async fn put_result(
        &self,
        conn: &ConnectionDescriptor,
        params: ResultParams<'_>,
    ) -> Result<(), StorageError>;

    async fn put_run(&self, run: &CompositeResult) -> Result<(), StorageError>;

    async fn run_summary(&self, run_id: Uuid) -> Result<Option<RunSummary>, StorageError>;

    async fn job_rankings(&self, job_id: Uuid) -> Result<Vec<JobRankingRow>, StorageError>;
}

/// A descriptor only serves the subject pair it was provisioned for.
pub fn ensure_in_scope(
    conn: &ConnectionDescriptor,
    what: &str,
    requested: Uuid,
    scoped: Uuid,
) -> Result<(), StorageError> {
    if requested != scoped {
        debug!(handle = %conn.handle, "Rejected out-of-scope {what} read: {requested}");
        return Err(StorageError::OutOfScope(format!("{what} {requested}")));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// SQL
// ────────────────────────────────────────────────────────────────────────────

const GET_RESUME_SQL: &str = r#"
    SELECT r.id, r.candidate_name, r.raw_text, r.skills, r.experience,
           r.education, r.certifications, r.updated_at
    FROM resumes r
    WHERE r.id = $1
"#;

const GET_JOB_SQL: &str = r#"
    SELECT j.id, j.title, j.description, j.required_skills, j.preferred_skills,
           j.min_years_experience, j.max_years_experience, j.required_education,
           j.preferred_fields, j.required_certifications, j.preferred_certifications
    FROM jobs j
    WHERE j.id = $1
"#;

const INSERT_RESULT_SQL: &str = r#"
    INSERT INTO analysis_results
        (id, run_id, context_id, analysis_type, score, evidence, timing_ms)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

const INSERT_RUN_SQL: &str = r#"
    INSERT INTO analysis_runs
        (id, resume_id, job_id, composite_score, overall_status, weights_used, per_task_status)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (id) DO NOTHING
"#;

const RUN_SUMMARY_SQL: &str = r#"
    SELECT ar.id AS run_id, ar.resume_id, ar.job_id, ar.composite_score,
           ar.overall_status, ar.weights_used, ar.created_at AS run_created_at,
           res.context_id, res.analysis_type, res.score, res.evidence,
           res.timing_ms, res.created_at AS result_created_at
    FROM analysis_runs ar
    LEFT JOIN analysis_results res ON res.run_id = ar.id
    WHERE ar.id = $1
    ORDER BY res.analysis_type
"#;

const JOB_RANKINGS_SQL: &str = r#"
    SELECT ar.resume_id,
           MAX(ar.composite_score) AS best_composite,
           COUNT(DISTINCT ar.id) AS runs,
           COUNT(res.id) AS stored_results
    FROM analysis_runs ar
    LEFT JOIN analysis_results res ON res.run_id = ar.id
    WHERE ar.job_id = $1 AND ar.composite_score IS NOT NULL
    GROUP BY ar.resume_id
    ORDER BY best_composite DESC
"#;

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL storage
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a transaction whose unqualified table names resolve inside the
    /// context's schema first, then `public`.
    async fn scoped(
        &self,
        conn: &ConnectionDescriptor,
    ) -> Result<Transaction<'static, Postgres>, StorageError> {
        if !is_safe_schema_name(&conn.handle) {
            return Err(StorageError::InvalidHandle(conn.handle.clone()));
        }
        let search_path = if conn.handle == SHARED_SCHEMA {
            SHARED_SCHEMA.to_string()
        } else {
            format!(r#""{}", {SHARED_SCHEMA}"#, conn.handle)
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("SET LOCAL search_path TO {search_path}"))
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_resume(
        &self,
        conn: &ConnectionDescriptor,
        resume_id: Uuid,
    ) -> Result<ResumeRecord, StorageError> {
        ensure_in_scope(conn, "resume", resume_id, conn.scope.resume_id)?;
        let mut tx = self.scoped(conn).await?;
        let row = sqlx::query_as::<_, ResumeRow>(GET_RESUME_SQL)
            .bind(resume_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("resume {resume_id}")))?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn get_job(
        &self,
        conn: &ConnectionDescriptor,
        job_id: Uuid,
    ) -> Result<JobRecord, StorageError> {
        ensure_in_scope(conn, "job", job_id, conn.scope.job_id)?;
        let mut tx = self.scoped(conn).await?;
        let row = sqlx::query_as::<_, JobRow>(GET_JOB_SQL)
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("job {job_id}")))?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn put_result(
        &self,
        conn: &ConnectionDescriptor,
        params: ResultParams<'_>,
    ) -> Result<(), StorageError> {
        let evidence = serde_json::to_value(params.evidence)?;
        let mut tx = self.scoped(conn).await?;
        sqlx::query(INSERT_RESULT_SQL)
            .bind(Uuid::new_v4())
            .bind(params.run_id)
            .bind(params.context_id)
            .bind(params.analysis_type.as_str())
            .bind(params.score)
            .bind(evidence)
            .bind(params.timing_ms as i64)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn put_run(&self, run: &CompositeResult) -> Result<(), StorageError> {
        let weights = serde_json::to_value(&run.weights_used)?;
        let per_task: serde_json::Map<String, serde_json::Value> = run
            .results
            .iter()
            .map(|(t, r)| (t.as_str().to_string(), json!(r.status())))
            .collect();

        sqlx::query(INSERT_RUN_SQL)
            .bind(run.run_id)
            .bind(run.subjects.resume_id)
            .bind(run.subjects.job_id)
            .bind(run.composite_score)
            .bind(run.overall_status.as_str())
            .bind(weights)
            .bind(serde_json::Value::Object(per_task))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn run_summary(&self, run_id: Uuid) -> Result<Option<RunSummary>, StorageError> {
        let rows = sqlx::query_as::<_, RunResultRow>(RUN_SUMMARY_SQL)
            .bind(run_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(summarize_rows(rows))
    }

    async fn job_rankings(&self, job_id: Uuid) -> Result<Vec<JobRankingRow>, StorageError> {
        Ok(sqlx::query_as::<_, JobRankingRow>(JOB_RANKINGS_SQL)
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?)
    }
}

/// Folds the flat join rows back into one run with its results.
pub fn summarize_rows(rows: Vec<RunResultRow>) -> Option<RunSummary> {
    let first = rows.first()?;
    let run = AnalysisRunRow {
        id: first.run_id,
        resume_id: first.resume_id,
        job_id: first.job_id,
        composite_score: first.composite_score,
        overall_status: first.overall_status.clone(),
        weights_used: first.weights_used.clone(),
        created_at: first.run_created_at,
    };

    let results = rows
        .into_iter()
        .filter_map(|row| {
            Some(StoredResult {
                context_id: row.context_id?,
                analysis_type: row.analysis_type?,
                score: row.score?,
                evidence: row.evidence?,
                timing_ms: row.timing_ms?,
                created_at: row.result_created_at?,
            })
        })
        .collect();

    Some(RunSummary { run, results })
}
