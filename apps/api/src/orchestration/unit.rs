//! Analysis Unit: the load → analyze → validate → persist contract every
//! specialized analyzer implements.
//!
//! Implementors only have to provide `analysis_type` and `analyze`. `run` wraps
//! the four steps in one error boundary: whatever goes wrong comes back as an
//! `AnalysisResult` with status `Failed`, never as an error.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::models::subject::{JobRecord, ResumeRecord};
use crate::orchestration::evidence::Evidence;
use crate::orchestration::storage::{ResultParams, Storage, StorageError};
use crate::orchestration::types::{
    AnalysisResult, AnalysisType, ExecutionContext, Outcome, PersistOutcome, TaskError, UnitPhase,
};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Unchecked analyzer output.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAnalysis {
    pub score: f64,
    pub evidence: Evidence,
}

/// Analyzer output that passed `validate`. Only constructible through validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAnalysis {
    score: f64,
    evidence: Evidence,
}

impl ValidatedAnalysis {
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn evidence(&self) -> &Evidence {
        &self.evidence
    }
}

/// A unit's view of its execution context: the subjects it was acquired for,
/// read and written through that context's connection only.
pub struct BoundContext {
    context: ExecutionContext,
    storage: Arc<dyn Storage>,
}

impl BoundContext {
    pub fn new(context: ExecutionContext, storage: Arc<dyn Storage>) -> Self {
        Self { context, storage }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub async fn resume(&self) -> Result<ResumeRecord, StorageError> {
        self.storage
            .get_resume(&self.context.connection, self.context.subjects.resume_id)
            .await
    }

    pub async fn job(&self) -> Result<JobRecord, StorageError> {
        self.storage
            .get_job(&self.context.connection, self.context.subjects.job_id)
            .await
    }

    pub async fn store(
        &self,
        analysis_type: AnalysisType,
        result: &ValidatedAnalysis,
        timing_ms: u64,
    ) -> Result<(), StorageError> {
        self.storage
            .put_result(
                &self.context.connection,
                ResultParams {
                    context_id: self.context.id,
                    run_id: self.context.run_id,
                    analysis_type,
                    score: result.score(),
                    evidence: result.evidence(),
                    timing_ms,
                },
            )
            .await
    }
}

#[async_trait]
pub trait AnalysisUnit: Send + Sync {
    fn analysis_type(&self) -> AnalysisType;

    async fn load_inputs(&self, ctx: &BoundContext) -> Result<(ResumeRecord, JobRecord), TaskError> {
        load_subjects(ctx).await
    }

    /// Pure scoring. Must return the same output for the same inputs.
    fn analyze(&self, resume: &ResumeRecord, job: &JobRecord) -> RawAnalysis;

    fn validate(&self, raw: RawAnalysis) -> Result<ValidatedAnalysis, TaskError> {
        validate_raw(self.analysis_type(), raw)
    }

    async fn persist(
        &self,
        ctx: &BoundContext,
        result: &ValidatedAnalysis,
        timing_ms: u64,
    ) -> Result<(), TaskError> {
        ctx.store(self.analysis_type(), result, timing_ms)
            .await
            .map_err(|e| TaskError::PersistFailure(e.to_string()))
    }

    async fn run(&self, ctx: &BoundContext) -> AnalysisResult {
        run_unit(self, ctx).await
    }
}

/// Reads both subjects through the context, mapping any storage failure to `DataUnavailable`.
pub async fn load_subjects(ctx: &BoundContext) -> Result<(ResumeRecord, JobRecord), TaskError> {
    let resume = ctx
        .resume()
        .await
        .map_err(|e| TaskError::DataUnavailable(format!("resume: {e}")))?;
    let job = ctx
        .job()
        .await
        .map_err(|e| TaskError::DataUnavailable(format!("job: {e}")))?;
    Ok((resume, job))
}

/// Rejects out-of-contract output instead of repairing it.
pub fn validate_raw(
    expected: AnalysisType,
    raw: RawAnalysis,
) -> Result<ValidatedAnalysis, TaskError> {
    if !raw.score.is_finite() {
        return Err(TaskError::InvalidResult(format!(
            "score {} is not a finite number",
            raw.score
        )));
    }
    if !(MIN_SCORE..=MAX_SCORE).contains(&raw.score) {
        return Err(TaskError::InvalidResult(format!(
            "score {} outside [{MIN_SCORE}, {MAX_SCORE}]",
            raw.score
        )));
    }
    let produced = raw.evidence.analysis_type();
    if produced != expected {
        return Err(TaskError::InvalidResult(format!(
            "{expected} analyzer produced {produced} evidence"
        )));
    }
    raw.evidence.check().map_err(TaskError::InvalidResult)?;

    Ok(ValidatedAnalysis {
        score: raw.score,
        evidence: raw.evidence,
    })
}

/// Tracks the unit state machine for one run. Phases only move one step forward.
struct UnitRun {
    analysis_type: AnalysisType,
    phase: UnitPhase,
    started: Instant,
}

impl UnitRun {
    fn new(analysis_type: AnalysisType) -> Self {
        Self {
            analysis_type,
            phase: UnitPhase::Created,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, ctx: &BoundContext) {
        if let Some(next) = self.phase.next() {
            debug!(
                context_id = %ctx.context().id,
                analysis_type = %self.analysis_type,
                from = ?self.phase,
                to = ?next,
                "Unit phase"
            );
            self.phase = next;
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn fail(mut self, ctx: &BoundContext, error: &TaskError) -> AnalysisResult {
        let failed_in = self.phase;
        warn!(
            context_id = %ctx.context().id,
            analysis_type = %self.analysis_type,
            phase = ?failed_in,
            kind = ?error.kind(),
            "Analysis unit failed: {error}"
        );
        while self.phase != UnitPhase::Done {
            self.advance(ctx);
        }
        AnalysisResult::failed(
            self.analysis_type,
            Some(ctx.context()),
            error,
            Some(failed_in),
            self.elapsed_ms(),
        )
    }
}

pub async fn run_unit<U: AnalysisUnit + ?Sized>(unit: &U, ctx: &BoundContext) -> AnalysisResult {
    let analysis_type = unit.analysis_type();
    let mut run = UnitRun::new(analysis_type);

    run.advance(ctx); // Loading
    let (resume, job) = match unit.load_inputs(ctx).await {
        Ok(inputs) => inputs,
        Err(e) => return run.fail(ctx, &e),
    };

    run.advance(ctx); // Analyzing
    let raw = unit.analyze(&resume, &job);

    run.advance(ctx); // Validating
    let validated = match unit.validate(raw) {
        Ok(validated) => validated,
        Err(e) => return run.fail(ctx, &e),
    };

    run.advance(ctx); // Persisting
    let persistence = match unit.persist(ctx, &validated, run.elapsed_ms()).await {
        Ok(()) => PersistOutcome::Stored,
        Err(e) => {
            // The score stands; the caller sees the lost write as a warning.
            warn!(
                context_id = %ctx.context().id,
                analysis_type = %analysis_type,
                "Result not persisted: {e}"
            );
            PersistOutcome::Failed {
                message: e.to_string(),
            }
        }
    };

    run.advance(ctx); // Done
    AnalysisResult {
        analysis_type,
        context_id: Some(ctx.context().id),
        isolation_tier: Some(ctx.context().connection.tier),
        timing_ms: run.elapsed_ms(),
        outcome: Outcome::Success {
            score: validated.score,
            evidence: validated.evidence,
            persistence,
        },
    }
}
