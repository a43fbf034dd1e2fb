//! Coordinator: fans a scoring request out to every registered analyzer,
//! each in its own execution context, and folds the outcomes into one
//! composite.
//!
//! Nothing an individual analysis does can fail the request. The only
//! request-level errors are the ones detected before dispatch.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::orchestration::aggregate::{aggregate, CompositeResult, Weights, WeightsError};
use crate::orchestration::context_manager::{ContextManager, ContextOutcome};
use crate::orchestration::storage::Storage;
use crate::orchestration::types::{
    AnalysisResult, AnalysisType, PersistOutcome, SubjectRefs, TaskError, TaskStatus,
};
use crate::orchestration::unit::{AnalysisUnit, BoundContext};

pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("no analyzers registered")]
    NoAnalyzers,

    #[error("more than one analyzer registered for {0}")]
    DuplicateAnalyzer(AnalysisType),

    #[error("invalid {field}: '{value}' is not a UUID")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("invalid weights: {0}")]
    InvalidWeights(#[from] WeightsError),

    #[error("cannot dispatch analyses: {0}")]
    Dispatch(String),
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Budget for one analysis, context acquisition included. The run summary
    /// write gets the same budget.
    pub task_timeout: Duration,
    pub default_weights: Weights,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            task_timeout: DEFAULT_TASK_TIMEOUT,
            default_weights: Weights::default(),
        }
    }
}

pub struct Coordinator {
    analyzers: Vec<Arc<dyn AnalysisUnit>>,
    contexts: Arc<ContextManager>,
    storage: Arc<dyn Storage>,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(
        analyzers: Vec<Arc<dyn AnalysisUnit>>,
        contexts: Arc<ContextManager>,
        storage: Arc<dyn Storage>,
        config: CoordinatorConfig,
    ) -> Result<Self, CoordinatorError> {
        let mut seen = HashSet::new();
        for analyzer in &analyzers {
            if !seen.insert(analyzer.analysis_type()) {
                return Err(CoordinatorError::DuplicateAnalyzer(analyzer.analysis_type()));
            }
        }
        Ok(Self {
            analyzers,
            contexts,
            storage,
            config,
        })
    }

    /// Scores one resume against one job.
    ///
    /// `weights` overrides the configured defaults per analysis type name.
    pub async fn score(
        &self,
        resume_id: &str,
        job_id: &str,
        weights: Option<&BTreeMap<String, f64>>,
    ) -> Result<CompositeResult, CoordinatorError> {
        let subjects = SubjectRefs {
            resume_id: parse_id("resumeId", resume_id)?,
            job_id: parse_id("jobId", job_id)?,
        };
        let weights = match weights {
            Some(overrides) => self.config.default_weights.with_overrides(overrides)?,
            None => self.config.default_weights.clone(),
        };
        self.score_subjects(subjects, &weights).await
    }

    pub async fn score_subjects(
        &self,
        subjects: SubjectRefs,
        weights: &Weights,
    ) -> Result<CompositeResult, CoordinatorError> {
        if self.analyzers.is_empty() {
            return Err(CoordinatorError::NoAnalyzers);
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CoordinatorError::Dispatch(e.to_string()))?;

        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            resume_id = %subjects.resume_id,
            job_id = %subjects.job_id,
            analyzers = self.analyzers.len(),
            "Dispatching analyses"
        );

        let mut join_set = JoinSet::new();
        let mut task_types: HashMap<Id, AnalysisType> = HashMap::new();
        for analyzer in &self.analyzers {
            let handle = join_set.spawn_on(
                run_task(
                    Arc::clone(analyzer),
                    Arc::clone(&self.contexts),
                    Arc::clone(&self.storage),
                    run_id,
                    subjects,
                    self.config.task_timeout,
                ),
                &runtime,
            );
            task_types.insert(handle.id(), analyzer.analysis_type());
        }

        let mut results = BTreeMap::new();
        let mut abnormal: HashMap<AnalysisType, String> = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => {
                    results.insert(result.analysis_type, result);
                }
                Err(e) => {
                    let Some(analysis_type) = task_types.get(&e.id()).copied() else {
                        error!(run_id = %run_id, "Unknown analysis task ended abnormally: {e}");
                        continue;
                    };
                    let reason = abort_reason(e);
                    error!(
                        run_id = %run_id,
                        analysis_type = %analysis_type,
                        "Analysis task ended abnormally: {reason}"
                    );
                    abnormal.insert(analysis_type, reason);
                }
            }
        }

        // A task that panicked never reported its own result.
        for analyzer in &self.analyzers {
            let analysis_type = analyzer.analysis_type();
            if !results.contains_key(&analysis_type) {
                let reason = abnormal
                    .remove(&analysis_type)
                    .unwrap_or_else(|| "no result reported".to_string());
                warn!(run_id = %run_id, analysis_type = %analysis_type, "Filling missing result");
                results.insert(
                    analysis_type,
                    AnalysisResult::failed(
                        analysis_type,
                        None,
                        &TaskError::Aborted(reason),
                        None,
                        0,
                    ),
                );
            }
        }

        let mut composite = aggregate(run_id, subjects, results, weights, self.analyzers.len());

        let write = timeout(self.config.task_timeout, self.storage.put_run(&composite)).await;
        composite.run_persistence = Some(match write {
            Ok(Ok(())) => PersistOutcome::Stored,
            Ok(Err(e)) => {
                warn!(run_id = %run_id, "Run summary not persisted: {e}");
                PersistOutcome::Failed {
                    message: e.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    run_id = %run_id,
                    timeout_ms = self.config.task_timeout.as_millis() as u64,
                    "Run summary write timed out"
                );
                PersistOutcome::Failed {
                    message: "timed out".to_string(),
                }
            }
        });

        info!(
            run_id = %run_id,
            composite = ?composite.composite_score,
            status = composite.overall_status.as_str(),
            "Scoring run finished"
        );
        Ok(composite)
    }
}

fn parse_id(field: &'static str, value: &str) -> Result<Uuid, CoordinatorError> {
    Uuid::parse_str(value.trim()).map_err(|_| CoordinatorError::InvalidIdentifier {
        field,
        value: value.to_string(),
    })
}

fn abort_reason(e: JoinError) -> String {
    match e.try_into_panic() {
        Ok(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        Err(e) => e.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// One analysis from acquisition to release. The deadline covers both.
async fn run_task(
    analyzer: Arc<dyn AnalysisUnit>,
    contexts: Arc<ContextManager>,
    storage: Arc<dyn Storage>,
    run_id: Uuid,
    subjects: SubjectRefs,
    timeout: Duration,
) -> AnalysisResult {
    let analysis_type = analyzer.analysis_type();
    let started = Instant::now();
    let deadline = started + timeout;
    let timed_out = TaskError::TimeoutExceeded {
        timeout_ms: timeout.as_millis() as u64,
    };
    let elapsed_ms = || started.elapsed().as_millis() as u64;

    let mut lease =
        match timeout_at(deadline, contexts.acquire(run_id, analysis_type, subjects)).await {
            Ok(Ok(lease)) => lease,
            Ok(Err(e)) => {
                return AnalysisResult::failed(analysis_type, None, &e, None, elapsed_ms());
            }
            Err(_) => {
                warn!(run_id = %run_id, analysis_type = %analysis_type, "Timed out acquiring context");
                return AnalysisResult::failed(analysis_type, None, &timed_out, None, elapsed_ms());
            }
        };

    lease.activate();
    let ctx = BoundContext::new(lease.context().clone(), storage);

    match timeout_at(deadline, analyzer.run(&ctx)).await {
        Ok(result) => {
            let outcome = if result.status() == TaskStatus::Success {
                ContextOutcome::Completed
            } else {
                ContextOutcome::Failed
            };
            lease.release(outcome);
            result
        }
        Err(_) => {
            warn!(
                run_id = %run_id,
                context_id = %lease.context().id,
                analysis_type = %analysis_type,
                timeout_ms = timeout.as_millis() as u64,
                "Analysis timed out"
            );
            let result = AnalysisResult::failed(
                analysis_type,
                Some(lease.context()),
                &timed_out,
                None,
                elapsed_ms(),
            );
            lease.release(ContextOutcome::Failed);
            result
        }
    }
}
