//! Shared vocabulary of the orchestration layer: analysis types, context lifecycle,
//! per-task outcomes and the task-level error taxonomy.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::orchestration::evidence::Evidence;

// ────────────────────────────────────────────────────────────────────────────
// Analysis types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Skill,
    Experience,
    Education,
    Certification,
    Semantic,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 5] = [
        AnalysisType::Skill,
        AnalysisType::Experience,
        AnalysisType::Education,
        AnalysisType::Certification,
        AnalysisType::Semantic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisType::Skill => "skill",
            AnalysisType::Experience => "experience",
            AnalysisType::Education => "education",
            AnalysisType::Certification => "certification",
            AnalysisType::Semantic => "semantic",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown analysis type '{s}'"))
    }
}

/// The resume/job pair a run is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRefs {
    pub resume_id: Uuid,
    pub job_id: Uuid,
}

// ────────────────────────────────────────────────────────────────────────────
// Execution contexts
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

impl ContextStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ContextStatus::Completed | ContextStatus::Failed)
    }

    /// Status only moves forward. A pending context may fail without ever activating
    /// (timeout or abandoned task), but it cannot complete without doing work.
    pub fn can_transition_to(self, next: ContextStatus) -> bool {
        matches!(
            (self, next),
            (ContextStatus::Pending, ContextStatus::Active)
                | (ContextStatus::Pending, ContextStatus::Failed)
                | (ContextStatus::Active, ContextStatus::Completed)
                | (ContextStatus::Active, ContextStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContextStatus::Pending => "pending",
            ContextStatus::Active => "active",
            ContextStatus::Completed => "completed",
            ContextStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationTier {
    /// Copy-on-write or view-based clone; nothing is duplicated.
    ZeroCopy,
    /// Explicit duplication of the subject records.
    Standard,
    /// The primary store, shared with every other task.
    Shared,
}

impl IsolationTier {
    pub fn as_str(self) -> &'static str {
        match self {
            IsolationTier::ZeroCopy => "zero_copy",
            IsolationTier::Standard => "standard",
            IsolationTier::Shared => "shared",
        }
    }
}

/// Opaque handle to the isolated store backing one context.
///
/// `handle` is provider specific (a schema name for Postgres). `scope` is the only
/// subject pair the handle is allowed to serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub tier: IsolationTier,
    pub handle: String,
    pub scope: SubjectRefs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub id: Uuid,
    pub run_id: Uuid,
    pub analysis_type: AnalysisType,
    pub subjects: SubjectRefs,
    pub status: ContextStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub connection: ConnectionDescriptor,
    /// Set once the provider has reclaimed the isolated store.
    pub resources_released: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Unit lifecycle
// ────────────────────────────────────────────────────────────────────────────

/// Steps of one analysis unit run, in the only order they may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitPhase {
    Created,
    Loading,
    Analyzing,
    Validating,
    Persisting,
    Done,
}

impl UnitPhase {
    pub fn next(self) -> Option<UnitPhase> {
        match self {
            UnitPhase::Created => Some(UnitPhase::Loading),
            UnitPhase::Loading => Some(UnitPhase::Analyzing),
            UnitPhase::Analyzing => Some(UnitPhase::Validating),
            UnitPhase::Validating => Some(UnitPhase::Persisting),
            UnitPhase::Persisting => Some(UnitPhase::Done),
            UnitPhase::Done => None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Task errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskErrorKind {
    ContextAcquisitionFailure,
    DataUnavailable,
    InvalidResult,
    PersistFailure,
    TimeoutExceeded,
    Aborted,
}

/// Everything that can go wrong inside one analysis task. None of these escape
/// the task boundary; they end up inside the task's [`AnalysisResult`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TaskError {
    #[error("all isolation tiers failed: {}", attempts.join("; "))]
    ContextAcquisitionFailure { attempts: Vec<String> },

    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("invalid result: {0}")]
    InvalidResult(String),

    #[error("persist failed: {0}")]
    PersistFailure(String),

    #[error("timed out after {timeout_ms}ms")]
    TimeoutExceeded { timeout_ms: u64 },

    /// The task ended without reporting (it panicked or was cancelled).
    #[error("analysis task aborted: {0}")]
    Aborted(String),
}

impl TaskError {
    pub fn kind(&self) -> TaskErrorKind {
        match self {
            TaskError::ContextAcquisitionFailure { .. } => TaskErrorKind::ContextAcquisitionFailure,
            TaskError::DataUnavailable(_) => TaskErrorKind::DataUnavailable,
            TaskError::InvalidResult(_) => TaskErrorKind::InvalidResult,
            TaskError::PersistFailure(_) => TaskErrorKind::PersistFailure,
            TaskError::TimeoutExceeded { .. } => TaskErrorKind::TimeoutExceeded,
            TaskError::Aborted(_) => TaskErrorKind::Aborted,
        }
    }
}

/// Serializable description of a failed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: TaskErrorKind,
    pub message: String,
    /// Unit phase the failure happened in, when the unit had started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<UnitPhase>,
}

impl TaskFailure {
    pub fn new(error: &TaskError, phase: Option<UnitPhase>) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            phase,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Results
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Success,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PersistOutcome {
    Stored,
    /// The score is still valid; the write did not land.
    Failed { message: String },
}

/// Terminal outcome of a task. A score exists only in the `Success` arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Outcome {
    Success {
        score: f64,
        evidence: Evidence,
        persistence: PersistOutcome,
    },
    Failed {
        error: TaskFailure,
    },
    TimedOut {
        error: TaskFailure,
    },
}

/// Output of one analysis unit. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub analysis_type: AnalysisType,
    pub context_id: Option<Uuid>,
    pub isolation_tier: Option<IsolationTier>,
    pub timing_ms: u64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl AnalysisResult {
    pub fn failed(
        analysis_type: AnalysisType,
        context: Option<&ExecutionContext>,
        error: &TaskError,
        phase: Option<UnitPhase>,
        timing_ms: u64,
    ) -> Self {
        let outcome = match error {
            TaskError::TimeoutExceeded { .. } => Outcome::TimedOut {
                error: TaskFailure::new(error, phase),
            },
            _ => Outcome::Failed {
                error: TaskFailure::new(error, phase),
            },
        };
        Self {
            analysis_type,
            context_id: context.map(|c| c.id),
            isolation_tier: context.map(|c| c.connection.tier),
            timing_ms,
            outcome,
        }
    }

    pub fn status(&self) -> TaskStatus {
        match self.outcome {
            Outcome::Success { .. } => TaskStatus::Success,
            Outcome::Failed { .. } => TaskStatus::Failed,
            Outcome::TimedOut { .. } => TaskStatus::TimedOut,
        }
    }

    pub fn score(&self) -> Option<f64> {
        match &self.outcome {
            Outcome::Success { score, .. } => Some(*score),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn evidence(&self) -> Option<&Evidence> {
        match &self.outcome {
            Outcome::Success { evidence, .. } => Some(evidence),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TaskFailure> {
        match &self.outcome {
            Outcome::Success { .. } => None,
            Outcome::Failed { error } | Outcome::TimedOut { error } => Some(error),
        }
    }

    /// Message of a failed write for a result that otherwise succeeded.
    pub fn persist_warning(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success {
                persistence: PersistOutcome::Failed { message },
                ..
            } => Some(message),
            _ => None,
        }
    }
}
