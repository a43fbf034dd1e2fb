//! Composite scoring over the analyses that succeeded.
//!
//! Weights are renormalized over the successful set S so the composite is always
//! a weighted mean of real scores. A failed or timed-out analysis never counts
//! as zero; an empty S has no composite at all.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::analyzers::text::round_to;
use crate::orchestration::types::{
    AnalysisResult, AnalysisType, PersistOutcome, SubjectRefs, TaskFailure, TaskStatus,
};

#[derive(Debug, Error, PartialEq)]
pub enum WeightsError {
    #[error("unknown analysis type '{0}' in weights")]
    UnknownType(String),

    #[error("weight for {analysis_type} must be a finite number >= 0, got {value}")]
    OutOfRange {
        analysis_type: AnalysisType,
        value: f64,
    },

    #[error("weights must not all be zero")]
    ZeroSum,
}

/// Relative importance of each analysis type. Not necessarily normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weights(BTreeMap<AnalysisType, f64>);

impl Default for Weights {
    fn default() -> Self {
        Self(BTreeMap::from([
            (AnalysisType::Skill, 0.35),
            (AnalysisType::Experience, 0.25),
            (AnalysisType::Education, 0.15),
            (AnalysisType::Certification, 0.10),
            (AnalysisType::Semantic, 0.15),
        ]))
    }
}

impl Weights {
    pub fn new(weights: BTreeMap<AnalysisType, f64>) -> Result<Self, WeightsError> {
        for (&analysis_type, &value) in &weights {
            if !value.is_finite() || value < 0.0 {
                return Err(WeightsError::OutOfRange {
                    analysis_type,
                    value,
                });
            }
        }
        if weights.values().sum::<f64>() <= 0.0 {
            return Err(WeightsError::ZeroSum);
        }
        Ok(Self(weights))
    }

    /// These weights with `overrides` applied on top. Keys are analysis type names.
    pub fn with_overrides(&self, overrides: &BTreeMap<String, f64>) -> Result<Self, WeightsError> {
        let mut merged = self.0.clone();
        for (name, &value) in overrides {
            let analysis_type = name
                .parse::<AnalysisType>()
                .map_err(|_| WeightsError::UnknownType(name.clone()))?;
            merged.insert(analysis_type, value);
        }
        Self::new(merged)
    }

    pub fn get(&self, analysis_type: AnalysisType) -> f64 {
        self.0.get(&analysis_type).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallStatus {
    Complete,
    Partial,
    Failed,
}

impl OverallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OverallStatus::Complete => "Complete",
            OverallStatus::Partial => "Partial",
            OverallStatus::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResult {
    pub run_id: Uuid,
    pub subjects: SubjectRefs,
    /// One entry per dispatched analyzer, whatever its outcome.
    pub results: BTreeMap<AnalysisType, AnalysisResult>,
    /// Weights over the successful analyses only; sums to 1.0 when non-empty.
    pub weights_used: BTreeMap<AnalysisType, f64>,
    pub composite_score: Option<f64>,
    pub overall_status: OverallStatus,
    /// Outcome of storing the run summary, once attempted.
    pub run_persistence: Option<PersistOutcome>,
}

impl CompositeResult {
    pub fn scores(&self) -> BTreeMap<AnalysisType, Option<f64>> {
        self.results.iter().map(|(&t, r)| (t, r.score())).collect()
    }

    pub fn per_task_status(&self) -> BTreeMap<AnalysisType, TaskStatus> {
        self.results.iter().map(|(&t, r)| (t, r.status())).collect()
    }

    pub fn errors(&self) -> BTreeMap<AnalysisType, TaskFailure> {
        self.results
            .iter()
            .filter_map(|(&t, r)| r.error().map(|e| (t, e.clone())))
            .collect()
    }

    /// Writes that did not land: per-analysis results, then the run summary.
    pub fn persist_warnings(&self) -> Vec<String> {
        let mut warnings: Vec<String> = self
            .results
            .iter()
            .filter_map(|(t, r)| r.persist_warning().map(|w| format!("{t}: {w}")))
            .collect();
        if let Some(PersistOutcome::Failed { message }) = &self.run_persistence {
            warnings.push(format!("run summary: {message}"));
        }
        warnings
    }
}

/// Folds per-task results into the run's composite.
///
/// `expected` is the number of dispatched analyzers; the run is `Complete` only
/// when every one of them succeeded.
pub fn aggregate(
    run_id: Uuid,
    subjects: SubjectRefs,
    results: BTreeMap<AnalysisType, AnalysisResult>,
    weights: &Weights,
    expected: usize,
) -> CompositeResult {
    let successes: Vec<(AnalysisType, f64)> = results
        .iter()
        .filter_map(|(&t, r)| r.score().map(|s| (t, s)))
        .collect();

    if successes.is_empty() {
        return CompositeResult {
            run_id,
            subjects,
            results,
            weights_used: BTreeMap::new(),
            composite_score: None,
            overall_status: OverallStatus::Failed,
            run_persistence: None,
        };
    }

    let total: f64 = successes.iter().map(|&(t, _)| weights.get(t)).sum();
    let weights_used: BTreeMap<AnalysisType, f64> = if total > 0.0 {
        successes
            .iter()
            .map(|&(t, _)| (t, weights.get(t) / total))
            .collect()
    } else {
        // Only zero-weighted analyses succeeded.
        warn!(
            run_id = %run_id,
            succeeded = successes.len(),
            "Successful analyses carry no weight; averaging them uniformly"
        );
        let uniform = 1.0 / successes.len() as f64;
        successes.iter().map(|&(t, _)| (t, uniform)).collect()
    };

    let composite: f64 = successes
        .iter()
        .map(|&(t, score)| weights_used[&t] * score)
        .sum();

    let overall_status = if successes.len() == expected && results.len() == expected {
        OverallStatus::Complete
    } else {
        OverallStatus::Partial
    };

    CompositeResult {
        run_id,
        subjects,
        results,
        weights_used,
        composite_score: Some(round_to(composite, 2)),
        overall_status,
        run_persistence: None,
    }
}
