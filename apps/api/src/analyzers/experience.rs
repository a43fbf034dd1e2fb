//! Experience analyzer: total years of experience against the job's range.
//!
//! Positions are merged before counting so overlapping jobs are not double
//! counted. Open-ended positions stop at the resume's `as_of` date.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::analyzers::text::round_to;
use crate::models::subject::{ExperienceItem, JobRecord, ResumeRecord};
use crate::orchestration::evidence::{Evidence, ExperienceEvidence};
use crate::orchestration::types::AnalysisType;
use crate::orchestration::unit::{AnalysisUnit, RawAnalysis};

const DAYS_PER_YEAR: f64 = 365.25;
/// Points lost per year beyond the job's maximum.
const OVERQUALIFIED_PENALTY_PER_YEAR: f64 = 5.0;
const OVERQUALIFIED_FLOOR: f64 = 70.0;

pub struct ExperienceAnalyzer;

#[async_trait]
impl AnalysisUnit for ExperienceAnalyzer {
    fn analysis_type(&self) -> AnalysisType {
        AnalysisType::Experience
    }

    fn analyze(&self, resume: &ResumeRecord, job: &JobRecord) -> RawAnalysis {
        let (candidate_years, positions_counted) = total_years(&resume.experience, resume.as_of);
        let required_min_years = job.min_years_experience.max(0.0);
        // An inverted range carries no usable maximum.
        let required_max_years = job
            .max_years_experience
            .filter(|max| max.is_finite() && *max >= required_min_years);

        let shortfall_years = round_to((required_min_years - candidate_years).max(0.0), 2);
        let excess_years = required_max_years
            .map(|max| round_to((candidate_years - max).max(0.0), 2))
            .unwrap_or(0.0);

        let score = if shortfall_years > 0.0 {
            100.0 * candidate_years / required_min_years
        } else if excess_years > 0.0 {
            (100.0 - OVERQUALIFIED_PENALTY_PER_YEAR * excess_years).max(OVERQUALIFIED_FLOOR)
        } else {
            100.0
        };

        RawAnalysis {
            score: round_to(score, 1),
            evidence: Evidence::Experience(ExperienceEvidence {
                candidate_years,
                required_min_years,
                required_max_years,
                shortfall_years,
                excess_years,
                positions_counted,
            }),
        }
    }
}

/// Years covered by the union of all positions, rounded to two decimals,
/// plus the number of positions that contributed.
fn total_years(items: &[ExperienceItem], as_of: NaiveDate) -> (f64, usize) {
    let mut spans: Vec<(NaiveDate, NaiveDate)> = items
        .iter()
        .filter_map(|item| {
            let end = item.date_end.unwrap_or(as_of).min(as_of);
            (item.date_start < end).then_some((item.date_start, end))
        })
        .collect();
    let counted = spans.len();
    spans.sort();

    let mut days = 0i64;
    let mut current: Option<(NaiveDate, NaiveDate)> = None;
    for (start, end) in spans {
        current = match current {
            Some((s, e)) if start <= e => Some((s, e.max(end))),
            Some((s, e)) => {
                days += (e - s).num_days();
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((s, e)) = current {
        days += (e - s).num_days();
    }

    (round_to(days as f64 / DAYS_PER_YEAR, 2), counted)
}
