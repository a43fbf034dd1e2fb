//! Education analyzer: highest attained level against the required level,
//! with a penalty when the job names preferred fields and none match.

use async_trait::async_trait;

use crate::analyzers::text::{bigram_similarity, normalize, round_to};
use crate::models::subject::{EducationItem, EducationLevel, JobRecord, ResumeRecord};
use crate::orchestration::evidence::{EducationEvidence, Evidence};
use crate::orchestration::types::AnalysisType;
use crate::orchestration::unit::{AnalysisUnit, RawAnalysis};

const FIELD_MISMATCH_FACTOR: f64 = 0.85;
const FIELD_SIMILARITY_THRESHOLD: f64 = 0.8;

pub struct EducationAnalyzer;

#[async_trait]
impl AnalysisUnit for EducationAnalyzer {
    fn analysis_type(&self) -> AnalysisType {
        AnalysisType::Education
    }

    fn analyze(&self, resume: &ResumeRecord, job: &JobRecord) -> RawAnalysis {
        let candidate_level = resume.education.iter().map(|e| e.level).max();
        let required_level = job.required_education;

        // No degree ranks below every level.
        let level_gap = match required_level {
            Some(required) => required.rank() - candidate_level.map_or(0, EducationLevel::rank),
            None => 0,
        };

        let mut score = level_score(level_gap);

        let matched_field = find_field(&resume.education, &job.preferred_fields);
        let field_match = matched_field.is_some();
        if !job.preferred_fields.is_empty() && !field_match {
            score *= FIELD_MISMATCH_FACTOR;
        }

        RawAnalysis {
            score: round_to(score, 1),
            evidence: Evidence::Education(EducationEvidence {
                candidate_level,
                required_level,
                level_gap,
                field_match,
                matched_field,
            }),
        }
    }
}

fn level_score(gap: i32) -> f64 {
    match gap {
        g if g <= 0 => 100.0,
        1 => 65.0,
        2 => 35.0,
        _ => 10.0,
    }
}

fn find_field(education: &[EducationItem], preferred: &[String]) -> Option<String> {
    education
        .iter()
        .find(|item| preferred.iter().any(|p| fields_match(&item.field, p)))
        .map(|item| item.field.clone())
}

fn fields_match(have: &str, wanted: &str) -> bool {
    let have = normalize(have);
    let wanted = normalize(wanted);
    if have.is_empty() || wanted.is_empty() {
        return false;
    }
    have.contains(&wanted)
        || wanted.contains(&have)
        || bigram_similarity(&have, &wanted) >= FIELD_SIMILARITY_THRESHOLD
}
