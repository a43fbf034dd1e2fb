//! Per-analyzer evidence schemas.
//!
//! Each analyzer returns exactly one variant. `check` enforces the invariants
//! the type system cannot: ratios in [0, 1], finite non-negative measurements,
//! and consistency between matched and missing lists.

use serde::{Deserialize, Serialize};

use crate::models::subject::EducationLevel;
use crate::orchestration::types::AnalysisType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub requirement: String,
    pub matched_with: String,
    /// 1.0 for a normalized exact match, lower for fuzzy matches.
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEvidence {
    pub matched_required: Vec<SkillMatch>,
    pub missing_required: Vec<String>,
    pub matched_preferred: Vec<SkillMatch>,
    pub missing_preferred: Vec<String>,
    pub required_coverage: f64,
    pub preferred_coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEvidence {
    pub candidate_years: f64,
    pub required_min_years: f64,
    pub required_max_years: Option<f64>,
    /// Years short of the minimum, 0 when the minimum is met.
    pub shortfall_years: f64,
    /// Years beyond the maximum, 0 when there is no maximum or it is not exceeded.
    pub excess_years: f64,
    pub positions_counted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationEvidence {
    pub candidate_level: Option<EducationLevel>,
    pub required_level: Option<EducationLevel>,
    /// required rank minus candidate rank; positive means below requirement.
    pub level_gap: i32,
    pub field_match: bool,
    pub matched_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificationEvidence {
    pub matched_required: Vec<String>,
    pub missing_required: Vec<String>,
    pub matched_preferred: Vec<String>,
    pub missing_preferred: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticEvidence {
    pub cosine_similarity: f64,
    pub shared_terms: Vec<String>,
    pub resume_terms: usize,
    pub job_terms: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    Skill(SkillEvidence),
    Experience(ExperienceEvidence),
    Education(EducationEvidence),
    Certification(CertificationEvidence),
    Semantic(SemanticEvidence),
}

impl Evidence {
    pub fn analysis_type(&self) -> AnalysisType {
        match self {
            Evidence::Skill(_) => AnalysisType::Skill,
            Evidence::Experience(_) => AnalysisType::Experience,
            Evidence::Education(_) => AnalysisType::Education,
            Evidence::Certification(_) => AnalysisType::Certification,
            Evidence::Semantic(_) => AnalysisType::Semantic,
        }
    }

    /// Returns a description of the first violated invariant.
    pub fn check(&self) -> Result<(), String> {
        match self {
            Evidence::Skill(e) => {
                ratio("required_coverage", e.required_coverage)?;
                ratio("preferred_coverage", e.preferred_coverage)?;
                for m in e.matched_required.iter().chain(&e.matched_preferred) {
                    ratio("similarity", m.similarity)?;
                }
                Ok(())
            }
            Evidence::Experience(e) => {
                non_negative("candidate_years", e.candidate_years)?;
                non_negative("required_min_years", e.required_min_years)?;
                non_negative("shortfall_years", e.shortfall_years)?;
                non_negative("excess_years", e.excess_years)?;
                if let Some(max) = e.required_max_years {
                    non_negative("required_max_years", max)?;
                    if max < e.required_min_years {
                        return Err(format!(
                            "required_max_years {max} is below required_min_years {}",
                            e.required_min_years
                        ));
                    }
                }
                Ok(())
            }
            Evidence::Education(e) => {
                if e.field_match && e.matched_field.is_none() {
                    return Err("field_match is set but matched_field is empty".to_string());
                }
                Ok(())
            }
            Evidence::Certification(e) => {
                if let Some(dup) = e
                    .matched_required
                    .iter()
                    .find(|c| e.missing_required.contains(c))
                {
                    return Err(format!("certification '{dup}' is both matched and missing"));
                }
                Ok(())
            }
            Evidence::Semantic(e) => {
                if !e.cosine_similarity.is_finite() || !(-1.0..=1.0).contains(&e.cosine_similarity)
                {
                    return Err(format!(
                        "cosine_similarity {} outside [-1, 1]",
                        e.cosine_similarity
                    ));
                }
                if e.shared_terms.len() > e.resume_terms.min(e.job_terms) {
                    return Err("more shared terms than distinct terms on one side".to_string());
                }
                Ok(())
            }
        }
    }
}

fn ratio(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} {value} outside [0, 1]"))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{field} {value} must be finite and non-negative"))
    }
}
