//! Skill analyzer: lexical and fuzzy matching of resume skills against the
//! job's required and preferred skills.
//!
//! Match strength per requirement:
//! - normalized exact match → 1.0
//! - one name contained in the other on word boundaries ("postgres" / "postgres sql") → 0.9
//! - character-bigram similarity ≥ 0.8 → the similarity itself
//!
//! score = 100 × (0.8 × required_coverage + 0.2 × preferred_coverage), where a
//! coverage is the mean match strength. An empty side counts as fully covered.

use async_trait::async_trait;

use crate::analyzers::text::{bigram_similarity, normalize, round_to};
use crate::models::subject::{JobRecord, ResumeRecord};
use crate::orchestration::evidence::{Evidence, SkillEvidence, SkillMatch};
use crate::orchestration::types::AnalysisType;
use crate::orchestration::unit::{AnalysisUnit, RawAnalysis};

const FUZZY_THRESHOLD: f64 = 0.8;
const CONTAINMENT_STRENGTH: f64 = 0.9;
const REQUIRED_WEIGHT: f64 = 0.8;
const PREFERRED_WEIGHT: f64 = 0.2;

pub struct SkillAnalyzer;

#[async_trait]
impl AnalysisUnit for SkillAnalyzer {
    fn analysis_type(&self) -> AnalysisType {
        AnalysisType::Skill
    }

    fn analyze(&self, resume: &ResumeRecord, job: &JobRecord) -> RawAnalysis {
        let (matched_required, missing_required) = match_all(&job.required_skills, &resume.skills);
        let (matched_preferred, missing_preferred) =
            match_all(&job.preferred_skills, &resume.skills);

        let required_coverage = coverage(&matched_required, job.required_skills.len());
        let preferred_coverage = coverage(&matched_preferred, job.preferred_skills.len());

        let score = match (job.required_skills.is_empty(), job.preferred_skills.is_empty()) {
            (true, true) => 100.0,
            (false, true) => 100.0 * required_coverage,
            (true, false) => 100.0 * preferred_coverage,
            (false, false) => {
                100.0 * (REQUIRED_WEIGHT * required_coverage + PREFERRED_WEIGHT * preferred_coverage)
            }
        };

        RawAnalysis {
            score: round_to(score, 1),
            evidence: Evidence::Skill(SkillEvidence {
                matched_required,
                missing_required,
                matched_preferred,
                missing_preferred,
                required_coverage: round_to(required_coverage, 4),
                preferred_coverage: round_to(preferred_coverage, 4),
            }),
        }
    }
}

fn match_all(requirements: &[String], skills: &[String]) -> (Vec<SkillMatch>, Vec<String>) {
    let mut matched = Vec::new();
    let mut missing = Vec::new();
    for requirement in requirements {
        match best_match(requirement, skills) {
            Some(m) => matched.push(m),
            None => missing.push(requirement.clone()),
        }
    }
    (matched, missing)
}

/// Strongest match for one requirement. Ties keep the earliest resume skill.
fn best_match(requirement: &str, skills: &[String]) -> Option<SkillMatch> {
    let wanted = normalize(requirement);
    if wanted.is_empty() {
        return None;
    }

    let mut best: Option<SkillMatch> = None;
    for skill in skills {
        let have = normalize(skill);
        if have.is_empty() {
            continue;
        }

        let similarity = if have == wanted {
            1.0
        } else if contains_words(&have, &wanted) || contains_words(&wanted, &have) {
            CONTAINMENT_STRENGTH
        } else {
            let s = bigram_similarity(&have, &wanted);
            if s >= FUZZY_THRESHOLD {
                s
            } else {
                continue;
            }
        };

        if best.as_ref().map_or(true, |b| similarity > b.similarity) {
            best = Some(SkillMatch {
                requirement: requirement.to_string(),
                matched_with: skill.clone(),
                similarity: round_to(similarity, 4),
            });
        }
    }
    best
}

fn contains_words(haystack: &str, needle: &str) -> bool {
    format!(" {haystack} ").contains(&format!(" {needle} "))
}

fn coverage(matched: &[SkillMatch], total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    matched.iter().map(|m| m.similarity).sum::<f64>() / total as f64
}
