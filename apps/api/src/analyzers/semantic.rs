//! Semantic analyzer: cosine similarity between term-frequency vectors of the
//! resume text and the job posting.
//!
//! Raw cosine values for documents of this size cluster low, so the score is
//! `100 × sqrt(cosine)`.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::analyzers::text::{content_terms, round_to};
use crate::models::subject::{JobRecord, ResumeRecord};
use crate::orchestration::evidence::{Evidence, SemanticEvidence};
use crate::orchestration::types::AnalysisType;
use crate::orchestration::unit::{AnalysisUnit, RawAnalysis};

const MAX_SHARED_TERMS: usize = 15;

pub struct SemanticAnalyzer;

#[async_trait]
impl AnalysisUnit for SemanticAnalyzer {
    fn analysis_type(&self) -> AnalysisType {
        AnalysisType::Semantic
    }

    fn analyze(&self, resume: &ResumeRecord, job: &JobRecord) -> RawAnalysis {
        let resume_tf = term_frequencies(&resume_text(resume));
        let job_tf = term_frequencies(&format!("{} {}", job.title, job.description));

        let cosine = cosine_similarity(&resume_tf, &job_tf);

        RawAnalysis {
            score: round_to(100.0 * cosine.sqrt(), 1),
            evidence: Evidence::Semantic(SemanticEvidence {
                cosine_similarity: round_to(cosine, 4),
                shared_terms: shared_terms(&resume_tf, &job_tf),
                resume_terms: resume_tf.len(),
                job_terms: job_tf.len(),
            }),
        }
    }
}

/// Free text plus the structured fields, so a sparse `raw_text` still carries
/// the candidate's vocabulary.
fn resume_text(resume: &ResumeRecord) -> String {
    let mut parts = vec![resume.raw_text.clone(), resume.skills.join(" ")];
    for item in &resume.experience {
        parts.push(item.title.clone());
        parts.push(item.description.clone());
    }
    parts.join(" ")
}

fn term_frequencies(text: &str) -> BTreeMap<String, u32> {
    let mut tf = BTreeMap::new();
    for term in content_terms(text) {
        *tf.entry(term).or_insert(0) += 1;
    }
    tf
}

/// Always in [0, 1]; term counts are never negative.
fn cosine_similarity(a: &BTreeMap<String, u32>, b: &BTreeMap<String, u32>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, &x)| b.get(term).map(|&y| f64::from(x) * f64::from(y)))
        .sum();
    let norm_a = a.values().map(|&x| f64::from(x).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.values().map(|&y| f64::from(y).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Shared terms, strongest first: by the smaller of the two counts, then alphabetically.
fn shared_terms(a: &BTreeMap<String, u32>, b: &BTreeMap<String, u32>) -> Vec<String> {
    let mut shared: Vec<(&String, u32)> = a
        .iter()
        .filter_map(|(term, &x)| b.get(term).map(|&y| (term, x.min(y))))
        .collect();
    shared.sort_by(|(ta, ca), (tb, cb)| cb.cmp(ca).then_with(|| ta.cmp(tb)));
    shared
        .into_iter()
        .take(MAX_SHARED_TERMS)
        .map(|(term, _)| term.clone())
        .collect()
}
