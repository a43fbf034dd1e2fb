//! Certification analyzer: set matching of certification names.
//!
//! Names are compared as word sets with filler words removed, so
//! "Certified Kubernetes Administrator" and "kubernetes administrator
//! certification" are the same credential.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::analyzers::text::{round_to, word_set};
use crate::models::subject::{JobRecord, ResumeRecord};
use crate::orchestration::evidence::{CertificationEvidence, Evidence};
use crate::orchestration::types::AnalysisType;
use crate::orchestration::unit::{AnalysisUnit, RawAnalysis};

const FILLER_WORDS: &[&str] = &["certified", "certification", "certificate", "professional"];
const REQUIRED_WEIGHT: f64 = 0.75;
const PREFERRED_WEIGHT: f64 = 0.25;

pub struct CertificationAnalyzer;

#[async_trait]
impl AnalysisUnit for CertificationAnalyzer {
    fn analysis_type(&self) -> AnalysisType {
        AnalysisType::Certification
    }

    fn analyze(&self, resume: &ResumeRecord, job: &JobRecord) -> RawAnalysis {
        let held: Vec<BTreeSet<String>> = resume
            .certifications
            .iter()
            .map(|c| credential_key(c))
            .filter(|k| !k.is_empty())
            .collect();

        let (matched_required, missing_required) = split(&job.required_certifications, &held);
        let (matched_preferred, missing_preferred) = split(&job.preferred_certifications, &held);

        let score = 100.0
            * (REQUIRED_WEIGHT * ratio(matched_required.len(), job.required_certifications.len())
                + PREFERRED_WEIGHT
                    * ratio(matched_preferred.len(), job.preferred_certifications.len()));

        RawAnalysis {
            score: round_to(score, 1),
            evidence: Evidence::Certification(CertificationEvidence {
                matched_required,
                missing_required,
                matched_preferred,
                missing_preferred,
            }),
        }
    }
}

fn credential_key(name: &str) -> BTreeSet<String> {
    word_set(name)
        .into_iter()
        .filter(|w| !FILLER_WORDS.contains(&w.as_str()))
        .collect()
}

fn split(wanted: &[String], held: &[BTreeSet<String>]) -> (Vec<String>, Vec<String>) {
    wanted.iter().cloned().partition(|name| {
        let key = credential_key(name);
        !key.is_empty() && held.iter().any(|h| h == &key)
    })
}

fn ratio(matched: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        matched as f64 / total as f64
    }
}
