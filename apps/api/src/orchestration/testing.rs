//! In-memory fakes shared by the orchestration tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::analysis::{AnalysisRunRow, RunSummary, StoredResult};
use crate::models::subject::{
    EducationItem, EducationLevel, ExperienceItem, JobRecord, ResumeRecord,
};
use crate::orchestration::aggregate::CompositeResult;
use crate::orchestration::evidence::{
    CertificationEvidence, EducationEvidence, Evidence, ExperienceEvidence, SemanticEvidence,
    SkillEvidence,
};
use crate::orchestration::isolation::{IsolationError, IsolationProvider, IsolationRequest};
use crate::orchestration::storage::{
    ensure_in_scope, JobRankingRow, ResultParams, Storage, StorageError,
};
use crate::orchestration::types::{
    AnalysisType, ConnectionDescriptor, ContextStatus, ExecutionContext, IsolationTier,
    SubjectRefs, TaskError,
};
use crate::orchestration::unit::{load_subjects, AnalysisUnit, BoundContext, RawAnalysis};

// ────────────────────────────────────────────────────────────────────────────
// Isolation provider
// ────────────────────────────────────────────────────────────────────────────

pub struct FakeIsolationProvider {
    zero_copy: bool,
    standard: bool,
    shared: bool,
    provision_delay: Option<Duration>,
    reclaim_failing: AtomicBool,
    reclaimed: Mutex<Vec<ConnectionDescriptor>>,
}

impl Default for FakeIsolationProvider {
    fn default() -> Self {
        Self {
            zero_copy: true,
            standard: true,
            shared: true,
            provision_delay: None,
            reclaim_failing: AtomicBool::new(false),
            reclaimed: Mutex::new(Vec::new()),
        }
    }
}

impl FakeIsolationProvider {
    /// Every tier fails and the store does not answer pings.
    pub fn unavailable() -> Self {
        Self {
            zero_copy: false,
            standard: false,
            shared: false,
            ..Self::default()
        }
    }

    pub fn without_zero_copy(mut self) -> Self {
        self.zero_copy = false;
        self
    }

    pub fn without_standard(mut self) -> Self {
        self.standard = false;
        self
    }

    pub fn with_provision_delay(mut self, delay: Duration) -> Self {
        self.provision_delay = Some(delay);
        self
    }

    pub fn with_failing_reclaim(self) -> Self {
        self.set_reclaim_failing(true);
        self
    }

    pub fn set_reclaim_failing(&self, failing: bool) {
        self.reclaim_failing.store(failing, Ordering::SeqCst);
    }

    pub fn reclaimed(&self) -> Vec<ConnectionDescriptor> {
        self.reclaimed.lock().clone()
    }

    async fn provision(
        &self,
        tier: IsolationTier,
        enabled: bool,
        request: &IsolationRequest,
    ) -> Result<ConnectionDescriptor, IsolationError> {
        if let Some(delay) = self.provision_delay {
            tokio::time::sleep(delay).await;
        }
        if !enabled {
            return Err(IsolationError::Unsupported(format!(
                "{} disabled in fake",
                tier.as_str()
            )));
        }
        Ok(ConnectionDescriptor {
            tier,
            handle: format!("mem_{}_{}", tier.as_str(), request.context_id.simple()),
            scope: request.subjects,
        })
    }
}

#[async_trait]
impl IsolationProvider for FakeIsolationProvider {
    async fn try_zero_copy_clone(
        &self,
        request: &IsolationRequest,
    ) -> Result<ConnectionDescriptor, IsolationError> {
        self.provision(IsolationTier::ZeroCopy, self.zero_copy, request)
            .await
    }

    async fn try_standard_clone(
        &self,
        request: &IsolationRequest,
    ) -> Result<ConnectionDescriptor, IsolationError> {
        self.provision(IsolationTier::Standard, self.standard, request)
            .await
    }

    async fn fallback_to_shared(
        &self,
        request: &IsolationRequest,
    ) -> Result<ConnectionDescriptor, IsolationError> {
        self.provision(IsolationTier::Shared, self.shared, request)
            .await
    }

    async fn reclaim(&self, descriptor: &ConnectionDescriptor) -> Result<(), IsolationError> {
        if self.reclaim_failing.load(Ordering::SeqCst) {
            return Err(IsolationError::Provision("reclaim refused".to_string()));
        }
        self.reclaimed.lock().push(descriptor.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), IsolationError> {
        if self.shared {
            Ok(())
        } else {
            Err(IsolationError::Provision("store unreachable".to_string()))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Storage
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub context_id: Uuid,
    pub run_id: Uuid,
    pub analysis_type: AnalysisType,
    pub score: f64,
    pub evidence: Evidence,
}

#[derive(Default)]
pub struct InMemoryStorage {
    resumes: HashMap<Uuid, ResumeRecord>,
    jobs: HashMap<Uuid, JobRecord>,
    failing_writes: bool,
    hanging_run_writes: bool,
    results: Mutex<Vec<StoredRecord>>,
    runs: Mutex<Vec<CompositeResult>>,
}

impl InMemoryStorage {
    pub fn with_subjects(resume: &ResumeRecord, job: &JobRecord) -> Self {
        Self::default().and_subjects(resume, job)
    }

    pub fn and_subjects(mut self, resume: &ResumeRecord, job: &JobRecord) -> Self {
        self.resumes.insert(resume.id, resume.clone());
        self.jobs.insert(job.id, job.clone());
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.failing_writes = true;
        self
    }

    /// `put_run` never resolves.
    pub fn hanging_run_writes(mut self) -> Self {
        self.hanging_run_writes = true;
        self
    }

    pub fn stored_results(&self) -> Vec<StoredRecord> {
        self.results.lock().clone()
    }

    pub fn stored_runs(&self) -> Vec<CompositeResult> {
        self.runs.lock().clone()
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.failing_writes {
            return Err(StorageError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_resume(
        &self,
        conn: &ConnectionDescriptor,
        resume_id: Uuid,
    ) -> Result<ResumeRecord, StorageError> {
        ensure_in_scope(conn, "resume", resume_id, conn.scope.resume_id)?;
        self.resumes
            .get(&resume_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("resume {resume_id}")))
    }

    async fn get_job(
        &self,
        conn: &ConnectionDescriptor,
        job_id: Uuid,
    ) -> Result<JobRecord, StorageError> {
        ensure_in_scope(conn, "job", job_id, conn.scope.job_id)?;
        self.jobs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("job {job_id}")))
    }

    async fn put_result(
        &self,
        _conn: &ConnectionDescriptor,
        params: ResultParams<'_>,
    ) -> Result<(), StorageError> {
        self.check_writable()?;
        self.results.lock().push(StoredRecord {
            context_id: params.context_id,
            run_id: params.run_id,
            analysis_type: params.analysis_type,
            score: params.score,
            evidence: params.evidence.clone(),
        });
        Ok(())
    }

    async fn put_run(&self, run: &CompositeResult) -> Result<(), StorageError> {
        if self.hanging_run_writes {
            std::future::pending::<()>().await;
        }
        self.check_writable()?;
        let mut runs = self.runs.lock();
        if !runs.iter().any(|r| r.run_id == run.run_id) {
            runs.push(run.clone());
        }
        Ok(())
    }

    async fn run_summary(&self, run_id: Uuid) -> Result<Option<RunSummary>, StorageError> {
        let Some(run) = self.runs.lock().iter().find(|r| r.run_id == run_id).cloned() else {
            return Ok(None);
        };
        let results = self
            .results
            .lock()
            .iter()
            .filter(|r| r.run_id == run_id)
            .map(|r| -> Result<StoredResult, StorageError> {
                Ok(StoredResult {
                    context_id: r.context_id,
                    analysis_type: r.analysis_type.as_str().to_string(),
                    score: r.score,
                    evidence: serde_json::to_value(&r.evidence)?,
                    timing_ms: 0,
                    created_at: Utc::now(),
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        Ok(Some(RunSummary {
            run: AnalysisRunRow {
                id: run.run_id,
                resume_id: run.subjects.resume_id,
                job_id: run.subjects.job_id,
                composite_score: run.composite_score,
                overall_status: run.overall_status.as_str().to_string(),
                weights_used: serde_json::to_value(&run.weights_used)?,
                created_at: Utc::now(),
            },
            results,
        }))
    }

    async fn job_rankings(&self, job_id: Uuid) -> Result<Vec<JobRankingRow>, StorageError> {
        let runs = self.runs.lock().clone();
        let results = self.results.lock().clone();

        let mut by_resume: BTreeMap<Uuid, JobRankingRow> = BTreeMap::new();
        for run in runs.iter().filter(|r| r.subjects.job_id == job_id) {
            let Some(composite) = run.composite_score else {
                continue;
            };
            let stored = results.iter().filter(|r| r.run_id == run.run_id).count() as i64;
            let row = by_resume
                .entry(run.subjects.resume_id)
                .or_insert(JobRankingRow {
                    resume_id: run.subjects.resume_id,
                    best_composite: None,
                    runs: 0,
                    stored_results: 0,
                });
            row.best_composite = Some(row.best_composite.map_or(composite, |b| b.max(composite)));
            row.runs += 1;
            row.stored_results += stored;
        }

        let mut rows: Vec<JobRankingRow> = by_resume.into_values().collect();
        rows.sort_by(|a, b| {
            let best = |row: &JobRankingRow| row.best_composite.unwrap_or(f64::MIN);
            best(b).total_cmp(&best(a))
        });
        Ok(rows)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Analyzer
// ────────────────────────────────────────────────────────────────────────────

/// Analyzer with a fixed score, an optional delay before loading, or a panic.
pub struct ScriptedAnalyzer {
    analysis_type: AnalysisType,
    score: f64,
    delay: Option<Duration>,
    panics: bool,
}

impl ScriptedAnalyzer {
    pub fn scoring(analysis_type: AnalysisType, score: f64) -> Self {
        Self {
            analysis_type,
            score,
            delay: None,
            panics: false,
        }
    }

    pub fn panicking(analysis_type: AnalysisType) -> Self {
        Self {
            panics: true,
            ..Self::scoring(analysis_type, 0.0)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl AnalysisUnit for ScriptedAnalyzer {
    fn analysis_type(&self) -> AnalysisType {
        self.analysis_type
    }

    async fn load_inputs(&self, ctx: &BoundContext) -> Result<(ResumeRecord, JobRecord), TaskError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        load_subjects(ctx).await
    }

    fn analyze(&self, _resume: &ResumeRecord, _job: &JobRecord) -> RawAnalysis {
        if self.panics {
            panic!("scripted {} analyzer panicked", self.analysis_type);
        }
        RawAnalysis {
            score: self.score,
            evidence: evidence_for(self.analysis_type, self.score),
        }
    }
}

/// Minimal evidence of the right variant that passes its own invariants.
pub fn evidence_for(analysis_type: AnalysisType, score: f64) -> Evidence {
    let ratio = if score.is_finite() {
        (score / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    };
    match analysis_type {
        AnalysisType::Skill => Evidence::Skill(SkillEvidence {
            matched_required: vec![],
            missing_required: vec![],
            matched_preferred: vec![],
            missing_preferred: vec![],
            required_coverage: ratio,
            preferred_coverage: ratio,
        }),
        AnalysisType::Experience => Evidence::Experience(ExperienceEvidence {
            candidate_years: 5.0,
            required_min_years: 3.0,
            required_max_years: None,
            shortfall_years: 0.0,
            excess_years: 0.0,
            positions_counted: 2,
        }),
        AnalysisType::Education => Evidence::Education(EducationEvidence {
            candidate_level: Some(EducationLevel::Bachelor),
            required_level: Some(EducationLevel::Bachelor),
            level_gap: 0,
            field_match: false,
            matched_field: None,
        }),
        AnalysisType::Certification => Evidence::Certification(CertificationEvidence {
            matched_required: vec![],
            missing_required: vec![],
            matched_preferred: vec![],
            missing_preferred: vec![],
        }),
        AnalysisType::Semantic => Evidence::Semantic(SemanticEvidence {
            cosine_similarity: ratio,
            shared_terms: vec![],
            resume_terms: 0,
            job_terms: 0,
        }),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid fixture date")
}

pub fn sample_resume() -> ResumeRecord {
    ResumeRecord {
        id: Uuid::new_v4(),
        candidate_name: "Jordan Lee".to_string(),
        raw_text: "Backend engineer with seven years building distributed systems in Rust \
                   and Go. Led the migration of payment services to Kafka and PostgreSQL."
            .to_string(),
        skills: vec![
            "Rust".to_string(),
            "Go".to_string(),
            "PostgreSQL".to_string(),
            "Kafka".to_string(),
            "Docker".to_string(),
        ],
        experience: vec![
            ExperienceItem {
                title: "Senior Backend Engineer".to_string(),
                company: "Ledgerline".to_string(),
                date_start: date(2020, 3, 1),
                date_end: None,
                description: "Payment services in Rust, event pipelines on Kafka".to_string(),
            },
            ExperienceItem {
                title: "Software Engineer".to_string(),
                company: "Parcelworks".to_string(),
                date_start: date(2017, 1, 1),
                date_end: Some(date(2020, 2, 28)),
                description: "Go microservices and PostgreSQL schema design".to_string(),
            },
        ],
        education: vec![EducationItem {
            institution: "Lakeshore University".to_string(),
            level: EducationLevel::Bachelor,
            field: "Computer Science".to_string(),
            graduated_on: Some(date(2016, 6, 1)),
        }],
        certifications: vec!["AWS Certified Solutions Architect".to_string()],
        as_of: date(2024, 6, 1),
    }
}

pub fn sample_job() -> JobRecord {
    JobRecord {
        id: Uuid::new_v4(),
        title: "Staff Backend Engineer".to_string(),
        description: "Design Rust services for our payments platform. Own Kafka event \
                      pipelines and PostgreSQL data models. Mentor engineers."
            .to_string(),
        required_skills: vec!["Rust".to_string(), "PostgreSQL".to_string(), "Kafka".to_string()],
        preferred_skills: vec!["Kubernetes".to_string(), "Terraform".to_string()],
        min_years_experience: 5.0,
        max_years_experience: Some(12.0),
        required_education: Some(EducationLevel::Bachelor),
        preferred_fields: vec!["Computer Science".to_string()],
        required_certifications: vec!["AWS Solutions Architect".to_string()],
        preferred_certifications: vec!["Certified Kubernetes Administrator".to_string()],
    }
}

/// An active zero-copy context scoped to the given subjects, outside any manager.
pub fn bound_context(
    analysis_type: AnalysisType,
    resume: &ResumeRecord,
    job: &JobRecord,
    storage: Arc<dyn Storage>,
) -> BoundContext {
    let id = Uuid::new_v4();
    let subjects = SubjectRefs {
        resume_id: resume.id,
        job_id: job.id,
    };
    BoundContext::new(
        ExecutionContext {
            id,
            run_id: Uuid::new_v4(),
            analysis_type,
            subjects,
            status: ContextStatus::Active,
            created_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            connection: ConnectionDescriptor {
                tier: IsolationTier::ZeroCopy,
                handle: format!("mem_zero_copy_{}", id.simple()),
                scope: subjects,
            },
            resources_released: false,
        },
        storage,
    )
}
