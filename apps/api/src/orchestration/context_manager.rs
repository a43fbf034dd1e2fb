//! Execution Context Manager: owns the registry of isolated execution contexts.
//!
//! Contexts are handed out as [`ContextLease`]s. A lease that is dropped without
//! being released (panicked task, abandoned acquisition) releases its context as
//! `Failed`, so every context reaches a terminal state and gets reclaimed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::orchestration::isolation::{IsolationProvider, IsolationRequest};
use crate::orchestration::types::{
    AnalysisType, ConnectionDescriptor, ContextStatus, ExecutionContext, SubjectRefs, TaskError,
};

/// How long `health_check` waits for the registry lock before reporting degraded.
const HEALTH_LOCK_TIMEOUT: Duration = Duration::from_millis(50);
/// Upper bound on the provider reachability probe.
const HEALTH_PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOutcome {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextHealth {
    pub pending_count: usize,
    pub active_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub unreclaimed_count: usize,
    pub store_reachable: bool,
    /// True when any part of the snapshot could not be taken.
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub removed: usize,
    pub reclaimed: usize,
}

#[derive(Default)]
struct Registry {
    contexts: HashMap<Uuid, ExecutionContext>,
    /// (run, analysis type) pairs that hold or are provisioning a context.
    task_keys: HashSet<(Uuid, AnalysisType)>,
}

pub struct ContextManager {
    provider: Arc<dyn IsolationProvider>,
    registry: RwLock<Registry>,
}

impl ContextManager {
    pub fn new(provider: Arc<dyn IsolationProvider>) -> Self {
        Self {
            provider,
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Allocates an isolated context for one analysis task.
    ///
    /// Provisioning runs on its own task: if the caller stops waiting (timeout),
    /// the context is still registered and immediately released as `Failed`
    /// instead of leaking its isolated store.
    pub async fn acquire(
        self: &Arc<Self>,
        run_id: Uuid,
        analysis_type: AnalysisType,
        subjects: SubjectRefs,
    ) -> Result<ContextLease, TaskError> {
        {
            let mut registry = self.registry.write();
            if !registry.task_keys.insert((run_id, analysis_type)) {
                return Err(TaskError::ContextAcquisitionFailure {
                    attempts: vec![format!(
                        "a {analysis_type} context already exists for run {run_id}"
                    )],
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let provisioned = manager.provision(run_id, analysis_type, subjects).await;
            if let Err(Ok(orphan)) = tx.send(provisioned) {
                warn!(
                    context_id = %orphan.id,
                    analysis_type = %orphan.analysis_type,
                    "Context acquired after its task gave up; releasing"
                );
                manager.release(orphan.id, ContextOutcome::Failed);
            }
        });

        let context = rx.await.map_err(|_| TaskError::ContextAcquisitionFailure {
            attempts: vec!["provisioning task aborted".to_string()],
        })??;

        Ok(ContextLease {
            manager: Arc::clone(self),
            context,
            released: false,
        })
    }

    async fn provision(
        &self,
        run_id: Uuid,
        analysis_type: AnalysisType,
        subjects: SubjectRefs,
    ) -> Result<ExecutionContext, TaskError> {
        let request = IsolationRequest {
            context_id: Uuid::new_v4(),
            subjects,
        };

        let connection = match self.try_tiers(&request).await {
            Ok(connection) => connection,
            Err(attempts) => {
                self.registry
                    .write()
                    .task_keys
                    .remove(&(run_id, analysis_type));
                warn!(
                    context_id = %request.context_id,
                    analysis_type = %analysis_type,
                    status = "failed",
                    duration_ms = 0,
                    "All isolation tiers failed: {}",
                    attempts.join("; ")
                );
                return Err(TaskError::ContextAcquisitionFailure { attempts });
            }
        };

        let context = ExecutionContext {
            id: request.context_id,
            run_id,
            analysis_type,
            subjects,
            status: ContextStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            connection,
            resources_released: false,
        };

        emit_transition(&context);
        self.registry
            .write()
            .contexts
            .insert(context.id, context.clone());
        Ok(context)
    }

    /// Zero-copy, then standard, then shared. Returns every failure message if none works.
    async fn try_tiers(
        &self,
        request: &IsolationRequest,
    ) -> Result<ConnectionDescriptor, Vec<String>> {
        let mut attempts = Vec::new();

        match self.provider.try_zero_copy_clone(request).await {
            Ok(connection) => return Ok(connection),
            Err(e) => {
                debug!(context_id = %request.context_id, "Zero-copy isolation unavailable: {e}");
                attempts.push(format!("zero_copy: {e}"));
            }
        }

        match self.provider.try_standard_clone(request).await {
            Ok(connection) => return Ok(connection),
            Err(e) => {
                debug!(context_id = %request.context_id, "Standard isolation unavailable: {e}");
                attempts.push(format!("standard: {e}"));
            }
        }

        match self.provider.fallback_to_shared(request).await {
            Ok(connection) => Ok(connection),
            Err(e) => {
                attempts.push(format!("shared: {e}"));
                Err(attempts)
            }
        }
    }

    /// Pending → Active. Returns false if the transition is not allowed.
    pub fn activate(&self, context_id: Uuid) -> bool {
        let mut registry = self.registry.write();
        let Some(context) = registry.contexts.get_mut(&context_id) else {
            return false;
        };
        if !context.status.can_transition_to(ContextStatus::Active) {
            debug!(
                context_id = %context_id,
                status = context.status.as_str(),
                "Ignoring activation of context"
            );
            return false;
        }
        context.status = ContextStatus::Active;
        emit_transition(context);
        true
    }

    /// Marks a context terminal and schedules reclamation of its store.
    /// Releasing an already-terminal or unknown context is a no-op returning false.
    pub fn release(self: &Arc<Self>, context_id: Uuid, outcome: ContextOutcome) -> bool {
        let connection = {
            let mut registry = self.registry.write();
            let Some(context) = registry.contexts.get_mut(&context_id) else {
                debug!(context_id = %context_id, "Release of unknown context ignored");
                return false;
            };
            if context.status.is_terminal() {
                debug!(
                    context_id = %context_id,
                    status = context.status.as_str(),
                    "Context already released"
                );
                return false;
            }

            let requested = match outcome {
                ContextOutcome::Completed => ContextStatus::Completed,
                ContextOutcome::Failed => ContextStatus::Failed,
            };
            // A context that never activated cannot complete.
            let next = if context.status.can_transition_to(requested) {
                requested
            } else {
                ContextStatus::Failed
            };

            let now = Utc::now();
            context.status = next;
            context.completed_at = Some(now);
            context.duration_ms = Some((now - context.created_at).num_milliseconds());
            emit_transition(context);
            context.connection.clone()
        };

        self.schedule_reclaim(context_id, connection);
        true
    }

    fn schedule_reclaim(self: &Arc<Self>, context_id: Uuid, connection: ConnectionDescriptor) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let manager = Arc::clone(self);
                handle.spawn(async move { manager.reclaim(context_id, &connection).await });
            }
            Err(_) => warn!(
                context_id = %context_id,
                "No runtime to reclaim on; leaving it to the sweep"
            ),
        }
    }

    async fn reclaim(&self, context_id: Uuid, connection: &ConnectionDescriptor) -> bool {
        match self.provider.reclaim(connection).await {
            Ok(()) => {
                if let Some(context) = self.registry.write().contexts.get_mut(&context_id) {
                    context.resources_released = true;
                }
                debug!(context_id = %context_id, tier = connection.tier.as_str(), "Reclaimed context store");
                true
            }
            Err(e) => {
                warn!(context_id = %context_id, "Failed to reclaim context store: {e}");
                false
            }
        }
    }

    /// Discards terminal contexts that completed more than `retention` ago.
    pub async fn sweep(&self, retention: chrono::Duration) -> SweepReport {
        self.sweep_before(Utc::now() - retention).await
    }

    pub async fn sweep_before(&self, cutoff: DateTime<Utc>) -> SweepReport {
        let expired: Vec<ExecutionContext> = {
            let mut registry = self.registry.write();
            let ids: Vec<Uuid> = registry
                .contexts
                .values()
                .filter(|c| c.status.is_terminal())
                .filter(|c| c.completed_at.is_some_and(|at| at < cutoff))
                .map(|c| c.id)
                .collect();

            ids.into_iter()
                .filter_map(|id| {
                    let context = registry.contexts.remove(&id)?;
                    registry
                        .task_keys
                        .remove(&(context.run_id, context.analysis_type));
                    Some(context)
                })
                .collect()
        };

        let mut report = SweepReport {
            removed: expired.len(),
            reclaimed: 0,
        };

        // Reclamation that failed or never ran at release time gets one more try here.
        for context in expired.iter().filter(|c| !c.resources_released) {
            match self.provider.reclaim(&context.connection).await {
                Ok(()) => report.reclaimed += 1,
                Err(e) => warn!(context_id = %context.id, "Sweep could not reclaim context store: {e}"),
            }
        }

        if report.removed > 0 {
            info!(
                removed = report.removed,
                reclaimed = report.reclaimed,
                "Swept expired execution contexts"
            );
        }
        report
    }

    /// Point-in-time counts. Never fails; a contended registry or unreachable
    /// store yields a degraded snapshot.
    pub async fn health_check(&self) -> ContextHealth {
        let mut health = match self.registry.try_read_for(HEALTH_LOCK_TIMEOUT) {
            Some(registry) => {
                let mut health = ContextHealth::default();
                for context in registry.contexts.values() {
                    match context.status {
                        ContextStatus::Pending => health.pending_count += 1,
                        ContextStatus::Active => health.active_count += 1,
                        ContextStatus::Completed => health.completed_count += 1,
                        ContextStatus::Failed => health.failed_count += 1,
                    }
                    if context.status.is_terminal() && !context.resources_released {
                        health.unreclaimed_count += 1;
                    }
                }
                health
            }
            None => ContextHealth {
                degraded: true,
                ..ContextHealth::default()
            },
        };

        health.store_reachable = matches!(
            tokio::time::timeout(HEALTH_PING_TIMEOUT, self.provider.ping()).await,
            Ok(Ok(()))
        );
        if !health.store_reachable {
            health.degraded = true;
        }
        health
    }

    pub fn get(&self, context_id: Uuid) -> Option<ExecutionContext> {
        self.registry.read().contexts.get(&context_id).cloned()
    }

    #[cfg(test)]
    pub fn contexts_for_run(&self, run_id: Uuid) -> Vec<ExecutionContext> {
        self.registry
            .read()
            .contexts
            .values()
            .filter(|c| c.run_id == run_id)
            .cloned()
            .collect()
    }
}

/// One structured event per lifecycle transition.
fn emit_transition(context: &ExecutionContext) {
    let duration_ms = context.duration_ms.unwrap_or(0);
    if context.status == ContextStatus::Failed {
        warn!(
            context_id = %context.id,
            run_id = %context.run_id,
            analysis_type = %context.analysis_type,
            status = context.status.as_str(),
            tier = context.connection.tier.as_str(),
            duration_ms,
            "Execution context transition"
        );
    } else {
        info!(
            context_id = %context.id,
            run_id = %context.run_id,
            analysis_type = %context.analysis_type,
            status = context.status.as_str(),
            tier = context.connection.tier.as_str(),
            duration_ms,
            "Execution context transition"
        );
    }
}

/// Exclusive handle on one acquired context.
pub struct ContextLease {
    manager: Arc<ContextManager>,
    context: ExecutionContext,
    released: bool,
}

impl ContextLease {
    /// Snapshot taken at acquisition; the registry holds the live record.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn activate(&mut self) -> bool {
        let activated = self.manager.activate(self.context.id);
        if activated {
            self.context.status = ContextStatus::Active;
        }
        activated
    }

    pub fn release(mut self, outcome: ContextOutcome) -> bool {
        self.released = true;
        self.manager.release(self.context.id, outcome)
    }
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        if !self.released {
            warn!(context_id = %self.context.id, "Context lease dropped without release");
            self.manager.release(self.context.id, ContextOutcome::Failed);
        }
    }
}

/// Runs `sweep` every `interval`, independent of scoring requests.
pub fn spawn_sweeper(
    manager: Arc<ContextManager>,
    interval: Duration,
    retention: chrono::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            manager.sweep(retention).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::testing::FakeIsolationProvider;
    use crate::orchestration::types::IsolationTier;

    fn subjects() -> SubjectRefs {
        SubjectRefs {
            resume_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
        }
    }

    fn manager(provider: FakeIsolationProvider) -> (Arc<ContextManager>, Arc<FakeIsolationProvider>) {
        let provider = Arc::new(provider);
        (Arc::new(ContextManager::new(provider.clone())), provider)
    }

    async fn wait_for_reclaims(provider: &FakeIsolationProvider, count: usize) {
        for _ in 0..100 {
            if provider.reclaimed().len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {count} reclaims, saw {}", provider.reclaimed().len());
    }

    #[tokio::test]
    async fn test_acquire_prefers_zero_copy() {
        let (manager, _) = manager(FakeIsolationProvider::default());
        let lease = manager
            .acquire(Uuid::new_v4(), AnalysisType::Skill, subjects())
            .await
            .unwrap();
        assert_eq!(lease.context().connection.tier, IsolationTier::ZeroCopy);
        assert_eq!(lease.context().status, ContextStatus::Pending);
        lease.release(ContextOutcome::Failed);
    }

    #[tokio::test]
    async fn test_acquire_falls_back_through_tiers() {
        let (manager, _) = manager(FakeIsolationProvider::default().without_zero_copy());
        let lease = manager
            .acquire(Uuid::new_v4(), AnalysisType::Skill, subjects())
            .await
            .unwrap();
        assert_eq!(lease.context().connection.tier, IsolationTier::Standard);
        lease.release(ContextOutcome::Failed);

        let (manager, _) = manager_without_clones();
        let lease = manager
            .acquire(Uuid::new_v4(), AnalysisType::Skill, subjects())
            .await
            .unwrap();
        assert_eq!(lease.context().connection.tier, IsolationTier::Shared);
        lease.release(ContextOutcome::Failed);
    }

    fn manager_without_clones() -> (Arc<ContextManager>, Arc<FakeIsolationProvider>) {
        manager(
            FakeIsolationProvider::default()
                .without_zero_copy()
                .without_standard(),
        )
    }

    #[tokio::test]
    async fn test_all_tiers_failing_is_acquisition_failure() {
        let (manager, _) = manager(FakeIsolationProvider::unavailable());
        let run_id = Uuid::new_v4();
        let err = manager
            .acquire(run_id, AnalysisType::Education, subjects())
            .await
            .err()
            .unwrap();
        match err {
            TaskError::ContextAcquisitionFailure { attempts } => assert_eq!(attempts.len(), 3),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(manager.contexts_for_run(run_id).is_empty());
    }

    #[tokio::test]
    async fn test_one_context_per_run_and_type() {
        let (manager, _) = manager(FakeIsolationProvider::default());
        let run_id = Uuid::new_v4();
        let refs = subjects();
        let first = manager.acquire(run_id, AnalysisType::Skill, refs).await.unwrap();
        let second = manager.acquire(run_id, AnalysisType::Skill, refs).await;
        assert!(matches!(
            second,
            Err(TaskError::ContextAcquisitionFailure { .. })
        ));
        // A different type in the same run is fine.
        let other = manager
            .acquire(run_id, AnalysisType::Semantic, refs)
            .await
            .unwrap();
        first.release(ContextOutcome::Failed);
        other.release(ContextOutcome::Failed);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (manager, provider) = manager(FakeIsolationProvider::default());
        let mut lease = manager
            .acquire(Uuid::new_v4(), AnalysisType::Skill, subjects())
            .await
            .unwrap();
        let id = lease.context().id;
        assert!(lease.activate());
        assert!(lease.release(ContextOutcome::Completed));
        assert!(!manager.release(id, ContextOutcome::Failed));

        let context = manager.get(id).unwrap();
        assert_eq!(context.status, ContextStatus::Completed);
        assert!(context.completed_at.is_some());
        assert!(context.duration_ms.unwrap() >= 0);

        wait_for_reclaims(&provider, 1).await;
        assert_eq!(provider.reclaimed().len(), 1);
    }

    #[tokio::test]
    async fn test_status_never_moves_backwards() {
        let (manager, _) = manager(FakeIsolationProvider::default());
        let mut lease = manager
            .acquire(Uuid::new_v4(), AnalysisType::Skill, subjects())
            .await
            .unwrap();
        let id = lease.context().id;
        lease.activate();
        lease.release(ContextOutcome::Completed);
        assert!(!manager.activate(id));
        assert_eq!(manager.get(id).unwrap().status, ContextStatus::Completed);
    }

    #[tokio::test]
    async fn test_pending_context_cannot_complete() {
        let (manager, _) = manager(FakeIsolationProvider::default());
        let lease = manager
            .acquire(Uuid::new_v4(), AnalysisType::Skill, subjects())
            .await
            .unwrap();
        let id = lease.context().id;
        lease.release(ContextOutcome::Completed);
        assert_eq!(manager.get(id).unwrap().status, ContextStatus::Failed);
    }

    #[tokio::test]
    async fn test_dropped_lease_releases_as_failed() {
        let (manager, provider) = manager(FakeIsolationProvider::default());
        let id = {
            let mut lease = manager
                .acquire(Uuid::new_v4(), AnalysisType::Skill, subjects())
                .await
                .unwrap();
            lease.activate();
            lease.context().id
        };
        assert_eq!(manager.get(id).unwrap().status, ContextStatus::Failed);
        wait_for_reclaims(&provider, 1).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_acquisition_is_released() {
        let (manager, provider) = manager(
            FakeIsolationProvider::default().with_provision_delay(Duration::from_millis(100)),
        );
        let run_id = Uuid::new_v4();
        let attempt = tokio::time::timeout(
            Duration::from_millis(10),
            manager.acquire(run_id, AnalysisType::Semantic, subjects()),
        )
        .await;
        assert!(attempt.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let contexts = manager.contexts_for_run(run_id);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].status, ContextStatus::Failed);
        wait_for_reclaims(&provider, 1).await;
    }

    #[tokio::test]
    async fn test_sweep_only_discards_expired_terminal_contexts() {
        let (manager, _) = manager(FakeIsolationProvider::default());
        let run_id = Uuid::new_v4();
        let refs = subjects();

        let mut done = manager.acquire(run_id, AnalysisType::Skill, refs).await.unwrap();
        done.activate();
        let done_id = done.context().id;
        done.release(ContextOutcome::Completed);

        let mut active = manager
            .acquire(run_id, AnalysisType::Semantic, refs)
            .await
            .unwrap();
        active.activate();
        let active_id = active.context().id;

        // Nothing has aged past a 24h window yet.
        assert_eq!(manager.sweep(chrono::Duration::hours(24)).await.removed, 0);

        let report = manager
            .sweep_before(Utc::now() + chrono::Duration::seconds(1))
            .await;
        assert_eq!(report.removed, 1);
        assert!(manager.get(done_id).is_none());
        assert_eq!(manager.get(active_id).unwrap().status, ContextStatus::Active);

        active.release(ContextOutcome::Completed);
    }

    #[tokio::test]
    async fn test_sweep_reclaims_what_release_could_not() {
        let (manager, provider) = manager(FakeIsolationProvider::default().with_failing_reclaim());
        let lease = manager
            .acquire(Uuid::new_v4(), AnalysisType::Skill, subjects())
            .await
            .unwrap();
        lease.release(ContextOutcome::Failed);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        provider.set_reclaim_failing(false);
        let report = manager
            .sweep_before(Utc::now() + chrono::Duration::seconds(1))
            .await;
        assert_eq!(report.removed, 1);
        assert_eq!(report.reclaimed, 1);
    }

    #[tokio::test]
    async fn test_health_check_counts_by_status() {
        let (manager, _) = manager(FakeIsolationProvider::default());
        let run_id = Uuid::new_v4();
        let refs = subjects();

        let mut completed = manager.acquire(run_id, AnalysisType::Skill, refs).await.unwrap();
        completed.activate();
        completed.release(ContextOutcome::Completed);

        let failed = manager
            .acquire(run_id, AnalysisType::Education, refs)
            .await
            .unwrap();
        failed.release(ContextOutcome::Failed);

        let mut active = manager
            .acquire(run_id, AnalysisType::Semantic, refs)
            .await
            .unwrap();
        active.activate();

        let health = manager.health_check().await;
        assert_eq!(health.active_count, 1);
        assert_eq!(health.completed_count, 1);
        assert_eq!(health.failed_count, 1);
        assert!(health.store_reachable);
        assert!(!health.degraded);

        active.release(ContextOutcome::Completed);
    }

    #[tokio::test]
    async fn test_health_check_degrades_when_registry_contended() {
        let (manager, _) = manager(FakeIsolationProvider::default());
        let lease = manager
            .acquire(Uuid::new_v4(), AnalysisType::Skill, subjects())
            .await
            .unwrap();

        let health = {
            let _writer = manager.registry.write();
            manager.health_check().await
        };
        assert!(health.degraded);
        assert!(health.store_reachable);
        assert_eq!(health.pending_count, 0);

        // Once the lock is free the counts come back.
        let health = manager.health_check().await;
        assert!(!health.degraded);
        assert_eq!(health.pending_count, 1);
        lease.release(ContextOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_on_its_interval() {
        let (manager, _) = manager(FakeIsolationProvider::default());
        let interval = Duration::from_secs(60);
        let sweeper = spawn_sweeper(Arc::clone(&manager), interval, chrono::Duration::zero());
        // The first tick fires immediately on an empty registry.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let lease = manager
            .acquire(Uuid::new_v4(), AnalysisType::Skill, subjects())
            .await
            .unwrap();
        let id = lease.context().id;
        lease.release(ContextOutcome::Failed);
        // Retention is measured on the wall clock, which paused time does not move.
        std::thread::sleep(Duration::from_millis(5));

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(manager.get(id).is_some());

        tokio::time::sleep(interval + Duration::from_millis(1)).await;
        for _ in 0..100 {
            if manager.get(id).is_none() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(manager.get(id).is_none());
        sweeper.abort();
    }

    #[tokio::test]
    async fn test_health_check_degrades_when_store_unreachable() {
        let (manager, _) = manager(FakeIsolationProvider::unavailable());
        let health = manager.health_check().await;
        assert!(!health.store_reachable);
        assert!(health.degraded);
        assert_eq!(health.active_count, 0);
    }
}
