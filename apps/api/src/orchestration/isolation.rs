//! Isolation provider: the three-tier clone/fork/share primitive behind
//! `ContextManager::acquire`.
//!
//! The Postgres provider isolates a context in its own schema:
//! - zero-copy: a schema of views over `public`, filtered to the run's subjects
//! - standard:  a schema holding copies of the subject rows
//! - shared:    no schema, reads go straight to `public`
//!
//! Analysis results always land in `public.analysis_results`, so reclaiming a
//! context schema never loses a stored result.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::orchestration::types::{ConnectionDescriptor, IsolationTier, SubjectRefs};

pub const SHARED_SCHEMA: &str = "public";

#[derive(Debug, Error)]
pub enum IsolationError {
    #[error("tier unsupported: {0}")]
    Unsupported(String),

    #[error("provisioning failed: {0}")]
    Provision(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What the provider needs to know to build one context's store.
#[derive(Debug, Clone, Copy)]
pub struct IsolationRequest {
    pub context_id: Uuid,
    pub subjects: SubjectRefs,
}

#[async_trait]
pub trait IsolationProvider: Send + Sync {
    async fn try_zero_copy_clone(
        &self,
        request: &IsolationRequest,
    ) -> Result<ConnectionDescriptor, IsolationError>;

    async fn try_standard_clone(
        &self,
        request: &IsolationRequest,
    ) -> Result<ConnectionDescriptor, IsolationError>;

    async fn fallback_to_shared(
        &self,
        request: &IsolationRequest,
    ) -> Result<ConnectionDescriptor, IsolationError>;

    /// Releases whatever the descriptor holds. Must tolerate being called for a
    /// descriptor that was already reclaimed.
    async fn reclaim(&self, descriptor: &ConnectionDescriptor) -> Result<(), IsolationError>;

    /// Cheap reachability probe for health reporting.
    async fn ping(&self) -> Result<(), IsolationError>;
}

/// Schema name for a context. Only hex digits follow the prefix, so it is safe
/// to interpolate into DDL.
pub fn context_schema_name(context_id: Uuid) -> String {
    format!("ctx_{}", context_id.simple())
}

/// Accepts `public` or a name produced by [`context_schema_name`].
pub fn is_safe_schema_name(name: &str) -> bool {
    if name == SHARED_SCHEMA {
        return true;
    }
    match name.strip_prefix("ctx_") {
        Some(hex) => hex.len() == 32 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL provider
// ────────────────────────────────────────────────────────────────────────────

pub struct PgIsolationProvider {
    pool: PgPool,
    /// Managed databases often forbid CREATE SCHEMA; with this off only the shared tier is used.
    schema_isolation: bool,
}

impl PgIsolationProvider {
    pub fn new(pool: PgPool, schema_isolation: bool) -> Self {
        Self {
            pool,
            schema_isolation,
        }
    }

    async fn provision_schema(
        &self,
        request: &IsolationRequest,
        tier: IsolationTier,
    ) -> Result<ConnectionDescriptor, IsolationError> {
        if !self.schema_isolation {
            return Err(IsolationError::Unsupported(
                "schema isolation disabled by configuration".to_string(),
            ));
        }

        let schema = context_schema_name(request.context_id);
        let resume_id = request.subjects.resume_id;
        let job_id = request.subjects.job_id;

        let (resumes_ddl, jobs_ddl) = match tier {
            IsolationTier::ZeroCopy => (
                format!(
                    r#"CREATE VIEW "{schema}".resumes AS SELECT * FROM public.resumes WHERE public.resumes.id = '{resume_id}'"#
                ),
                format!(
                    r#"CREATE VIEW "{schema}".jobs AS SELECT * FROM public.jobs WHERE public.jobs.id = '{job_id}'"#
                ),
            ),
            IsolationTier::Standard => (
                format!(
                    r#"CREATE TABLE "{schema}".resumes AS SELECT * FROM public.resumes WHERE public.resumes.id = '{resume_id}'"#
                ),
                format!(
                    r#"CREATE TABLE "{schema}".jobs AS SELECT * FROM public.jobs WHERE public.jobs.id = '{job_id}'"#
                ),
            ),
            IsolationTier::Shared => {
                return Err(IsolationError::Provision(
                    "shared tier does not provision a schema".to_string(),
                ))
            }
        };

        // DDL is transactional in Postgres: a failure part-way leaves nothing behind.
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(r#"CREATE SCHEMA "{schema}""#))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&resumes_ddl).execute(&mut *tx).await?;
        sqlx::query(&jobs_ddl).execute(&mut *tx).await?;
        tx.commit().await?;

        debug!(schema = %schema, tier = tier.as_str(), "Provisioned context schema");

        Ok(ConnectionDescriptor {
            tier,
            handle: schema,
            scope: request.subjects,
        })
    }
}

#[async_trait]
impl IsolationProvider for PgIsolationProvider {
    async fn try_zero_copy_clone(
        &self,
        request: &IsolationRequest,
    ) -> Result<ConnectionDescriptor, IsolationError> {
        self.provision_schema(request, IsolationTier::ZeroCopy).await
    }

    async fn try_standard_clone(
        &self,
        request: &IsolationRequest,
    ) -> Result<ConnectionDescriptor, IsolationError> {
        self.provision_schema(request, IsolationTier::Standard).await
    }

    async fn fallback_to_shared(
        &self,
        request: &IsolationRequest,
    ) -> Result<ConnectionDescriptor, IsolationError> {
        self.ping().await?;
        Ok(ConnectionDescriptor {
            tier: IsolationTier::Shared,
            handle: SHARED_SCHEMA.to_string(),
            scope: request.subjects,
        })
    }

    async fn reclaim(&self, descriptor: &ConnectionDescriptor) -> Result<(), IsolationError> {
        if descriptor.tier == IsolationTier::Shared {
            return Ok(());
        }
        if !is_safe_schema_name(&descriptor.handle) || descriptor.handle == SHARED_SCHEMA {
            return Err(IsolationError::Provision(format!(
                "refusing to drop schema '{}'",
                descriptor.handle
            )));
        }
        sqlx::query(&format!(
            r#"DROP SCHEMA IF EXISTS "{}" CASCADE"#,
            descriptor.handle
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), IsolationError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
