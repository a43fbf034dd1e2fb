use std::sync::Arc;

use crate::config::Config;
use crate::orchestration::context_manager::ContextManager;
use crate::orchestration::coordinator::Coordinator;
use crate::orchestration::storage::Storage;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub coordinator: Arc<Coordinator>,
    /// Same manager the coordinator acquires from; read here for health and lookups.
    pub contexts: Arc<ContextManager>,
    pub storage: Arc<dyn Storage>,
}
