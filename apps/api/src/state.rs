use std::sync::Arc;

use crate::activity_log::ActivityLog;
use crate::crm::{CrmApi, PersonaCache};
use crate::orchestrator::Orchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// The activity log and persona cache are the same instances the orchestrator
/// writes to, so `/logs` and `/api/personas` reflect background runs.
#[derive(Clone)]
pub struct AppState {
    pub crm: Arc<dyn CrmApi>,
    pub orchestrator: Orchestrator,
    pub personas: PersonaCache,
    pub log: ActivityLog,
}
