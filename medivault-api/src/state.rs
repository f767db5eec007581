use std::sync::Arc;

use medivault_core::{InteractionLookup, PrescriptionStore};
use medivault_rx::SaveOrchestrator;
use medivault_store::app_config::CorsConfig;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PrescriptionStore>,
    pub lookup: Arc<dyn InteractionLookup>,
    pub orchestrator: Arc<SaveOrchestrator>,
    pub metrics: Arc<Metrics>,
    pub cors: CorsConfig,
}

impl AppState {
    /// Wire the save orchestrator to the same store and lookup the other handlers use.
    pub fn new(
        store: Arc<dyn PrescriptionStore>,
        lookup: Arc<dyn InteractionLookup>,
        max_concurrent_lookups: usize,
        metrics: Arc<Metrics>,
        cors: CorsConfig,
    ) -> Self {
        let orchestrator = Arc::new(SaveOrchestrator::new(
            store.clone(),
            lookup.clone(),
            max_concurrent_lookups,
        ));
        Self {
            store,
            lookup,
            orchestrator,
            metrics,
            cors,
        }
    }
}
