pub mod models;
pub mod orchestrator;
pub mod state;
pub mod validation;

pub use models::{EnrichmentWarning, EntitiesInput, MedicationInput, SaveOutcome, SavePrescriptionRequest};
pub use orchestrator::SaveOrchestrator;
pub use state::{SaveState, StateTracker};
pub use validation::{validate, ValidatedSave};
