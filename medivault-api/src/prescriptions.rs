use axum::{extract::rejection::JsonRejection, extract::State, Json};
use medivault_core::CoreError;
use medivault_interactions::InteractionFinding;
use medivault_rx::{SaveOutcome, SavePrescriptionRequest};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SavePrescriptionResponse {
    pub ok: bool,
    pub prescription_id: i64,
    pub medicines_saved: usize,
    pub interactions: Vec<InteractionFinding>,
    pub fhir_bundle_saved: bool,
    pub warnings: Vec<String>,
}

impl From<SaveOutcome> for SavePrescriptionResponse {
    fn from(outcome: SaveOutcome) -> Self {
        Self {
            ok: true,
            prescription_id: outcome.prescription_id,
            medicines_saved: outcome.medicines_saved,
            interactions: outcome.interactions,
            fhir_bundle_saved: outcome.bundle_saved,
            warnings: outcome.warnings,
        }
    }
}

fn rejection_reason(err: &CoreError) -> &'static str {
    match err {
        CoreError::ValidationFailed(_) => "validation",
        CoreError::StorageUnavailable(_) => "storage",
        _ => "other",
    }
}

/// POST /ai/save-prescription
/// Persist a patient-confirmed prescription, then check interactions and attach a FHIR bundle
pub async fn save_prescription(
    State(state): State<AppState>,
    payload: Result<Json<SavePrescriptionRequest>, JsonRejection>,
) -> Result<Json<SavePrescriptionResponse>, AppError> {
    let Json(request) = payload.inspect_err(|_| state.metrics.record_rejection("validation"))?;

    match state.orchestrator.save_prescription(request).await {
        Ok(outcome) => {
            state
                .metrics
                .record_saved(outcome.warnings.len(), outcome.pairs_evaluated);
            Ok(Json(outcome.into()))
        }
        Err(e) => {
            state.metrics.record_rejection(rejection_reason(&e));
            Err(AppError::from_core(e))
        }
    }
}
