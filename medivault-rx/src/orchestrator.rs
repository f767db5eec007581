use std::sync::Arc;

use chrono::{DateTime, Utc};
use medivault_core::{CoreResult, InteractionLookup, PrescriptionHeader, PrescriptionStore};
use medivault_fhir::{BundleBuilder, BundleInput};
use medivault_interactions::check_all;
use tracing::{debug, error, info, warn};

use crate::models::{EnrichmentWarning, SaveOutcome, SavePrescriptionRequest};
use crate::state::{SaveState, StateTracker};
use crate::validation::{validate, ValidatedSave};

/// Sequences validation, the transactional write and the best-effort enrichment steps.
pub struct SaveOrchestrator {
    store: Arc<dyn PrescriptionStore>,
    lookup: Arc<dyn InteractionLookup>,
    max_concurrent_lookups: usize,
}

impl SaveOrchestrator {
    pub fn new(
        store: Arc<dyn PrescriptionStore>,
        lookup: Arc<dyn InteractionLookup>,
        max_concurrent_lookups: usize,
    ) -> Self {
        Self {
            store,
            lookup,
            max_concurrent_lookups,
        }
    }

    pub async fn save_prescription(&self, request: SavePrescriptionRequest) -> CoreResult<SaveOutcome> {
        self.save_at(request, Utc::now()).await
    }

    /// Run the workflow with an explicit clock; `now` supplies the prescribed date and the
    /// bundle timestamp.
    pub async fn save_at(
        &self,
        request: SavePrescriptionRequest,
        now: DateTime<Utc>,
    ) -> CoreResult<SaveOutcome> {
        let (outcome, _) = self.run(request, now).await;
        outcome
    }

    pub(crate) async fn run(
        &self,
        request: SavePrescriptionRequest,
        now: DateTime<Utc>,
    ) -> (CoreResult<SaveOutcome>, StateTracker) {
        let mut tracker = StateTracker::new();

        let validated = match validate(request) {
            Ok(validated) => validated,
            Err(e) => {
                warn!("Rejected prescription save: {}", e);
                tracker.advance(SaveState::Rejected);
                return (Err(e), tracker);
            }
        };

        tracker.advance(SaveState::Persisting);
        let header = PrescriptionHeader::ai_sourced(
            validated.patient_id,
            validated.prescriber_id,
            validated.source_image_ref.clone(),
            now.date_naive(),
        );
        let prescription_id = match self.store.save(&header, &validated.lines).await {
            Ok(id) => id,
            Err(e) => {
                error!("Prescription save failed: {}", e);
                return (Err(e), tracker);
            }
        };
        info!(
            "Saved prescription {} with {} medicines",
            prescription_id,
            validated.lines.len()
        );

        tracker.advance(SaveState::Enriching);
        let outcome = self.enrich(prescription_id, &validated, now).await;

        tracker.advance(SaveState::Done);
        (Ok(outcome), tracker)
    }

    async fn enrich(
        &self,
        prescription_id: i64,
        validated: &ValidatedSave,
        now: DateTime<Utc>,
    ) -> SaveOutcome {
        let mut warnings: Vec<EnrichmentWarning> = Vec::new();

        let names: Vec<String> = validated.lines.iter().map(|l| l.name.clone()).collect();
        let report = check_all(self.lookup.as_ref(), &names, self.max_concurrent_lookups).await;
        if !report.interactions.is_empty() {
            info!(
                "Found {} significant drug interactions for prescription {}",
                report.interactions.len(),
                prescription_id
            );
        }
        let pairs_evaluated = report.pairs_evaluated;
        let pairs_skipped = report.skipped_count();
        warnings.extend(report.skipped.into_iter().map(EnrichmentWarning::InteractionSkipped));

        let bundle_saved = match self.write_bundle(prescription_id, validated, now).await {
            Ok(()) => {
                debug!("FHIR bundle saved for prescription {}", prescription_id);
                true
            }
            Err(warning) => {
                warn!("{}", warning);
                warnings.push(warning);
                false
            }
        };

        SaveOutcome {
            prescription_id,
            medicines_saved: validated.lines.len(),
            interactions: report.interactions,
            bundle_saved,
            warnings: warnings.iter().map(ToString::to_string).collect(),
            pairs_evaluated,
            pairs_skipped,
        }
    }

    async fn write_bundle(
        &self,
        prescription_id: i64,
        validated: &ValidatedSave,
        now: DateTime<Utc>,
    ) -> Result<(), EnrichmentWarning> {
        let patient_ref = validated.patient_id.to_string();
        let bundle = BundleBuilder::new(prescription_id.to_string(), now)
            .build(&BundleInput {
                medications: &validated.lines,
                conditions: &validated.conditions,
                allergies: &validated.allergies,
                patient_ref: &patient_ref,
            })
            .map_err(EnrichmentWarning::BundleBuildFailed)?;

        self.store
            .update_bundle(prescription_id, &bundle)
            .await
            .map_err(EnrichmentWarning::BundleWriteBackFailed)
    }
}
