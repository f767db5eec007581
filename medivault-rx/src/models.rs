use std::fmt;

use medivault_core::CoreError;
use medivault_interactions::{InteractionFinding, SkippedPair};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a save call, as confirmed by the patient after review.
///
/// Every field is optional at the wire level so that a missing field surfaces as a
/// validation error naming it, not as a generic decode failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SavePrescriptionRequest {
    pub patient_id: Option<i64>,
    #[serde(rename = "doctor_id", alias = "prescriber_id")]
    pub prescriber_id: Option<i64>,
    #[serde(rename = "s3_image_url", alias = "source_image_ref")]
    pub source_image_ref: Option<String>,
    pub entities: Option<EntitiesInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EntitiesInput {
    #[serde(default)]
    pub medications: Vec<MedicationInput>,
    #[serde(default)]
    pub conditions: Vec<Value>,
    #[serde(default)]
    pub allergies: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MedicationInput {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub route: Option<String>,
    pub notes: Option<String>,
}

impl MedicationInput {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn with_dosing(mut self, dosage: &str, frequency: &str, duration: &str) -> Self {
        self.dosage = Some(dosage.to_string());
        self.frequency = Some(frequency.to_string());
        self.duration = Some(duration.to_string());
        self
    }
}

/// A non-fatal enrichment problem. The save itself still succeeded.
#[derive(Debug)]
pub enum EnrichmentWarning {
    InteractionSkipped(SkippedPair),
    BundleBuildFailed(CoreError),
    BundleWriteBackFailed(CoreError),
}

impl fmt::Display for EnrichmentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentWarning::InteractionSkipped(pair) => write!(f, "{}", pair),
            EnrichmentWarning::BundleBuildFailed(e) => write!(f, "FHIR generation failed: {}", e),
            EnrichmentWarning::BundleWriteBackFailed(e) => {
                write!(f, "Failed to save FHIR bundle: {}", e)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub prescription_id: i64,
    pub medicines_saved: usize,
    pub interactions: Vec<InteractionFinding>,
    pub bundle_saved: bool,
    pub warnings: Vec<String>,
    pub pairs_evaluated: usize,
    pub pairs_skipped: usize,
}
