use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Origin tag stamped on every prescription written by the extraction pipeline.
pub const AI_SOURCE: &str = "AI";

/// One medication line as persisted in the link table.
///
/// Dosing fields are free text. Absent values are stored as empty strings, never NULL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedicationLine {
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl MedicationLine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dosage: String::new(),
            frequency: String::new(),
            duration: String::new(),
            route: None,
            notes: None,
        }
    }

    pub fn with_dosing(
        mut self,
        dosage: impl Into<String>,
        frequency: impl Into<String>,
        duration: impl Into<String>,
    ) -> Self {
        self.dosage = dosage.into();
        self.frequency = frequency.into();
        self.duration = duration.into();
        self
    }
}

/// Header row written once per save.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrescriptionHeader {
    pub patient_id: i64,
    pub prescriber_id: i64,
    pub source: String,
    pub prescribed_date: NaiveDate,
    pub source_image_ref: String,
}

impl PrescriptionHeader {
    pub fn ai_sourced(
        patient_id: i64,
        prescriber_id: i64,
        source_image_ref: impl Into<String>,
        prescribed_date: NaiveDate,
    ) -> Self {
        Self {
            patient_id,
            prescriber_id,
            source: AI_SOURCE.to_string(),
            prescribed_date,
            source_image_ref: source_image_ref.into(),
        }
    }
}

/// A prescription as read back from storage, lines in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPrescription {
    pub id: i64,
    pub header: PrescriptionHeader,
    pub lines: Vec<MedicationLine>,
    /// `None` until the bundle write-back succeeds.
    pub bundle: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
