use async_trait::async_trait;
use serde_json::Value;

use crate::prescription::{MedicationLine, PrescriptionHeader, StoredPrescription};
use crate::CoreResult;

/// Repository trait for prescription persistence
#[async_trait]
pub trait PrescriptionStore: Send + Sync {
    /// Insert the header, upsert each catalog entry and insert one link row per line,
    /// all inside one transaction. Returns the generated prescription id.
    async fn save(
        &self,
        header: &PrescriptionHeader,
        lines: &[MedicationLine],
    ) -> CoreResult<i64>;

    /// Attach the interoperability bundle to an already committed prescription.
    async fn update_bundle(&self, prescription_id: i64, bundle: &Value) -> CoreResult<()>;

    async fn get_prescription(&self, prescription_id: i64)
        -> CoreResult<Option<StoredPrescription>>;

    /// Connectivity probe used by the health endpoint.
    async fn ping(&self) -> CoreResult<()>;
}
