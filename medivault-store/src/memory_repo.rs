//! Process-local prescription store.
//!
//! Each save works on a staged copy of the tables and swaps it in only when every step
//! succeeded, which gives the same all-or-nothing behaviour as the Postgres transaction.
//! Failures can be injected to exercise rollback paths.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use medivault_core::{
    CoreError, CoreResult, MedicationLine, PrescriptionHeader, PrescriptionStore,
    StoredPrescription,
};
use serde_json::Value;

/// Where an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// Every call fails as if the database were unreachable.
    Connect,
    /// The link insert for the line at this index fails mid-transaction.
    LinkInsert(usize),
    BundleUpdate,
}

#[derive(Debug, Clone)]
struct LinkRow {
    prescription_id: i64,
    medicine_id: i64,
    line: MedicationLine,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    prescriptions: Vec<StoredPrescription>,
    medicines: Vec<(i64, String)>,
    links: Vec<LinkRow>,
    next_prescription_id: i64,
    next_medicine_id: i64,
}

impl Tables {
    fn upsert_medicine(&mut self, name: &str) -> i64 {
        if let Some((id, _)) = self.medicines.iter().find(|(_, n)| n == name) {
            return *id;
        }
        self.next_medicine_id += 1;
        self.medicines.push((self.next_medicine_id, name.to_string()));
        self.next_medicine_id
    }
}

#[derive(Default)]
pub struct MemoryPrescriptionStore {
    tables: Mutex<Tables>,
    failure: Mutex<Option<FailurePoint>>,
}

impl MemoryPrescriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject_failure(&self, point: FailurePoint) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(point);
        }
    }

    pub fn clear_failure(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }

    pub fn prescription_count(&self) -> usize {
        self.tables.lock().map(|t| t.prescriptions.len()).unwrap_or(0)
    }

    pub fn medicine_count(&self) -> usize {
        self.tables.lock().map(|t| t.medicines.len()).unwrap_or(0)
    }

    pub fn link_count(&self) -> usize {
        self.tables.lock().map(|t| t.links.len()).unwrap_or(0)
    }

    pub fn link_count_for(&self, prescription_id: i64) -> usize {
        self.tables
            .lock()
            .map(|t| {
                t.links
                    .iter()
                    .filter(|l| l.prescription_id == prescription_id)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn medicine_id(&self, name: &str) -> Option<i64> {
        self.tables
            .lock()
            .ok()?
            .medicines
            .iter()
            .find(|(_, n)| n == name)
            .map(|(id, _)| *id)
    }

    fn failure(&self) -> Option<FailurePoint> {
        self.failure.lock().ok().and_then(|f| *f)
    }

    fn connect(&self) -> CoreResult<MutexGuard<'_, Tables>> {
        if self.failure() == Some(FailurePoint::Connect) {
            return Err(CoreError::StorageUnavailable(
                "connection refused".to_string(),
            ));
        }
        self.tables
            .lock()
            .map_err(|_| CoreError::StorageUnavailable("store lock poisoned".to_string()))
    }
}

#[async_trait]
impl PrescriptionStore for MemoryPrescriptionStore {
    async fn save(
        &self,
        header: &PrescriptionHeader,
        lines: &[MedicationLine],
    ) -> CoreResult<i64> {
        let failure = self.failure();
        let mut tables = self.connect()?;
        let mut staged = tables.clone();

        staged.next_prescription_id += 1;
        let prescription_id = staged.next_prescription_id;
        staged.prescriptions.push(StoredPrescription {
            id: prescription_id,
            header: header.clone(),
            lines: lines.to_vec(),
            bundle: None,
            created_at: Utc::now(),
        });

        for (index, line) in lines.iter().enumerate() {
            let medicine_id = staged.upsert_medicine(&line.name);
            if failure == Some(FailurePoint::LinkInsert(index)) {
                return Err(CoreError::StorageUnavailable(format!(
                    "insert into prescription_medicines failed at line {}",
                    index
                )));
            }
            staged.links.push(LinkRow {
                prescription_id,
                medicine_id,
                line: line.clone(),
            });
        }

        *tables = staged;
        Ok(prescription_id)
    }

    async fn update_bundle(&self, prescription_id: i64, bundle: &Value) -> CoreResult<()> {
        if self.failure() == Some(FailurePoint::BundleUpdate) {
            return Err(CoreError::StorageUnavailable(
                "update of prescriptions.fhir_json failed".to_string(),
            ));
        }
        let mut tables = self.connect()?;
        let prescription = tables
            .prescriptions
            .iter_mut()
            .find(|p| p.id == prescription_id && p.bundle.is_none())
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "prescription {} has no pending bundle",
                    prescription_id
                ))
            })?;
        prescription.bundle = Some(bundle.clone());
        Ok(())
    }

    async fn get_prescription(
        &self,
        prescription_id: i64,
    ) -> CoreResult<Option<StoredPrescription>> {
        let tables = self.connect()?;
        let Some(found) = tables.prescriptions.iter().find(|p| p.id == prescription_id) else {
            return Ok(None);
        };

        let mut prescription = found.clone();
        prescription.lines = tables
            .links
            .iter()
            .filter(|l| l.prescription_id == prescription_id)
            .map(|l| {
                let mut line = l.line.clone();
                if let Some((_, name)) = tables.medicines.iter().find(|(id, _)| *id == l.medicine_id) {
                    line.name = name.clone();
                }
                line
            })
            .collect();
        Ok(Some(prescription))
    }

    async fn ping(&self) -> CoreResult<()> {
        self.connect().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn header() -> PrescriptionHeader {
        PrescriptionHeader::ai_sourced(
            1,
            1,
            "s3://bucket/rx-1.png",
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
    }

    fn lines(names: &[&str]) -> Vec<MedicationLine> {
        names.iter().map(|n| MedicationLine::new(*n)).collect()
    }

    #[tokio::test]
    async fn test_save_writes_one_header_and_n_links() {
        let store = MemoryPrescriptionStore::new();
        let id = store
            .save(&header(), &lines(&["Warfarin", "Aspirin", "Warfarin"]))
            .await
            .unwrap();

        assert_eq!(store.prescription_count(), 1);
        assert_eq!(store.link_count_for(id), 3);
        assert_eq!(store.medicine_count(), 2);
    }

    #[tokio::test]
    async fn test_catalog_upsert_is_idempotent_across_saves() {
        let store = MemoryPrescriptionStore::new();
        store.save(&header(), &lines(&["Aspirin"])).await.unwrap();
        let first_id = store.medicine_id("Aspirin");
        store.save(&header(), &lines(&["Aspirin", "aspirin"])).await.unwrap();

        assert_eq!(store.medicine_id("Aspirin"), first_id);
        // Case-sensitive: "aspirin" is a distinct catalog entry.
        assert_eq!(store.medicine_count(), 2);
        assert_eq!(store.link_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_link_insert_rolls_back_everything() {
        let store = MemoryPrescriptionStore::new();
        store.inject_failure(FailurePoint::LinkInsert(1));

        let result = store.save(&header(), &lines(&["Warfarin", "Ibuprofen"])).await;

        assert!(matches!(result, Err(CoreError::StorageUnavailable(_))));
        assert_eq!(store.prescription_count(), 0);
        assert_eq!(store.medicine_count(), 0);
        assert_eq!(store.link_count(), 0);
    }

    #[tokio::test]
    async fn test_bundle_is_written_once() {
        let store = MemoryPrescriptionStore::new();
        let id = store.save(&header(), &lines(&["Aspirin"])).await.unwrap();

        store.update_bundle(id, &serde_json::json!({"resourceType": "Bundle"})).await.unwrap();
        let again = store.update_bundle(id, &serde_json::json!({})).await;
        assert!(matches!(again, Err(CoreError::NotFound(_))));

        let stored = store.get_prescription(id).await.unwrap().unwrap();
        assert_eq!(stored.bundle.unwrap()["resourceType"], "Bundle");
        assert_eq!(stored.lines, lines(&["Aspirin"]));
    }

    #[tokio::test]
    async fn test_unreachable_store() {
        let store = MemoryPrescriptionStore::new();
        store.inject_failure(FailurePoint::Connect);
        assert!(store.ping().await.is_err());
        assert!(store.save(&header(), &lines(&["Aspirin"])).await.is_err());
        store.clear_failure();
        assert!(store.ping().await.is_ok());
    }
}
