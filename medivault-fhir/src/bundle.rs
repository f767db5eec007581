//! Interoperability bundle builder.
//!
//! Output is a FHIR-shaped `document` Bundle: one Composition header, then one
//! MedicationStatement, Condition or AllergyIntolerance per input entry. Resource ids are
//! UUIDv5 values derived from the builder seed, so the same input and issue time always
//! produce the same document.

use chrono::{DateTime, SecondsFormat, Utc};
use medivault_core::{CoreResult, MedicationLine};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::codes::{route_code, rxnorm_code, LOINC_SYSTEM, RXNORM_SYSTEM, SNOMED_SYSTEM};
use crate::entries::ClinicalEntry;

pub struct BundleInput<'a> {
    pub medications: &'a [MedicationLine],
    pub conditions: &'a [Value],
    pub allergies: &'a [Value],
    pub patient_ref: &'a str,
}

pub struct BundleBuilder {
    seed: String,
    issued_at: DateTime<Utc>,
}

impl BundleBuilder {
    /// `seed` scopes the generated resource ids, typically the prescription id.
    pub fn new(seed: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            seed: seed.into(),
            issued_at,
        }
    }

    pub fn build(&self, input: &BundleInput<'_>) -> CoreResult<Value> {
        let conditions = ClinicalEntry::parse_list(input.conditions, "conditions", &["condition"])?;
        let allergies = ClinicalEntry::parse_list(input.allergies, "allergies", &["allergen"])?;
        let patient = format!("Patient/{}", input.patient_ref);
        let timestamp = self.timestamp();

        let mut entries =
            Vec::with_capacity(1 + input.medications.len() + conditions.len() + allergies.len());
        entries.push(self.composition(&patient, &timestamp));
        for (i, med) in input.medications.iter().enumerate() {
            entries.push(self.medication_statement(i, med, &patient, &timestamp));
        }
        for (i, condition) in conditions.iter().enumerate() {
            entries.push(self.condition(i, condition, &patient, &timestamp));
        }
        for (i, allergy) in allergies.iter().enumerate() {
            entries.push(self.allergy_intolerance(i, allergy, &patient, &timestamp));
        }

        Ok(json!({
            "resourceType": "Bundle",
            "id": self.resource_id("bundle", 0),
            "type": "document",
            "timestamp": timestamp,
            "entry": entries,
        }))
    }

    fn timestamp(&self) -> String {
        self.issued_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn resource_id(&self, kind: &str, index: usize) -> String {
        let name = format!("medivault:{}:{}:{}:{}", self.seed, self.timestamp(), kind, index);
        Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
    }

    fn entry(id: String, resource: Value) -> Value {
        json!({
            "fullUrl": format!("urn:uuid:{}", id),
            "resource": resource,
        })
    }

    fn composition(&self, patient: &str, timestamp: &str) -> Value {
        let id = self.resource_id("composition", 0);
        Self::entry(
            id.clone(),
            json!({
                "resourceType": "Composition",
                "id": id,
                "status": "final",
                "type": {
                    "coding": [{
                        "system": LOINC_SYSTEM,
                        "code": "34108-1",
                        "display": "Outpatient Note"
                    }]
                },
                "date": timestamp,
                "author": [{ "reference": "Practitioner/auto" }],
                "title": "Medication and Condition Summary",
                "confidentiality": "N",
                "subject": { "reference": patient }
            }),
        )
    }

    fn medication_statement(
        &self,
        index: usize,
        med: &MedicationLine,
        patient: &str,
        timestamp: &str,
    ) -> Value {
        let id = self.resource_id("medication", index);

        let dosage_text = format!("{} {}", med.dosage.trim(), med.frequency.trim())
            .trim()
            .to_string();
        let dosage_text = if dosage_text.is_empty() {
            "As prescribed".to_string()
        } else {
            dosage_text
        };
        let mut dosage = json!({ "text": dosage_text });
        if let Some(route) = med.route.as_deref().filter(|r| !r.trim().is_empty()) {
            dosage["route"] = json!({
                "coding": [{
                    "system": SNOMED_SYSTEM,
                    "code": route_code(route),
                    "display": route
                }]
            });
        }

        let notes: Vec<Value> = med
            .notes
            .iter()
            .filter(|n| !n.trim().is_empty())
            .map(|n| json!({ "text": n }))
            .collect();

        Self::entry(
            id.clone(),
            json!({
                "resourceType": "MedicationStatement",
                "id": id,
                "status": "completed",
                "medicationCodeableConcept": {
                    "coding": [{ "system": RXNORM_SYSTEM, "display": med.name }],
                    "text": med.name
                },
                "subject": { "reference": patient },
                "dateAsserted": timestamp,
                "informationSource": { "reference": "Device/ocr-extractor" },
                "dosage": [dosage],
                "note": notes
            }),
        )
    }

    fn condition(&self, index: usize, condition: &ClinicalEntry, patient: &str, timestamp: &str) -> Value {
        let id = self.resource_id("condition", index);
        Self::entry(
            id.clone(),
            json!({
                "resourceType": "Condition",
                "id": id,
                "clinicalStatus": {
                    "coding": [{
                        "system": "http://terminology.hl7.org/CodeSystem/condition-clinical",
                        "code": "active"
                    }]
                },
                "code": {
                    "coding": [{ "system": SNOMED_SYSTEM, "display": condition.name }],
                    "text": condition.name
                },
                "subject": { "reference": patient },
                "recordedDate": timestamp
            }),
        )
    }

    fn allergy_intolerance(
        &self,
        index: usize,
        allergy: &ClinicalEntry,
        patient: &str,
        timestamp: &str,
    ) -> Value {
        let id = self.resource_id("allergy", index);
        Self::entry(
            id.clone(),
            json!({
                "resourceType": "AllergyIntolerance",
                "id": id,
                "clinicalStatus": {
                    "coding": [{
                        "system": "http://terminology.hl7.org/CodeSystem/allergyintolerance-clinical",
                        "code": "active"
                    }]
                },
                // Extracted from a scanned document, never clinically confirmed.
                "verificationStatus": {
                    "coding": [{
                        "system": "http://terminology.hl7.org/CodeSystem/allergyintolerance-verification",
                        "code": "unconfirmed"
                    }]
                },
                "code": {
                    "coding": [{
                        "system": RXNORM_SYSTEM,
                        "code": rxnorm_code(&allergy.name),
                        "display": allergy.name
                    }],
                    "text": allergy.name
                },
                "patient": { "reference": patient },
                "recordedDate": timestamp,
                "reaction": [{
                    "manifestation": [{
                        "coding": [{ "system": SNOMED_SYSTEM, "display": "Adverse reaction" }]
                    }]
                }]
            }),
        )
    }
}
