//! Emergency summary: a pure reshaping of vault entities into the card shown to responders.

use axum::{extract::rejection::JsonRejection, Json};
use medivault_fhir::ClinicalEntry;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::AppError;

const UNIDENTIFIED_PATIENT: &str = "patient-unidentified";
const UNKNOWN_ENTRY: &str = "Unknown";

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryEntities {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub medications: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub allergies: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub conditions: Vec<Value>,
}

/// Entities may be sent at the top level or nested under `vault_entities`.
/// A non-empty top-level list wins over the nested one.
#[derive(Debug, Deserialize)]
pub struct EmergencySummaryRequest {
    #[serde(default)]
    pub patient_id: Option<Value>,
    #[serde(flatten)]
    pub direct: SummaryEntities,
    #[serde(default)]
    pub vault_entities: Option<SummaryEntities>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct AllergyCard {
    pub allergen: String,
    pub severity: String,
    pub reaction: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MedicationCard {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub is_critical: bool,
}

#[derive(Debug, Serialize, Default)]
pub struct EmergencyBundle {
    pub allergies: Vec<AllergyCard>,
    pub current_meds: Vec<MedicationCard>,
    pub chronic_conditions: Vec<String>,
    pub key_risks: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EmergencySummaryResponse {
    pub ok: bool,
    pub emergency_bundle: EmergencyBundle,
    pub short_text: String,
}

fn prefer_direct(direct: Vec<Value>, nested: Vec<Value>) -> Vec<Value> {
    if direct.is_empty() {
        nested
    } else {
        direct
    }
}

/// Like [`ClinicalEntry::from_value`], but an object without any name is shown as
/// `Unknown` rather than rejected; the card is read-only.
fn summary_entry(value: &Value, field: &str, aliases: &[&str]) -> Result<ClinicalEntry, AppError> {
    if let Value::Object(map) = value {
        let named = std::iter::once("name")
            .chain(aliases.iter().copied())
            .filter_map(|key| map.get(key).and_then(Value::as_str))
            .any(|name| !name.trim().is_empty());
        if !named {
            return Ok(ClinicalEntry {
                name: UNKNOWN_ENTRY.to_string(),
                severity: map.get("severity").and_then(Value::as_str).map(str::to_string),
                reaction: map.get("reaction").and_then(Value::as_str).map(str::to_string),
            });
        }
    }
    ClinicalEntry::from_value(value, field, aliases).map_err(AppError::from_core)
}

fn summary_entries(
    values: &[Value],
    list: &str,
    aliases: &[&str],
) -> Result<Vec<ClinicalEntry>, AppError> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| summary_entry(v, &format!("{}[{}]", list, i), aliases))
        .collect()
}

fn text_field(map: &serde_json::Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn medication_card(index: usize, value: &Value) -> Result<MedicationCard, AppError> {
    match value {
        Value::String(name) => Ok(MedicationCard {
            name: name.trim().to_string(),
            dosage: String::new(),
            frequency: String::new(),
            is_critical: false,
        }),
        Value::Object(map) => Ok(MedicationCard {
            name: map
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            dosage: text_field(map, "dosage"),
            frequency: text_field(map, "frequency"),
            is_critical: map.get("is_critical").and_then(Value::as_bool).unwrap_or(false),
        }),
        _ => Err(AppError::ValidationError(format!(
            "medications[{}]: expected a string or an object",
            index
        ))),
    }
}

fn is_high_risk(severity: Option<&str>) -> bool {
    severity
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "high" | "severe"))
        .unwrap_or(false)
}

fn patient_label(patient_id: Option<&Value>) -> String {
    match patient_id {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => UNIDENTIFIED_PATIENT.to_string(),
    }
}

/// Build the responder card from already-extracted entities.
pub fn summarize(request: EmergencySummaryRequest) -> Result<EmergencySummaryResponse, AppError> {
    let EmergencySummaryRequest {
        patient_id,
        direct,
        vault_entities,
    } = request;
    let nested = vault_entities.unwrap_or_default();

    let medications = prefer_direct(direct.medications, nested.medications);
    let allergies = prefer_direct(direct.allergies, nested.allergies);
    let conditions = prefer_direct(direct.conditions, nested.conditions);

    if medications.is_empty() && allergies.is_empty() && conditions.is_empty() {
        return Ok(EmergencySummaryResponse {
            ok: true,
            emergency_bundle: EmergencyBundle::default(),
            short_text: "No medications or conditions on file.".to_string(),
        });
    }

    let allergies = summary_entries(&allergies, "allergies", &["allergen"])?;
    let conditions = summary_entries(&conditions, "conditions", &["condition"])?;
    let current_meds = medications
        .iter()
        .enumerate()
        .map(|(i, m)| medication_card(i, m))
        .collect::<Result<Vec<_>, _>>()?;

    let key_risks = allergies
        .iter()
        .filter(|a| is_high_risk(a.severity.as_deref()))
        .map(|a| format!("Allergic to {}", a.name))
        .collect();

    let mut short_text = format!("Patient ID: {}.", patient_label(patient_id.as_ref()));
    if !allergies.is_empty() {
        let names: Vec<&str> = allergies.iter().map(|a| a.name.as_str()).collect();
        short_text.push_str(&format!(" Allergies: {}.", names.join(", ")));
    }
    if !current_meds.is_empty() {
        let names: Vec<&str> = current_meds.iter().map(|m| m.name.as_str()).collect();
        short_text.push_str(&format!(" Current medications: {}.", names.join(", ")));
    }
    if !conditions.is_empty() {
        let names: Vec<&str> = conditions.iter().map(|c| c.name.as_str()).collect();
        short_text.push_str(&format!(" Chronic conditions: {}.", names.join(", ")));
    }

    let emergency_bundle = EmergencyBundle {
        allergies: allergies
            .iter()
            .map(|a| AllergyCard {
                allergen: a.name.clone(),
                severity: a.severity.clone().unwrap_or_else(|| "unknown".to_string()),
                reaction: a.reaction.clone().unwrap_or_default(),
            })
            .collect(),
        current_meds,
        chronic_conditions: conditions.into_iter().map(|c| c.name).collect(),
        key_risks,
    };

    Ok(EmergencySummaryResponse {
        ok: true,
        emergency_bundle,
        short_text,
    })
}

/// POST /ai/emergency-summary
pub async fn emergency_summary(
    payload: Result<Json<EmergencySummaryRequest>, JsonRejection>,
) -> Result<Json<EmergencySummaryResponse>, AppError> {
    let Json(request) = payload?;
    Ok(Json(summarize(request)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> EmergencySummaryRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_empty_request() {
        let out = summarize(request(json!({}))).unwrap();
        assert_eq!(out.short_text, "No medications or conditions on file.");
        assert!(out.emergency_bundle.key_risks.is_empty());
    }

    #[test]
    fn test_severe_allergies_become_key_risks() {
        let out = summarize(request(json!({
            "patient_id": 7,
            "allergies": [
                {"allergen": "Penicillin", "severity": "severe", "reaction": "Anaphylaxis"},
                {"name": "Latex", "severity": "low"},
                "Peanuts"
            ],
            "medications": [{"name": "Warfarin", "dosage": "5mg", "is_critical": true}],
            "conditions": ["Atrial fibrillation", {"condition": "Hypertension"}]
        })))
        .unwrap();

        let bundle = &out.emergency_bundle;
        assert_eq!(bundle.key_risks, vec!["Allergic to Penicillin".to_string()]);
        assert_eq!(bundle.allergies[2].severity, "unknown");
        assert!(bundle.current_meds[0].is_critical);
        assert_eq!(bundle.chronic_conditions, vec!["Atrial fibrillation", "Hypertension"]);
        assert_eq!(
            out.short_text,
            "Patient ID: 7. Allergies: Penicillin, Latex, Peanuts. Current medications: Warfarin. Chronic conditions: Atrial fibrillation, Hypertension."
        );
    }

    #[test]
    fn test_vault_entities_are_used_when_top_level_is_empty() {
        let out = summarize(request(json!({
            "vault_entities": {"medications": ["Aspirin"], "conditions": []}
        })))
        .unwrap();
        assert_eq!(out.emergency_bundle.current_meds[0].name, "Aspirin");
        assert_eq!(
            out.short_text,
            "Patient ID: patient-unidentified. Current medications: Aspirin."
        );
    }

    #[test]
    fn test_unnamed_entries_and_null_lists_are_tolerated() {
        let out = summarize(request(json!({
            "allergies": [{"severity": "severe", "reaction": "Hives"}],
            "conditions": null,
            "medications": null,
            "vault_entities": {"conditions": [{"onset": "2019"}], "medications": null}
        })))
        .unwrap();

        let bundle = &out.emergency_bundle;
        assert_eq!(bundle.allergies[0].allergen, "Unknown");
        assert_eq!(bundle.allergies[0].reaction, "Hives");
        assert_eq!(bundle.key_risks, vec!["Allergic to Unknown".to_string()]);
        assert_eq!(bundle.chronic_conditions, vec!["Unknown".to_string()]);
        assert!(bundle.current_meds.is_empty());
    }

    #[test]
    fn test_malformed_allergy_is_rejected() {
        let err = summarize(request(json!({"allergies": [12]}))).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.starts_with("allergies[0]")));
    }
}
